//! Activity statistics for the clicker.
//!
//! Counts runs, clicks and safety stops, and persists them between sessions.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_persistence, ActivityLog, ActivityStats,
    SharedActivityLog,
};
