//! Click scheduling and run control.
//!
//! This module turns validated session parameters into a cancellable
//! background click loop, and arbitrates start/stop/panic requests coming from
//! the terminal, global hotkeys and the failsafe.

pub mod controller;
pub mod failsafe;
pub mod hotkeys;
pub mod scheduler;
pub mod session;
pub mod signal;
pub mod state;

// Re-export commonly used types
pub use controller::{ControlError, Controller, ControllerOptions};
pub use failsafe::{FailsafeMonitor, FailsafeRegion, Tripwire};
pub use hotkeys::{HotkeyBridge, HotkeyCapability};
pub use scheduler::{ClickScheduler, Progress, RunOutcome, DEFAULT_DOUBLE_CLICK_GAP, MAX_CATCH_UP};
pub use session::{ClickKind, ConfigInvalid, IntervalParts, SessionConfig, SessionRequest};
pub use signal::{Halt, RunSignal};
pub use state::{
    ControlEvent, Notice, PanicCause, Phase, RequestSource, RunEnd, RunId, RunState,
};
