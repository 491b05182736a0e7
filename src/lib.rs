//! Cadence - a deadline-scheduled auto clicker with hotkey and failsafe control.
//!
//! This library turns a click interval, optional click limit, optional start
//! delay and button/position choice into a cancellable background click loop
//! that can be halted instantly from the terminal, a global hotkey, or by
//! flicking the cursor into the top-left screen corner.
//!
//! # Safety Guarantees
//!
//! - **Single writer**: run state is only ever changed by one control thread
//! - **Panic wins**: a panic request beats any racing completion, and no click
//!   starts once the panic has been observed
//! - **No drift**: deadlines advance by the interval, so a stall is caught up
//!   rather than shifting the schedule
//! - **Never two loops**: toggling rapidly cannot start a second scheduler
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Cadence Clicker                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │  Terminal   │──▶│  Controller │──▶│  Scheduler  │──▶ Sink│
//! │  │  commands   │   │ (one thread)│   │ (per run)   │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │         ▲             ▲       ▲                             │
//! │  ┌─────────────┐      │       │      ┌─────────────┐       │
//! │  │   Hotkey    │──────┘       └──────│  Failsafe   │       │
//! │  │  listener   │                     │  (corner)   │       │
//! │  └─────────────┘                     └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use cadence_clicker::{engine, input};
//!
//! let controller = engine::Controller::new(Arc::new(input::EnigoSink::new()));
//! let request = engine::SessionRequest::new(engine::IntervalParts::from_millis(100))
//!     .click_limit(Some(10));
//!
//! controller.start_request(&request).expect("Failed to start");
//! ```

pub mod config;
pub mod engine;
pub mod input;
pub mod stats;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError, FailsafeConfig, HotkeyConfig};
pub use engine::{
    ClickKind, ConfigInvalid, ControlError, ControlEvent, Controller, ControllerOptions,
    IntervalParts, Notice, PanicCause, Phase, RunEnd, RunId, RunState, SessionConfig,
    SessionRequest,
};
pub use input::{ClickSink, CursorSource, HotkeyListener, MouseButton, Position};
pub use stats::{ActivityLog, ActivityStats, SharedActivityLog};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Safety notice that can be displayed to users.
pub const SAFETY_NOTICE: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║                 CADENCE CLICKER - SAFETY NOTICE                  ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This tool sends real mouse clicks to whatever is on screen.     ║
║                                                                  ║
║  ✓ WAYS TO STOP CLICKING:                                        ║
║    • Press the toggle hotkey (F8 by default) to stop gracefully  ║
║    • Press the panic hotkey (F9 by default) to stop instantly    ║
║    • Move the cursor into the top-left screen corner             ║
║    • Type `p` + Enter or press Ctrl+C in the terminal            ║
║                                                                  ║
║  ✗ WHAT A PANIC STOP DOES:                                       ║
║    • Halts mid-countdown or mid-interval, no further clicks      ║
║    • Stays latched until acknowledged (`a` or the toggle key)    ║
║                                                                  ║
║  Global hotkeys need Accessibility / Input Monitoring access on  ║
║  macOS. Without it they only work while the terminal has focus.  ║
║                                                                  ║
║  Check permissions and settings anytime with:                    ║
║    cadence status                                                ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
