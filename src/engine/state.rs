//! Run state and the events the controller publishes about it.

use crate::engine::session::SessionConfig;
use crate::input::hotkey::ListenerError;
use crate::input::sink::InjectionError;
use std::fmt;
use std::sync::Arc;

/// Lifecycle phase of the controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Phase {
    #[default]
    Idle,
    /// Start delay countdown in progress.
    Counting,
    Running,
    /// Stop requested, scheduler winding down.
    Stopping,
    /// Latched by a panic or failsafe trip until acknowledged.
    PanicStopped,
}

impl Phase {
    /// A scheduler exists (or is being torn down) in this phase.
    pub fn is_active(&self) -> bool {
        matches!(self, Phase::Counting | Phase::Running | Phase::Stopping)
    }

    /// A new run may start from this phase.
    pub fn accepts_start(&self) -> bool {
        matches!(self, Phase::Idle | Phase::PanicStopped)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Counting => "counting",
            Phase::Running => "running",
            Phase::Stopping => "stopping",
            Phase::PanicStopped => "panic-stopped",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identifier of one run, increasing for the lifetime of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunId(pub u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run#{}", self.0)
    }
}

/// Snapshot of the controller's state.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    pub phase: Phase,
    /// Clicks issued by the current or most recent run.
    pub clicks_issued: u64,
    /// Config of the current or most recent run.
    pub active_config: Option<Arc<SessionConfig>>,
    pub run: Option<RunId>,
}

impl RunState {
    /// Clicks left before the limit, if the active config has one.
    pub fn remaining(&self) -> Option<u64> {
        self.active_config
            .as_ref()
            .and_then(|c| c.click_limit())
            .map(|limit| limit.saturating_sub(self.clicks_issued))
    }
}

/// Who asked for a toggle or stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestSource {
    Ui,
    Hotkey,
}

/// Why a panic stop happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanicCause {
    Ui,
    Hotkey,
    Failsafe,
}

impl fmt::Display for PanicCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PanicCause::Ui => f.write_str("panic button"),
            PanicCause::Hotkey => f.write_str("panic hotkey"),
            PanicCause::Failsafe => f.write_str("failsafe corner"),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEnd {
    /// Click limit reached.
    Completed,
    /// Graceful stop request.
    Stopped,
    Panicked(PanicCause),
    /// The click sink refused an event; not retried.
    Failed(InjectionError),
}

impl fmt::Display for RunEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunEnd::Completed => f.write_str("click limit reached"),
            RunEnd::Stopped => f.write_str("stopped"),
            RunEnd::Panicked(cause) => write!(f, "panic stop ({cause})"),
            RunEnd::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

/// One-shot messages for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    InjectionFailed(InjectionError),
    HotkeysUnavailable(ListenerError),
    /// A toggle arrived while idle but no session has been staged.
    NothingStaged,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::InjectionFailed(e) => write!(f, "Clicking stopped: {e}"),
            Notice::HotkeysUnavailable(e) => {
                write!(f, "{e}; use the terminal commands instead")
            }
            Notice::NothingStaged => f.write_str("No session configured to start"),
        }
    }
}

/// Everything subscribers can observe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    PhaseChanged {
        run: Option<RunId>,
        from: Phase,
        to: Phase,
    },
    Countdown {
        run: RunId,
        remaining_secs: u64,
    },
    ClickIssued {
        run: RunId,
        total: u64,
        remaining: Option<u64>,
    },
    RunEnded {
        run: RunId,
        end: RunEnd,
        clicks: u64,
    },
    Notice(Notice),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::session::{IntervalParts, SessionRequest};

    #[test]
    fn test_phase_predicates() {
        assert!(Phase::Idle.accepts_start());
        assert!(Phase::PanicStopped.accepts_start());
        assert!(!Phase::Stopping.accepts_start());
        assert!(Phase::Stopping.is_active());
        assert!(!Phase::PanicStopped.is_active());
    }

    #[test]
    fn test_remaining_clicks() {
        let config = SessionRequest::new(IntervalParts::from_millis(10))
            .click_limit(Some(5))
            .validate()
            .unwrap();
        let state = RunState {
            phase: Phase::Running,
            clicks_issued: 2,
            active_config: Some(Arc::new(config)),
            run: Some(RunId(1)),
        };
        assert_eq!(state.remaining(), Some(3));
        assert_eq!(RunState::default().remaining(), None);
    }
}
