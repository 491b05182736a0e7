//! Fallback hotkey listener for builds without a global hook backend.
//!
//! This exists so the crate (and binary) compile everywhere. Subscribing always
//! fails with [`ListenerError::Unavailable`], which the controller turns into a
//! focus-scoped capability rather than an error.

use crate::input::hotkey::{HotkeyListener, ListenerError, Subscription};
use crate::input::types::{HotkeyBindings, HotkeyEvent};
use crossbeam_channel::Sender;

/// A listener that never delivers events.
pub struct NoopHotkeys {
    _bindings: HotkeyBindings,
}

impl NoopHotkeys {
    pub fn new(bindings: HotkeyBindings) -> Self {
        Self {
            _bindings: bindings,
        }
    }
}

impl HotkeyListener for NoopHotkeys {
    fn subscribe(&mut self, _events: Sender<HotkeyEvent>) -> Result<Subscription, ListenerError> {
        Err(ListenerError::Unavailable(
            "no global hook backend in this build (enable the `hooks` feature)".to_string(),
        ))
    }

    fn backend(&self) -> &'static str {
        "noop"
    }
}

/// Without a hook backend there is no permission to ask for.
pub fn check_permission() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_subscribe_reports_unavailable() {
        let mut listener = NoopHotkeys::new(HotkeyBindings::default());
        let (tx, _rx) = unbounded();
        assert!(matches!(
            listener.subscribe(tx),
            Err(ListenerError::Unavailable(_))
        ));
    }
}
