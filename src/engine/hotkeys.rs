//! Forwards global hotkey events into the controller.

use crate::engine::controller::Controller;
use crate::engine::state::Notice;
use crate::input::hotkey::{HotkeyListener, Subscription};
use crossbeam_channel::{bounded, select, unbounded, Sender};
use std::thread::{self, JoinHandle};
use tracing::{info, warn};

/// Whether toggle/panic keys work outside the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyCapability {
    /// Registered with the OS; keys work from any application.
    Global,
    /// Registration failed; only the terminal's own commands are available.
    FocusOnly,
}

/// Keeps a listener subscription and its forwarding thread alive.
pub struct HotkeyBridge {
    capability: HotkeyCapability,
    subscription: Option<Subscription>,
    stop: Option<Sender<()>>,
    forwarder: Option<JoinHandle<()>>,
}

impl HotkeyBridge {
    /// Subscribe `listener` and forward its events to `controller`.
    ///
    /// Registration failure is not an error: the controller gets a
    /// `HotkeysUnavailable` notice and the bridge reports `FocusOnly`.
    pub fn attach(controller: &Controller, listener: &mut dyn HotkeyListener) -> Self {
        let (events_tx, events_rx) = unbounded();

        let subscription = match listener.subscribe(events_tx) {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!(backend = listener.backend(), "Hotkey registration failed: {e}");
                let _ = controller.report_notice(Notice::HotkeysUnavailable(e));
                return Self {
                    capability: HotkeyCapability::FocusOnly,
                    subscription: None,
                    stop: None,
                    forwarder: None,
                };
            }
        };
        info!(backend = listener.backend(), "Global hotkeys active");

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let controller = controller.clone();
        let forwarder = thread::spawn(move || {
            let mut running = true;
            while running {
                select! {
                    recv(events_rx) -> event => match event {
                        Ok(event) => {
                            if controller.handle_hotkey(event).is_err() {
                                running = false;
                            }
                        }
                        Err(_) => running = false,
                    },
                    recv(stop_rx) -> _ => running = false,
                }
            }
        });

        Self {
            capability: HotkeyCapability::Global,
            subscription: Some(subscription),
            stop: Some(stop_tx),
            forwarder: Some(forwarder),
        }
    }

    pub fn capability(&self) -> HotkeyCapability {
        self.capability
    }

    /// Stop delivery and join the forwarding thread.
    pub fn detach(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.forwarder.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for HotkeyBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::state::{ControlEvent, Phase};
    use crate::input::hotkey::ListenerError;
    use crate::input::sink::{ClickSink, InjectionError};
    use crate::input::types::{HotkeyEvent, MouseButton, Position};
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::time::Duration;

    struct NullSink;

    impl ClickSink for NullSink {
        fn click(&self, _: MouseButton, _: Option<Position>) -> Result<(), InjectionError> {
            Ok(())
        }
    }

    struct RefusingListener;

    impl HotkeyListener for RefusingListener {
        fn subscribe(
            &mut self,
            _events: Sender<HotkeyEvent>,
        ) -> Result<Subscription, ListenerError> {
            Err(ListenerError::Unavailable("no display".to_string()))
        }

        fn backend(&self) -> &'static str {
            "refusing"
        }
    }

    /// Hands the sender back to the test so it can play the OS.
    #[derive(Default)]
    struct ManualListener {
        sender: Option<Sender<HotkeyEvent>>,
    }

    impl HotkeyListener for ManualListener {
        fn subscribe(
            &mut self,
            events: Sender<HotkeyEvent>,
        ) -> Result<Subscription, ListenerError> {
            self.sender = Some(events);
            Ok(Subscription::new(Arc::new(AtomicBool::new(true)), None))
        }

        fn backend(&self) -> &'static str {
            "manual"
        }
    }

    #[test]
    fn test_failed_registration_degrades_to_focus_only() {
        let controller = Controller::new(Arc::new(NullSink));
        let events = controller.subscribe();

        let bridge = HotkeyBridge::attach(&controller, &mut RefusingListener);
        assert_eq!(bridge.capability(), HotkeyCapability::FocusOnly);

        let event = events.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(
            event,
            ControlEvent::Notice(Notice::HotkeysUnavailable(_))
        ));
        controller.shutdown();
    }

    #[test]
    fn test_events_reach_controller() {
        let controller = Controller::new(Arc::new(NullSink));
        let events = controller.subscribe();
        let mut listener = ManualListener::default();

        let bridge = HotkeyBridge::attach(&controller, &mut listener);
        assert_eq!(bridge.capability(), HotkeyCapability::Global);

        listener
            .sender
            .as_ref()
            .unwrap()
            .send(HotkeyEvent::Toggle)
            .unwrap();
        let event = events.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(event, ControlEvent::Notice(Notice::NothingStaged));
        assert_eq!(controller.phase(), Phase::Idle);

        bridge.detach();
        controller.shutdown();
    }
}
