//! macOS global hotkeys using a listen-only CGEvent tap.
//!
//! The tap observes key-down events at the session level and requires Input
//! Monitoring permission. Events pass through untouched.

use crate::input::hotkey::{HotkeyListener, ListenerError, Subscription};
use crate::input::types::{HotkeyBindings, HotkeyEvent, HotkeyKey};
use core_foundation::runloop::{kCFRunLoopCommonModes, CFRunLoop};
use core_graphics::event::{
    CGEvent, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement,
    CGEventTapProxy, CGEventType, CallbackResult, EventField,
};
use crossbeam_channel::{bounded, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// How long `subscribe` waits for the tap thread to report success.
const TAP_STARTUP_TIMEOUT: Duration = Duration::from_secs(2);

/// Global hotkey listener backed by a CGEvent tap.
pub struct MacOSHotkeys {
    bindings: HotkeyBindings,
    active: Option<Arc<AtomicBool>>,
}

impl MacOSHotkeys {
    pub fn new(bindings: HotkeyBindings) -> Self {
        Self {
            bindings,
            active: None,
        }
    }
}

impl HotkeyListener for MacOSHotkeys {
    fn subscribe(&mut self, events: Sender<HotkeyEvent>) -> Result<Subscription, ListenerError> {
        if let Some(active) = &self.active {
            if active.load(Ordering::SeqCst) {
                return Err(ListenerError::AlreadySubscribed);
            }
        }

        let active = Arc::new(AtomicBool::new(true));
        let running = active.clone();
        let bindings = self.bindings;
        let (ready_tx, ready_rx) = bounded(1);

        let handle = thread::spawn(move || {
            if let Err(e) = run_event_loop(events, running.clone(), bindings, &ready_tx) {
                warn!("Hotkey event tap stopped: {e}");
                let _ = ready_tx.try_send(Err(e));
            }
            running.store(false, Ordering::SeqCst);
        });

        match ready_rx.recv_timeout(TAP_STARTUP_TIMEOUT) {
            Ok(Ok(())) => {
                self.active = Some(active.clone());
                Ok(Subscription::new(active, Some(handle)))
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                active.store(false, Ordering::SeqCst);
                Err(ListenerError::Unavailable(
                    "event tap did not start in time".to_string(),
                ))
            }
        }
    }

    fn backend(&self) -> &'static str {
        "cgevent-tap"
    }
}

/// Run the Core Graphics event loop until `running` is cleared.
fn run_event_loop(
    events: Sender<HotkeyEvent>,
    running: Arc<AtomicBool>,
    bindings: HotkeyBindings,
    ready: &Sender<Result<(), ListenerError>>,
) -> Result<(), ListenerError> {
    let delivering = running.clone();

    let callback = move |_proxy: CGEventTapProxy, event_type: CGEventType, event: &CGEvent| {
        if matches!(event_type, CGEventType::KeyDown) && delivering.load(Ordering::SeqCst) {
            // Holding the key down must not fire repeated toggles
            let repeat = event.get_integer_value_field(EventField::KEYBOARD_EVENT_AUTOREPEAT);
            if repeat == 0 {
                let code = event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE);
                if let Some(hotkey) = keycode_to_key(code).and_then(|k| bindings.resolve(k)) {
                    debug!(?hotkey, "Global hotkey pressed");
                    let _ = events.try_send(hotkey);
                }
            }
        }
        CallbackResult::Keep
    };

    let tap = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::KeyDown],
        callback,
    )
    .map_err(|_| {
        ListenerError::Unavailable("could not create event tap (Input Monitoring?)".to_string())
    })?;

    let source = tap.mach_port().create_runloop_source(0).map_err(|_| {
        ListenerError::Unavailable("could not create run loop source".to_string())
    })?;

    let run_loop = CFRunLoop::get_current();
    unsafe {
        run_loop.add_source(&source, kCFRunLoopCommonModes);
    }
    tap.enable();
    let _ = ready.try_send(Ok(()));

    while running.load(Ordering::SeqCst) {
        CFRunLoop::run_in_mode(
            unsafe { kCFRunLoopCommonModes },
            Duration::from_millis(100),
            false,
        );
    }

    Ok(())
}

/// Map a macOS virtual key code to a function key.
fn keycode_to_key(code: i64) -> Option<HotkeyKey> {
    let key = match code {
        122 => HotkeyKey::F1,
        120 => HotkeyKey::F2,
        99 => HotkeyKey::F3,
        118 => HotkeyKey::F4,
        96 => HotkeyKey::F5,
        97 => HotkeyKey::F6,
        98 => HotkeyKey::F7,
        100 => HotkeyKey::F8,
        101 => HotkeyKey::F9,
        109 => HotkeyKey::F10,
        103 => HotkeyKey::F11,
        111 => HotkeyKey::F12,
        _ => return None,
    };
    Some(key)
}

/// Check if the application can install a keyboard event tap.
///
/// macOS has no direct query for Input Monitoring; creating a throwaway
/// passive tap fails when permission is missing.
pub fn check_permission() -> bool {
    let result = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::KeyDown],
        |_proxy, _type, _event| CallbackResult::Keep,
    );

    result.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keycode_mapping() {
        assert_eq!(keycode_to_key(100), Some(HotkeyKey::F8));
        assert_eq!(keycode_to_key(101), Some(HotkeyKey::F9));
        assert_eq!(keycode_to_key(0), None);
    }

    #[test]
    fn test_listener_creation() {
        let listener = MacOSHotkeys::new(HotkeyBindings::default());
        assert!(listener.active.is_none());
        assert_eq!(listener.backend(), "cgevent-tap");
    }
}
