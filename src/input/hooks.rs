//! Global hotkeys through `rdev` (Windows and X11), enabled by the `hooks` feature.
//!
//! `rdev::listen` blocks its thread forever and can only be installed once per
//! process, so the hook thread outlives individual subscriptions; each
//! subscription only swaps the route the hook delivers into.

use crate::input::hotkey::{HotkeyListener, ListenerError, Subscription};
use crate::input::types::{HotkeyBindings, HotkeyEvent, HotkeyKey};
use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use rdev::{listen, Event, EventType, Key};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// An early `listen` failure shows up well within this window.
const HOOK_STARTUP_GRACE: Duration = Duration::from_millis(250);

struct Route {
    events: Sender<HotkeyEvent>,
    active: Arc<AtomicBool>,
}

/// Global hotkey listener backed by an `rdev` hook thread.
pub struct RdevHotkeys {
    bindings: HotkeyBindings,
    route: Arc<Mutex<Option<Route>>>,
    hook_started: bool,
}

impl RdevHotkeys {
    pub fn new(bindings: HotkeyBindings) -> Self {
        Self {
            bindings,
            route: Arc::new(Mutex::new(None)),
            hook_started: false,
        }
    }

    fn spawn_hook(&self) -> Result<(), ListenerError> {
        let route = self.route.clone();
        let bindings = self.bindings;
        let (err_tx, err_rx) = bounded(1);

        thread::spawn(move || {
            let mut held: HashSet<HotkeyKey> = HashSet::new();
            let result = listen(move |event: Event| {
                let (key, pressed) = match event.event_type {
                    EventType::KeyPress(key) => (key, true),
                    EventType::KeyRelease(key) => (key, false),
                    _ => return,
                };
                let Some(hotkey) = map_key(key) else {
                    return;
                };
                if !pressed {
                    held.remove(&hotkey);
                    return;
                }
                // Auto-repeat arrives as repeated presses
                if !held.insert(hotkey) {
                    return;
                }
                if let Some(logical) = bindings.resolve(hotkey) {
                    let guard = route.lock();
                    if let Some(route) = guard.as_ref() {
                        if route.active.load(Ordering::SeqCst) {
                            debug!(?logical, "Global hotkey pressed");
                            let _ = route.events.try_send(logical);
                        }
                    }
                }
            });
            if let Err(e) = result {
                warn!("rdev hook exited: {e:?}");
                let _ = err_tx.send(format!("{e:?}"));
            }
        });

        match err_rx.recv_timeout(HOOK_STARTUP_GRACE) {
            Ok(e) => Err(ListenerError::Unavailable(e)),
            Err(_) => Ok(()),
        }
    }
}

impl HotkeyListener for RdevHotkeys {
    fn subscribe(&mut self, events: Sender<HotkeyEvent>) -> Result<Subscription, ListenerError> {
        {
            let guard = self.route.lock();
            if let Some(route) = guard.as_ref() {
                if route.active.load(Ordering::SeqCst) {
                    return Err(ListenerError::AlreadySubscribed);
                }
            }
        }

        let active = Arc::new(AtomicBool::new(true));
        *self.route.lock() = Some(Route {
            events,
            active: active.clone(),
        });

        if !self.hook_started {
            if let Err(e) = self.spawn_hook() {
                *self.route.lock() = None;
                return Err(e);
            }
            self.hook_started = true;
        }

        // The hook thread cannot be joined; dropping the subscription only mutes it.
        Ok(Subscription::new(active, None))
    }

    fn backend(&self) -> &'static str {
        "rdev"
    }
}

fn map_key(key: Key) -> Option<HotkeyKey> {
    let key = match key {
        Key::F1 => HotkeyKey::F1,
        Key::F2 => HotkeyKey::F2,
        Key::F3 => HotkeyKey::F3,
        Key::F4 => HotkeyKey::F4,
        Key::F5 => HotkeyKey::F5,
        Key::F6 => HotkeyKey::F6,
        Key::F7 => HotkeyKey::F7,
        Key::F8 => HotkeyKey::F8,
        Key::F9 => HotkeyKey::F9,
        Key::F10 => HotkeyKey::F10,
        Key::F11 => HotkeyKey::F11,
        Key::F12 => HotkeyKey::F12,
        _ => return None,
    };
    Some(key)
}

/// rdev has no permission gate to query up front.
pub fn check_permission() -> bool {
    true
}
