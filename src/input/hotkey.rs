//! Global hotkey capability.
//!
//! A listener turns OS key events into [`HotkeyEvent`]s and pushes them into a
//! channel. Registration is the backend's business; callers only keep the
//! returned [`Subscription`] alive for as long as they want delivery.

use crate::input::types::HotkeyEvent;
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Source of global toggle/panic key events.
pub trait HotkeyListener {
    /// Start delivering events into `events`.
    fn subscribe(&mut self, events: Sender<HotkeyEvent>) -> Result<Subscription, ListenerError>;

    /// Short backend name used in log lines.
    fn backend(&self) -> &'static str;
}

/// Live registration returned by [`HotkeyListener::subscribe`].
///
/// Delivery stops when this is dropped or [`Subscription::unsubscribe`] is called.
pub struct Subscription {
    active: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Wrap a delivery flag and, if the backend thread can exit on its own,
    /// the thread to join on teardown.
    pub fn new(active: Arc<AtomicBool>, thread: Option<JoinHandle<()>>) -> Self {
        Self { active, thread }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Stop delivery and wait for the backend thread when it is joinable.
    pub fn unsubscribe(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Errors that can occur while registering global hotkeys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerError {
    /// The OS refused the hook (missing permission, Wayland, no backend).
    Unavailable(String),
    AlreadySubscribed,
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Unavailable(e) => write!(f, "Global hotkeys unavailable: {e}"),
            ListenerError::AlreadySubscribed => write!(f, "Hotkey listener is already subscribed"),
        }
    }
}

impl std::error::Error for ListenerError {}
