//! OS input capabilities for the clicker.
//!
//! This module provides the click sink, the cursor query used by the failsafe,
//! and platform-specific global hotkey listeners.

pub mod hotkey;
pub mod sink;
pub mod types;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(all(not(target_os = "macos"), feature = "hooks"))]
pub mod hooks;

#[cfg(all(not(target_os = "macos"), not(feature = "hooks")))]
pub mod noop;

// Re-export commonly used types
pub use hotkey::{HotkeyListener, ListenerError, Subscription};
pub use sink::{ClickSink, CursorSource, EnigoSink, InjectionError};
pub use types::{HotkeyBindings, HotkeyEvent, HotkeyKey, MouseButton, Position};

#[cfg(target_os = "macos")]
pub use macos::{check_permission, MacOSHotkeys};

/// Platform-agnostic global hotkey listener
#[cfg(target_os = "macos")]
pub type SystemHotkeys = MacOSHotkeys;

#[cfg(all(not(target_os = "macos"), feature = "hooks"))]
pub use hooks::{check_permission, RdevHotkeys};

/// Platform-agnostic global hotkey listener
#[cfg(all(not(target_os = "macos"), feature = "hooks"))]
pub type SystemHotkeys = RdevHotkeys;

#[cfg(all(not(target_os = "macos"), not(feature = "hooks")))]
pub use noop::{check_permission, NoopHotkeys};

/// Platform-agnostic global hotkey listener
#[cfg(all(not(target_os = "macos"), not(feature = "hooks")))]
pub type SystemHotkeys = NoopHotkeys;
