//! Click injection and cursor queries.
//!
//! The engine only sees the [`ClickSink`] and [`CursorSource`] traits. The
//! production implementation wraps `enigo`; tests substitute recording fakes.

use crate::input::types::{MouseButton, Position};
use enigo::{Button, Coordinate, Direction, Enigo, Mouse, Settings};
use std::cell::RefCell;

/// Injects one discrete click.
///
/// Implementations must be callable from the scheduler's worker thread.
pub trait ClickSink: Send + Sync {
    /// Click `button` at `at`, or at the live cursor position when `at` is `None`.
    fn click(&self, button: MouseButton, at: Option<Position>) -> Result<(), InjectionError>;
}

/// Reports where the cursor currently is.
pub trait CursorSource: Send + Sync {
    fn position(&self) -> Result<Position, InjectionError>;
}

/// Errors raised while talking to the OS input layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectionError {
    /// The input backend could not be opened (missing permission, no display).
    Unavailable(String),
    /// The backend accepted the connection but refused the event.
    Rejected(String),
}

impl std::fmt::Display for InjectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InjectionError::Unavailable(e) => write!(f, "Input backend unavailable: {e}"),
            InjectionError::Rejected(e) => write!(f, "Input event rejected: {e}"),
        }
    }
}

impl std::error::Error for InjectionError {}

thread_local! {
    // One connection per thread: the scheduler worker and the failsafe poller
    // each get their own, created on first use.
    static ENIGO: RefCell<Option<Enigo>> = const { RefCell::new(None) };
}

/// `enigo`-backed sink and cursor source.
#[derive(Debug, Clone, Default)]
pub struct EnigoSink {
    _private: (),
}

impl EnigoSink {
    pub fn new() -> Self {
        Self { _private: () }
    }

    fn with_enigo<T>(
        &self,
        f: impl FnOnce(&mut Enigo) -> Result<T, InjectionError>,
    ) -> Result<T, InjectionError> {
        ENIGO.with(|cell| {
            let mut slot = cell.borrow_mut();
            if slot.is_none() {
                let enigo = Enigo::new(&Settings::default())
                    .map_err(|e| InjectionError::Unavailable(e.to_string()))?;
                *slot = Some(enigo);
            }
            match slot.as_mut() {
                Some(enigo) => f(enigo),
                None => Err(InjectionError::Unavailable(
                    "input connection missing".to_string(),
                )),
            }
        })
    }
}

fn to_enigo_button(button: MouseButton) -> Button {
    match button {
        MouseButton::Left => Button::Left,
        MouseButton::Right => Button::Right,
        MouseButton::Middle => Button::Middle,
    }
}

impl ClickSink for EnigoSink {
    fn click(&self, button: MouseButton, at: Option<Position>) -> Result<(), InjectionError> {
        self.with_enigo(|enigo| {
            if let Some(pos) = at {
                enigo
                    .move_mouse(pos.x, pos.y, Coordinate::Abs)
                    .map_err(|e| InjectionError::Rejected(e.to_string()))?;
            }
            enigo
                .button(to_enigo_button(button), Direction::Click)
                .map_err(|e| InjectionError::Rejected(e.to_string()))
        })
    }
}

impl CursorSource for EnigoSink {
    fn position(&self) -> Result<Position, InjectionError> {
        self.with_enigo(|enigo| {
            enigo
                .location()
                .map(|(x, y)| Position::new(x, y))
                .map_err(|e| InjectionError::Rejected(e.to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_mapping() {
        assert!(matches!(to_enigo_button(MouseButton::Left), Button::Left));
        assert!(matches!(to_enigo_button(MouseButton::Right), Button::Right));
        assert!(matches!(to_enigo_button(MouseButton::Middle), Button::Middle));
    }

    #[test]
    fn test_injection_error_display() {
        let err = InjectionError::Unavailable("no display".to_string());
        assert_eq!(err.to_string(), "Input backend unavailable: no display");
    }
}
