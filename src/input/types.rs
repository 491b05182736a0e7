//! Plain data types shared by the click sink and hotkey backends.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A point in global screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl FromStr for Position {
    type Err = String;

    /// Parse `"X,Y"` (whitespace around either number is ignored).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, y) = s
            .split_once(',')
            .ok_or_else(|| format!("expected X,Y but got '{s}'"))?;
        let x = x
            .trim()
            .parse::<i32>()
            .map_err(|e| format!("invalid X coordinate '{}': {e}", x.trim()))?;
        let y = y
            .trim()
            .parse::<i32>()
            .map_err(|e| format!("invalid Y coordinate '{}': {e}", y.trim()))?;
        Ok(Self { x, y })
    }
}

/// Mouse button to press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

impl MouseButton {
    pub fn as_str(&self) -> &'static str {
        match self {
            MouseButton::Left => "left",
            MouseButton::Right => "right",
            MouseButton::Middle => "middle",
        }
    }
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MouseButton {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "left" | "l" => Ok(MouseButton::Left),
            "right" | "r" => Ok(MouseButton::Right),
            "middle" | "m" => Ok(MouseButton::Middle),
            other => Err(format!("unknown mouse button '{other}' (left, right, middle)")),
        }
    }
}

/// The two logical events a hotkey backend can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HotkeyEvent {
    /// Start if idle, stop if active.
    Toggle,
    /// Immediate stop that stays latched until acknowledged.
    Panic,
}

/// Function keys usable as global bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HotkeyKey {
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
}

impl HotkeyKey {
    pub const ALL: [HotkeyKey; 12] = [
        HotkeyKey::F1,
        HotkeyKey::F2,
        HotkeyKey::F3,
        HotkeyKey::F4,
        HotkeyKey::F5,
        HotkeyKey::F6,
        HotkeyKey::F7,
        HotkeyKey::F8,
        HotkeyKey::F9,
        HotkeyKey::F10,
        HotkeyKey::F11,
        HotkeyKey::F12,
    ];

    /// 1-based function key number.
    pub fn number(&self) -> u8 {
        match self {
            HotkeyKey::F1 => 1,
            HotkeyKey::F2 => 2,
            HotkeyKey::F3 => 3,
            HotkeyKey::F4 => 4,
            HotkeyKey::F5 => 5,
            HotkeyKey::F6 => 6,
            HotkeyKey::F7 => 7,
            HotkeyKey::F8 => 8,
            HotkeyKey::F9 => 9,
            HotkeyKey::F10 => 10,
            HotkeyKey::F11 => 11,
            HotkeyKey::F12 => 12,
        }
    }
}

impl fmt::Display for HotkeyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "F{}", self.number())
    }
}

impl FromStr for HotkeyKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let number = trimmed
            .strip_prefix('F')
            .or_else(|| trimmed.strip_prefix('f'))
            .and_then(|n| n.parse::<u8>().ok())
            .ok_or_else(|| format!("unsupported hotkey '{trimmed}' (F1-F12)"))?;

        HotkeyKey::ALL
            .iter()
            .copied()
            .find(|k| k.number() == number)
            .ok_or_else(|| format!("unsupported hotkey '{trimmed}' (F1-F12)"))
    }
}

/// Which keys map to which logical event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotkeyBindings {
    pub toggle: HotkeyKey,
    pub panic: HotkeyKey,
}

impl Default for HotkeyBindings {
    fn default() -> Self {
        Self {
            toggle: HotkeyKey::F8,
            panic: HotkeyKey::F9,
        }
    }
}

impl HotkeyBindings {
    /// Translate a pressed function key into a logical event.
    ///
    /// Panic wins if both bindings point at the same key.
    pub fn resolve(&self, key: HotkeyKey) -> Option<HotkeyEvent> {
        if key == self.panic {
            Some(HotkeyEvent::Panic)
        } else if key == self.toggle {
            Some(HotkeyEvent::Toggle)
        } else {
            None
        }
    }
}
