//! Configuration for the Cadence clicker.

use crate::engine::failsafe::{FailsafeRegion, DEFAULT_CORNER_PX, DEFAULT_POLL_PERIOD};
use crate::engine::session::SessionRequest;
use crate::input::types::HotkeyBindings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the clicker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Session used when `run` is given no overriding flags
    #[serde(default)]
    pub defaults: SessionRequest,

    #[serde(default)]
    pub hotkeys: HotkeyConfig,

    #[serde(default)]
    pub failsafe: FailsafeConfig,

    /// Gap between the two presses of a double click
    #[serde(default = "default_double_click_gap_ms")]
    pub double_click_gap_ms: u64,

    /// Path for storing activity statistics
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,
}

fn default_double_click_gap_ms() -> u64 {
    50
}

fn default_data_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cadence-clicker")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            defaults: SessionRequest::default(),
            hotkeys: HotkeyConfig::default(),
            failsafe: FailsafeConfig::default(),
            double_click_gap_ms: default_double_click_gap_ms(),
            data_path: default_data_path(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load from `path`, falling back to defaults when the file is missing.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cadence-clicker")
            .join("config.json")
    }

    /// Where the activity counters are persisted.
    pub fn stats_path(&self) -> PathBuf {
        self.data_path.join("stats.json")
    }

    pub fn double_click_gap(&self) -> Duration {
        Duration::from_millis(self.double_click_gap_ms)
    }

    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }
}

/// Global hotkey settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotkeyConfig {
    pub enabled: bool,
    #[serde(flatten)]
    pub bindings: HotkeyBindings,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bindings: HotkeyBindings::default(),
        }
    }
}

/// Corner failsafe settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailsafeConfig {
    pub enabled: bool,
    /// Size of the reserved top-left square in pixels
    pub corner_px: i32,
    /// Cursor sampling period in milliseconds
    pub poll_ms: u64,
}

impl Default for FailsafeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            corner_px: DEFAULT_CORNER_PX,
            poll_ms: DEFAULT_POLL_PERIOD.as_millis() as u64,
        }
    }
}

impl FailsafeConfig {
    pub fn region(&self) -> FailsafeRegion {
        FailsafeRegion::new(self.corner_px)
    }

    /// Sampling period, never shorter than 1ms.
    pub fn poll_period(&self) -> Duration {
        Duration::from_millis(self.poll_ms.max(1))
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
