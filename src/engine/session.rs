//! Session parameters and their validation.
//!
//! A [`SessionRequest`] is what the user typed (or what the config file holds).
//! It is validated once into an immutable [`SessionConfig`] which a run owns
//! for its whole lifetime.

use crate::input::types::{MouseButton, Position};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Longest accepted interval or start delay (one week).
pub const MAX_SESSION_DURATION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Interval as three independent fields, summed on validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalParts {
    pub minutes: u64,
    pub seconds: u64,
    pub millis: u64,
}

impl IntervalParts {
    pub fn new(minutes: u64, seconds: u64, millis: u64) -> Self {
        Self {
            minutes,
            seconds,
            millis,
        }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self {
            minutes: 0,
            seconds: 0,
            millis,
        }
    }

    /// Total interval in milliseconds, `None` on overflow.
    pub fn total_millis(&self) -> Option<u64> {
        self.minutes
            .checked_mul(60_000)?
            .checked_add(self.seconds.checked_mul(1_000)?)?
            .checked_add(self.millis)
    }
}

/// Whether each tick clicks once or twice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClickKind {
    #[default]
    Single,
    Double,
}

impl ClickKind {
    /// Primitive sink calls per counted click.
    pub fn presses(&self) -> u32 {
        match self {
            ClickKind::Single => 1,
            ClickKind::Double => 2,
        }
    }
}

impl fmt::Display for ClickKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClickKind::Single => f.write_str("single"),
            ClickKind::Double => f.write_str("double"),
        }
    }
}

/// Unvalidated session parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionRequest {
    pub interval: IntervalParts,
    pub button: MouseButton,
    pub kind: ClickKind,
    /// Fixed click position; `None` clicks wherever the cursor is.
    pub target: Option<Position>,
    /// Stop after this many clicks; `None` runs until stopped.
    pub click_limit: Option<u64>,
    #[serde(with = "duration_millis")]
    pub start_delay: Duration,
}

impl Default for SessionRequest {
    fn default() -> Self {
        Self {
            interval: IntervalParts::from_millis(10),
            button: MouseButton::Left,
            kind: ClickKind::Single,
            target: None,
            click_limit: None,
            start_delay: Duration::ZERO,
        }
    }
}

impl SessionRequest {
    pub fn new(interval: IntervalParts) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }

    pub fn button(mut self, button: MouseButton) -> Self {
        self.button = button;
        self
    }

    pub fn kind(mut self, kind: ClickKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn target(mut self, target: Option<Position>) -> Self {
        self.target = target;
        self
    }

    pub fn click_limit(mut self, limit: Option<u64>) -> Self {
        self.click_limit = limit;
        self
    }

    pub fn start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    /// Check the request and freeze it into a [`SessionConfig`].
    pub fn validate(&self) -> Result<SessionConfig, ConfigInvalid> {
        let millis = self
            .interval
            .total_millis()
            .ok_or(ConfigInvalid::IntervalTooLong)?;
        if millis == 0 {
            return Err(ConfigInvalid::ZeroInterval);
        }
        let interval = Duration::from_millis(millis);
        if interval > MAX_SESSION_DURATION {
            return Err(ConfigInvalid::IntervalTooLong);
        }
        if self.start_delay > MAX_SESSION_DURATION {
            return Err(ConfigInvalid::DelayTooLong);
        }
        if self.click_limit == Some(0) {
            return Err(ConfigInvalid::ZeroLimit);
        }

        Ok(SessionConfig {
            interval,
            button: self.button,
            kind: self.kind,
            target: self.target,
            click_limit: self.click_limit,
            start_delay: if self.start_delay.is_zero() {
                None
            } else {
                Some(self.start_delay)
            },
        })
    }
}

/// Validated, immutable parameters for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    interval: Duration,
    button: MouseButton,
    kind: ClickKind,
    target: Option<Position>,
    click_limit: Option<u64>,
    start_delay: Option<Duration>,
}

impl SessionConfig {
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn button(&self) -> MouseButton {
        self.button
    }

    pub fn kind(&self) -> ClickKind {
        self.kind
    }

    pub fn target(&self) -> Option<Position> {
        self.target
    }

    pub fn click_limit(&self) -> Option<u64> {
        self.click_limit
    }

    pub fn start_delay(&self) -> Option<Duration> {
        self.start_delay
    }

    /// Target rate in primitive clicks per second (a double click counts twice).
    pub fn clicks_per_second(&self) -> f64 {
        f64::from(self.kind.presses()) / self.interval.as_secs_f64()
    }

    /// One-line description for status displays.
    pub fn summary(&self) -> String {
        let limit = match self.click_limit {
            Some(n) => n.to_string(),
            None => "infinite".to_string(),
        };
        let target = match self.target {
            Some(pos) => pos.to_string(),
            None => "cursor".to_string(),
        };
        let delay = self.start_delay.unwrap_or(Duration::ZERO);

        format!(
            "{} | {} | interval={:.1}ms (~{:.1} CPS) | limit={} | delay={} | target={}",
            self.button,
            self.kind,
            self.interval.as_secs_f64() * 1000.0,
            self.clicks_per_second(),
            limit,
            format_delay(delay),
            target
        )
    }
}

fn format_delay(delay: Duration) -> String {
    if delay.subsec_millis() == 0 {
        format!("{}s", delay.as_secs())
    } else {
        format!("{}ms", delay.as_millis())
    }
}

/// Rejections raised when validating a [`SessionRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigInvalid {
    ZeroInterval,
    IntervalTooLong,
    DelayTooLong,
    ZeroLimit,
}

impl fmt::Display for ConfigInvalid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigInvalid::ZeroInterval => {
                write!(f, "Interval must be > 0ms (set at least 1ms)")
            }
            ConfigInvalid::IntervalTooLong => write!(f, "Interval must be at most one week"),
            ConfigInvalid::DelayTooLong => write!(f, "Start delay must be at most one week"),
            ConfigInvalid::ZeroLimit => {
                write!(f, "Click limit must be at least 1 (omit it to run until stopped)")
            }
        }
    }
}

impl std::error::Error for ConfigInvalid {}

/// Serde support for Duration as whole milliseconds.
pub(crate) mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = u64::try_from(duration.as_millis()).map_err(serde::ser::Error::custom)?;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
