//! Cumulative clicker activity counters.
//!
//! Tracks how many runs were started and how they ended, so `cadence status`
//! can show what the clicker has been doing across sessions.

use crate::engine::state::{PanicCause, RunEnd};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Activity statistics, shared between the controller and the front end.
#[derive(Debug)]
pub struct ActivityLog {
    /// Runs that reached the scheduler
    runs_started: AtomicU64,
    /// Runs that hit their click limit
    runs_completed: AtomicU64,
    /// Counted clicks (a double click is one)
    clicks_issued: AtomicU64,
    /// Runs ended by the panic button, hotkey or failsafe
    panic_stops: AtomicU64,
    /// Subset of panic stops caused by the failsafe corner
    failsafe_trips: AtomicU64,
    /// Runs ended by a refused click
    injection_failures: AtomicU64,
    session_start: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self {
            runs_started: AtomicU64::new(0),
            runs_completed: AtomicU64::new(0),
            clicks_issued: AtomicU64::new(0),
            panic_stops: AtomicU64::new(0),
            failsafe_trips: AtomicU64::new(0),
            injection_failures: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a log backed by `path`, seeded from what is already there.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            warn!("Could not load previous activity stats: {e}");
        }

        log
    }

    pub fn record_run_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record how a run ended and the clicks it issued.
    pub fn record_run_ended(&self, end: &RunEnd, clicks: u64) {
        self.clicks_issued.fetch_add(clicks, Ordering::Relaxed);
        match end {
            RunEnd::Completed => {
                self.runs_completed.fetch_add(1, Ordering::Relaxed);
            }
            RunEnd::Stopped => {}
            RunEnd::Panicked(cause) => {
                self.panic_stops.fetch_add(1, Ordering::Relaxed);
                if *cause == PanicCause::Failsafe {
                    self.failsafe_trips.fetch_add(1, Ordering::Relaxed);
                }
            }
            RunEnd::Failed(_) => {
                self.injection_failures.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn stats(&self) -> ActivityStats {
        ActivityStats {
            runs_started: self.runs_started.load(Ordering::Relaxed),
            runs_completed: self.runs_completed.load(Ordering::Relaxed),
            clicks_issued: self.clicks_issued.load(Ordering::Relaxed),
            panic_stops: self.panic_stops.load(Ordering::Relaxed),
            failsafe_trips: self.failsafe_trips.load(Ordering::Relaxed),
            injection_failures: self.injection_failures.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Human-readable block for the terminal.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Activity Statistics:\n\
             - Runs started: {}\n\
             - Runs completed (limit reached): {}\n\
             - Clicks issued: {}\n\
             - Panic stops: {} (failsafe: {})\n\
             - Injection failures: {}\n\
             - Session duration: {} seconds",
            stats.runs_started,
            stats.runs_completed,
            stats.clicks_issued,
            stats.panic_stops,
            stats.failsafe_trips,
            stats.injection_failures,
            stats.session_duration_secs
        )
    }

    /// Write the counters to the backing file, if any.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                runs_started: stats.runs_started,
                runs_completed: stats.runs_completed,
                clicks_issued: stats.clicks_issued,
                panic_stops: stats.panic_stops,
                failsafe_trips: stats.failsafe_trips,
                injection_failures: stats.injection_failures,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let persisted = read_persisted(path)?;
                self.runs_started
                    .store(persisted.runs_started, Ordering::Relaxed);
                self.runs_completed
                    .store(persisted.runs_completed, Ordering::Relaxed);
                self.clicks_issued
                    .store(persisted.clicks_issued, Ordering::Relaxed);
                self.panic_stops
                    .store(persisted.panic_stops, Ordering::Relaxed);
                self.failsafe_trips
                    .store(persisted.failsafe_trips, Ordering::Relaxed);
                self.injection_failures
                    .store(persisted.injection_failures, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of activity statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityStats {
    pub runs_started: u64,
    pub runs_completed: u64,
    pub clicks_issued: u64,
    pub panic_stops: u64,
    pub failsafe_trips: u64,
    pub injection_failures: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// On-disk format of `stats.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedStats {
    #[serde(default)]
    pub runs_started: u64,
    #[serde(default)]
    pub runs_completed: u64,
    #[serde(default)]
    pub clicks_issued: u64,
    #[serde(default)]
    pub panic_stops: u64,
    #[serde(default)]
    pub failsafe_trips: u64,
    #[serde(default)]
    pub injection_failures: u64,
    pub last_updated: DateTime<Utc>,
}

/// Read a stats file without attaching it to a live log.
pub fn read_persisted(path: &std::path::Path) -> Result<PersistedStats, std::io::Error> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(std::io::Error::other)
}

/// Thread-safe shared activity log.
pub type SharedActivityLog = Arc<ActivityLog>;

pub fn create_shared_log() -> SharedActivityLog {
    Arc::new(ActivityLog::new())
}

pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedActivityLog {
    Arc::new(ActivityLog::with_persistence(path))
}
