//! Deadline-based click loop.
//!
//! Each tick's deadline is the previous deadline plus the interval, never
//! "now plus the interval", so time spent inside the sink does not accumulate
//! into drift. A late tick fires immediately and the schedule carries on from
//! the missed deadline, so a stall is paid back in full rather than skipped.

use crate::engine::session::{ClickKind, SessionConfig};
use crate::engine::signal::{Halt, RunSignal};
use crate::engine::state::RunEnd;
use crate::input::sink::{ClickSink, InjectionError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Gap between the two presses of a double click.
pub const DEFAULT_DOUBLE_CLICK_GAP: Duration = Duration::from_millis(50);

/// Late ticks fired back to back before the loop yields the thread. Deadlines
/// are never moved; the remaining backlog resumes after the yield.
pub const MAX_CATCH_UP: u32 = 20;

/// Progress notifications emitted by a running scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Whole seconds left in the start delay.
    Countdown { remaining_secs: u64 },
    /// Start delay elapsed; the first click is due now.
    Started,
    /// A (possibly double) click completed.
    Clicked { total: u64 },
}

/// Final result of a scheduler run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub end: RunEnd,
    pub clicks_issued: u64,
}

impl RunOutcome {
    fn halted(halt: Halt, clicks_issued: u64) -> Self {
        let end = match halt {
            Halt::Stop => RunEnd::Stopped,
            Halt::Panic(cause) => RunEnd::Panicked(cause),
        };
        Self { end, clicks_issued }
    }
}

enum PressError {
    Halted(Halt),
    Sink(InjectionError),
}

/// Drives a [`ClickSink`] for one run.
pub struct ClickScheduler {
    config: Arc<SessionConfig>,
    sink: Arc<dyn ClickSink>,
    signal: RunSignal,
    double_click_gap: Duration,
}

impl ClickScheduler {
    pub fn new(config: Arc<SessionConfig>, sink: Arc<dyn ClickSink>, signal: RunSignal) -> Self {
        Self {
            config,
            sink,
            signal,
            double_click_gap: DEFAULT_DOUBLE_CLICK_GAP,
        }
    }

    pub fn with_double_click_gap(mut self, gap: Duration) -> Self {
        self.double_click_gap = gap;
        self
    }

    /// Run the countdown and the click loop until the limit, a halt, or a sink failure.
    pub fn run(&self, mut progress: impl FnMut(Progress)) -> RunOutcome {
        if let Some(delay) = self.config.start_delay() {
            if let Some(halt) = self.countdown(delay, &mut progress) {
                return RunOutcome::halted(halt, 0);
            }
        }
        progress(Progress::Started);

        let interval = self.config.interval();
        let limit = self.config.click_limit();
        let mut deadline = Instant::now();
        let mut issued: u64 = 0;
        let mut late_streak: u32 = 0;

        loop {
            if let Some(halt) = self.signal.wait_until(deadline) {
                return RunOutcome::halted(halt, issued);
            }

            let behind = Instant::now().saturating_duration_since(deadline);
            if behind > interval {
                late_streak += 1;
                if late_streak > MAX_CATCH_UP {
                    debug!(
                        behind_ms = u64::try_from(behind.as_millis()).unwrap_or(u64::MAX),
                        "Catch-up burst capped, yielding"
                    );
                    late_streak = 0;
                    thread::yield_now();
                    continue;
                }
            } else {
                late_streak = 0;
            }

            match self.click_once() {
                Ok(()) => {}
                Err(PressError::Halted(halt)) => return RunOutcome::halted(halt, issued),
                Err(PressError::Sink(e)) => {
                    warn!("Click injection failed after {issued} clicks: {e}");
                    return RunOutcome {
                        end: RunEnd::Failed(e),
                        clicks_issued: issued,
                    };
                }
            }

            issued += 1;
            progress(Progress::Clicked { total: issued });

            if limit.is_some_and(|limit| issued >= limit) {
                debug!(issued, "Click limit reached");
                return RunOutcome {
                    end: RunEnd::Completed,
                    clicks_issued: issued,
                };
            }

            deadline += interval;
        }
    }

    /// Count down `delay`, reporting each whole second remaining.
    fn countdown(&self, delay: Duration, progress: &mut impl FnMut(Progress)) -> Option<Halt> {
        let end = Instant::now() + delay;
        loop {
            let now = Instant::now();
            if now >= end {
                return None;
            }
            let remaining = end - now;
            let remaining_secs = ((remaining.as_millis() + 999) / 1000) as u64;
            progress(Progress::Countdown { remaining_secs });

            // Wake when the displayed second changes
            let next_step = remaining.saturating_sub(Duration::from_secs(remaining_secs - 1));
            if let Some(halt) = self.signal.wait_until(now + next_step) {
                return Some(halt);
            }
        }
    }

    /// Issue one counted click: one press, or two separated by the gap.
    fn click_once(&self) -> Result<(), PressError> {
        self.press()?;
        if self.config.kind() == ClickKind::Double {
            if let Some(halt) = self
                .signal
                .wait_until(Instant::now() + self.double_click_gap)
            {
                return Err(PressError::Halted(halt));
            }
            self.press()?;
        }
        Ok(())
    }

    fn press(&self) -> Result<(), PressError> {
        let button = self.config.button();
        let target = self.config.target();
        self.signal
            .unless_halted(|| self.sink.click(button, target))
            .map_err(PressError::Halted)?
            .map_err(PressError::Sink)
    }
}
