//! Screen-corner failsafe.
//!
//! While a run is counting down or clicking, the cursor is sampled on a fixed
//! period. Moving it into the top-left corner panic-stops the run.

use crate::engine::controller::Controller;
use crate::engine::state::{PanicCause, Phase, RunId};
use crate::input::sink::CursorSource;
use crate::input::types::Position;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_CORNER_PX: i32 = 2;
pub const DEFAULT_POLL_PERIOD: Duration = Duration::from_millis(50);

/// The reserved top-left square, inclusive on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailsafeRegion {
    pub corner: i32,
}

impl Default for FailsafeRegion {
    fn default() -> Self {
        Self {
            corner: DEFAULT_CORNER_PX,
        }
    }
}

impl FailsafeRegion {
    pub fn new(corner: i32) -> Self {
        Self {
            corner: corner.max(0),
        }
    }

    pub fn contains(&self, pos: Position) -> bool {
        (0..=self.corner).contains(&pos.x) && (0..=self.corner).contains(&pos.y)
    }
}

/// Edge detector over cursor samples: fires once per entry into the region.
#[derive(Debug, Clone)]
pub struct Tripwire {
    region: FailsafeRegion,
    inside: bool,
}

impl Tripwire {
    pub fn new(region: FailsafeRegion) -> Self {
        Self {
            region,
            inside: false,
        }
    }

    /// Feed one sample. Returns `true` when the cursor just entered the region.
    pub fn observe(&mut self, pos: Position) -> bool {
        let inside = self.region.contains(pos);
        let tripped = inside && !self.inside;
        self.inside = inside;
        tripped
    }

    /// Forget the last sample so a cursor already in the corner trips again.
    pub fn rearm(&mut self) {
        self.inside = false;
    }
}

/// Background thread that panics the controller on a corner hit.
pub struct FailsafeMonitor {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl FailsafeMonitor {
    pub fn spawn(
        controller: Controller,
        cursor: Arc<dyn CursorSource>,
        region: FailsafeRegion,
        period: Duration,
    ) -> Self {
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let handle = thread::spawn(move || {
            let mut tripwire = Tripwire::new(region);
            let mut watched: Option<RunId> = None;
            let mut cursor_error_logged = false;

            loop {
                match stop_rx.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }

                let state = controller.snapshot();
                if !matches!(state.phase, Phase::Counting | Phase::Running) {
                    continue;
                }
                if state.run != watched {
                    tripwire.rearm();
                    watched = state.run;
                }

                match cursor.position() {
                    Ok(pos) => {
                        cursor_error_logged = false;
                        if tripwire.observe(pos) {
                            warn!(%pos, "Cursor reached failsafe corner");
                            if controller.panic(PanicCause::Failsafe).is_err() {
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        if !cursor_error_logged {
                            warn!("Failsafe cannot read the cursor: {e}");
                            cursor_error_logged = true;
                        }
                    }
                }
            }
            debug!("Failsafe monitor stopped");
        });

        Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        }
    }

    /// Stop sampling and join the thread.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for FailsafeMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
