//! Interruptible waits and halt requests for one run.
//!
//! The worker blocks on [`RunSignal::wait_until`] between ticks and performs
//! each press inside [`RunSignal::unless_halted`]. Halting takes the same lock,
//! so once `request_panic` returns no further press can start.

use crate::engine::state::PanicCause;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Instant;

/// Why a run was asked to end early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    Stop,
    Panic(PanicCause),
}

struct SignalInner {
    halt: Mutex<Option<Halt>>,
    wake: Condvar,
}

/// Shared cancellation flag with a condition variable.
#[derive(Clone)]
pub struct RunSignal {
    inner: Arc<SignalInner>,
}

impl RunSignal {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SignalInner {
                halt: Mutex::new(None),
                wake: Condvar::new(),
            }),
        }
    }

    /// Ask the run to wind down. Does not downgrade a pending panic.
    pub fn request_stop(&self) {
        let mut halt = self.inner.halt.lock();
        if halt.is_none() {
            *halt = Some(Halt::Stop);
        }
        self.inner.wake.notify_all();
    }

    /// Halt the run immediately. Overrides a pending stop; the first cause wins.
    ///
    /// Blocks while a press is in flight.
    pub fn request_panic(&self, cause: PanicCause) {
        let mut halt = self.inner.halt.lock();
        if !matches!(*halt, Some(Halt::Panic(_))) {
            *halt = Some(Halt::Panic(cause));
        }
        self.inner.wake.notify_all();
    }

    pub fn halted(&self) -> Option<Halt> {
        *self.inner.halt.lock()
    }

    /// Sleep until `deadline` or a halt request, whichever comes first.
    ///
    /// Returns the halt if one arrived, `None` if the deadline passed.
    pub fn wait_until(&self, deadline: Instant) -> Option<Halt> {
        let mut halt = self.inner.halt.lock();
        loop {
            if let Some(h) = *halt {
                return Some(h);
            }
            if Instant::now() >= deadline {
                return None;
            }
            // Spurious wakeups loop back to the checks above
            self.inner.wake.wait_until(&mut halt, deadline);
        }
    }

    /// Run `f` only if no halt is pending, holding the lock for its duration.
    pub fn unless_halted<T>(&self, f: impl FnOnce() -> T) -> Result<T, Halt> {
        let halt = self.inner.halt.lock();
        if let Some(h) = *halt {
            return Err(h);
        }
        let out = f();
        drop(halt);
        Ok(out)
    }
}

impl Default for RunSignal {
    fn default() -> Self {
        Self::new()
    }
}
