//! Time sources for the scheduler.
//!
//! - [`SystemClock`] - monotonic wall clock, waits by sleeping the thread
//! - [`ManualClock`] - advanced explicitly, waits by jumping forward

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Millisecond time source.
pub trait Clock {
    /// Milliseconds since the clock's origin.
    fn now(&self) -> f64;

    /// Block until `now() >= deadline`.
    fn wait_until(&self, deadline: f64);
}

/// Monotonic clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }

    fn wait_until(&self, deadline: f64) {
        let remaining = deadline - self.now();
        if remaining > 0.0 {
            std::thread::sleep(Duration::from_secs_f64(remaining / 1000.0));
        }
    }
}

/// Deterministic clock for tests. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward by `ms`.
    pub fn advance(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
    }

    /// Jump to `ms` if it lies in the future.
    pub fn set(&self, ms: f64) {
        if ms > self.now.get() {
            self.now.set(ms);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.now.get()
    }

    fn wait_until(&self, deadline: f64) {
        self.set(deadline);
    }
}
