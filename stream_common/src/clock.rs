//! Monotonic time source for schedulers.
//!
//! The session's ping and reconnect deadlines read time through `Clock` so tests can
//! drive them without sleeping.
use std::thread;
use std::time::{Duration, Instant};

/// Source of monotonic time and blocking waits.
pub trait Clock {
    /// Current instant.
    fn now(&self) -> Instant;
    /// Blocks the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// `Clock` backed by `Instant::now` and `thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}
