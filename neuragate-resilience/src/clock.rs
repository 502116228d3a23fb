//! A monotonic clock abstraction so breaker/retry tests never sleep
//! wall-clock time: production code uses `MonotonicClock`, tests wire
//! in a `ManualClock` and advance it deterministically.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

#[derive(Clone, Default)]
pub struct MonotonicClock {
    start: Option<Instant>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Some(Instant::now()),
        }
    }
}

impl Clock for MonotonicClock {
    fn now_millis(&self) -> u64 {
        self.start
            .unwrap_or_else(Instant::now)
            .elapsed()
            .as_millis() as u64
    }
}

/// Test double: starts at 0, advanced explicitly by the test.
#[derive(Clone, Default)]
pub struct ManualClock {
    millis: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by_millis: u64) {
        self.millis.fetch_add(by_millis, Ordering::SeqCst);
    }

    pub fn set(&self, millis: u64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}
