//! Exponential backoff with full jitter, per §4.5:
//! `wait = base * multiplier^(k-1) + jitter`, jitter uniform in
//! `[0, wait/2]`.

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    multiplier: u32,
}

impl Backoff {
    pub fn new(base: Duration, multiplier: u32) -> Self {
        Self { base, multiplier }
    }

    /// Delay before attempt `k + 1`, `k` is 1-indexed (the attempt
    /// number just completed).
    pub fn delay(&self, k: usize) -> Duration {
        let exponent = (k.saturating_sub(1)) as u32;
        let multiplier = self.multiplier.saturating_pow(exponent);
        self.base
            .checked_mul(multiplier)
            .unwrap_or(Duration::from_secs(u64::MAX / 2))
    }

    /// Full jitter: returns a delay uniformly sampled in `[0, wait/2]`
    /// added on top of the base wait — i.e. the final sleep is in
    /// `[wait, wait * 1.5]`... per spec it's `wait + jitter` where
    /// jitter itself is uniform in `[0, wait/2]`.
    pub fn delay_with_jitter(&self, k: usize) -> Duration {
        let wait = self.delay(k);
        let max_jitter_ms = (wait.as_millis() as u64 / 2).max(1);
        let jitter_ms = rand::thread_rng().gen_range(0..=max_jitter_ms);
        wait + Duration::from_millis(jitter_ms)
    }
}
