use rand::{thread_rng, Rng};
use std::time::Duration;

/// Exponential reconnect delay with up to 25% random jitter. Growth stops
/// after six doublings and the result never exceeds `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Backoff { base, max, attempt: 0 }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.base.as_millis() as u64;
        let exp = base.saturating_mul(1u64 << self.attempt.min(6));
        let jitter = thread_rng().gen_range(0..(exp / 4 + 1));
        self.attempt = self.attempt.saturating_add(1);
        Duration::from_millis(exp + jitter).min(self.max)
    }

    /// Call once a connection has opened.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::new(Duration::from_millis(500), Duration::from_secs(30))
    }
}
