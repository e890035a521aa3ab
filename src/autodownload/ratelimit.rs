//! A small first-party token bucket (spec §4.9), refilled lazily from
//! monotonic time deltas rather than a background ticker.

use std::time::Instant;

pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_second: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(rate_per_minute: u32) -> Self {
        let refill_per_second = rate_per_minute as f64 / 60.0;
        Self { capacity: rate_per_minute.max(1) as f64, tokens: rate_per_minute as f64, refill_per_second, last_refill: Instant::now() }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_second).min(self.capacity);
        self.last_refill = now;
    }

    /// Attempts to take one token; returns whether the request is admitted.
    pub fn try_take(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}
