//! Leaky-bucket admission counter: `capacity` tokens draining to zero
//! over `period`, refilled continuously rather than in discrete ticks
//! so two admissions 1ms apart don't see artificially different state
//! than two admissions spanning a tick boundary.

use chrono::{DateTime, Utc};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct LeakyBucket {
    capacity: f64,
    refill_per_sec: f64,
    tokens: f64,
    last_refill: DateTime<Utc>,
}

impl LeakyBucket {
    pub fn new(capacity: u32, period: Duration, now: DateTime<Utc>) -> Self {
        let capacity = capacity.max(1) as f64;
        let refill_per_sec = capacity / period.as_secs_f64().max(0.001);
        LeakyBucket { capacity, refill_per_sec, tokens: capacity, last_refill: now }
    }

    fn refill(&mut self, now: DateTime<Utc>) {
        let elapsed = (now - self.last_refill).num_milliseconds().max(0) as f64 / 1000.0;
        if elapsed <= 0.0 {
            return;
        }
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    /// Attempts to consume one token. Returns `None` on success, or
    /// `Some(wait)` — how long until a token would be available.
    pub fn try_consume(&mut self, now: DateTime<Utc>) -> Option<Duration> {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            None
        } else {
            let deficit = 1.0 - self.tokens;
            let seconds = deficit / self.refill_per_sec;
            Some(Duration::from_secs_f64(seconds.max(0.0)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn drains_and_refills() {
        let t0 = Utc::now();
        let mut bucket = LeakyBucket::new(2, Duration::from_secs(60), t0);
        assert!(bucket.try_consume(t0).is_none());
        assert!(bucket.try_consume(t0).is_none());
        let wait = bucket.try_consume(t0);
        assert!(wait.is_some());

        let later = t0 + ChronoDuration::seconds(30);
        assert!(bucket.try_consume(later).is_none(), "half a period should refill one of two tokens");
    }

    #[test]
    fn never_exceeds_capacity() {
        let t0 = Utc::now();
        let mut bucket = LeakyBucket::new(5, Duration::from_secs(10), t0);
        let far_future = t0 + ChronoDuration::hours(10);
        for _ in 0..5 {
            assert!(bucket.try_consume(far_future).is_none());
        }
        assert!(bucket.try_consume(far_future).is_some());
    }
}
