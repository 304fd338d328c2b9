//! Jittered exponential backoff, shared by the Governor's flood-wait
//! handling and (via the `spectra-governor` dependency) the persistence
//! layer's commit-retry loop — one formula, one place.

use chrono::Duration as ChronoDuration;
use rand::Rng;
use std::time::Duration;

/// `base * 2^attempt`, capped, multiplied by `U(1-variance, 1+variance)`.
///
/// `attempt` is zero-based: the first retry uses `attempt = 0` and gets
/// roughly `base` (modulo jitter); each subsequent retry doubles the
/// pre-jitter delay until `cap` is hit.
pub fn jittered_backoff(base: Duration, attempt: u32, cap: Duration, variance: f64) -> Duration {
    jittered_backoff_with(base, attempt, cap, variance, &mut rand::thread_rng())
}

pub fn jittered_backoff_with<R: Rng + ?Sized>(
    base: Duration,
    attempt: u32,
    cap: Duration,
    variance: f64,
    rng: &mut R,
) -> Duration {
    let exponent = attempt.min(32);
    let scaled_nanos = (base.as_nanos() as f64) * 2f64.powi(exponent as i32);
    let pre_jitter = scaled_nanos.min(cap.as_nanos() as f64);

    let variance = variance.clamp(0.0, 1.0);
    let factor = rng.gen_range((1.0 - variance)..=(1.0 + variance));
    let jittered_nanos = (pre_jitter * factor).max(0.0);

    Duration::from_nanos(jittered_nanos.min(cap.as_nanos() as f64 * (1.0 + variance)) as u64)
}

/// Convenience for call sites that track elapsed time with `chrono`
/// (the Governor's `next-eligible-at` bookkeeping) rather than `Instant`.
pub fn jittered_backoff_chrono(base: Duration, attempt: u32, cap: Duration, variance: f64) -> ChronoDuration {
    ChronoDuration::from_std(jittered_backoff(base, attempt, cap, variance))
        .unwrap_or_else(|_| ChronoDuration::milliseconds(cap.as_millis() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_with_attempt_and_respects_cap() {
        let base = Duration::from_millis(50);
        let cap = Duration::from_secs(2);
        for attempt in 0..10 {
            let d = jittered_backoff(base, attempt, cap, 0.0);
            assert!(d <= cap, "attempt {attempt} exceeded cap: {d:?}");
        }
    }

    #[test]
    fn zero_variance_is_deterministic_until_capped() {
        let base = Duration::from_millis(50);
        let cap = Duration::from_secs(10);
        let d0 = jittered_backoff(base, 0, cap, 0.0);
        let d1 = jittered_backoff(base, 1, cap, 0.0);
        assert_eq!(d0, Duration::from_millis(50));
        assert_eq!(d1, Duration::from_millis(100));
    }

    #[test]
    fn jitter_stays_within_variance_band() {
        let base = Duration::from_millis(1000);
        let cap = Duration::from_secs(60);
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let d = jittered_backoff_with(base, 0, cap, 0.3, &mut rng);
            assert!(d.as_millis() >= 690 && d.as_millis() <= 1310, "{d:?} outside band");
        }
    }
}
