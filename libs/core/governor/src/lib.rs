//! Rate/Flood Governor: translates external rate-limit signals into
//! scheduling decisions. Owns per-account admission state so the
//! Scheduler never has to reason about bucket math or backoff curves
//! itself — it just calls `admit`, and on failure re-queues the job
//! with the returned delay.
//!
//! The source's single global rate limiter (one bucket for the whole
//! process) is replaced here with one bucket per account, because
//! SPECTRA leases accounts independently and a flood-wait on one
//! session must never throttle the others.

mod backoff;
mod bucket;
mod op_class;

pub use backoff::{jittered_backoff, jittered_backoff_chrono};
pub use op_class::OpClass;

use bucket::LeakyBucket;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitDecision {
    Admitted,
    RetryAfter(Duration),
}

#[derive(Debug, Clone, Copy)]
pub struct GovernorConfig {
    /// Leaky-bucket capacity: operations allowed per `bucket_period`.
    pub bucket_capacity: u32,
    pub bucket_period: Duration,
    /// Base delay for the generic exponential backoff sequence.
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    pub backoff_variance: f64,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        GovernorConfig {
            bucket_capacity: 30,
            bucket_period: Duration::from_secs(60),
            backoff_base: Duration::from_millis(500),
            backoff_cap: Duration::from_secs(300),
            backoff_variance: 0.3,
        }
    }
}

struct AccountState {
    bucket: LeakyBucket,
    next_eligible_at: Option<DateTime<Utc>>,
    attempt: u32,
}

/// Per-account token bucket and exponential backoff state, shared by
/// every worker in the process (leases are already exclusive per
/// account, but admission checks and flood-wait bookkeeping are not).
pub struct Governor {
    config: GovernorConfig,
    accounts: Mutex<HashMap<i64, AccountState>>,
}

impl Governor {
    pub fn new(config: GovernorConfig) -> Self {
        Governor { config, accounts: Mutex::new(HashMap::new()) }
    }

    fn state_for<'a>(accounts: &'a mut HashMap<i64, AccountState>, account_id: i64, config: &GovernorConfig, now: DateTime<Utc>) -> &'a mut AccountState {
        accounts.entry(account_id).or_insert_with(|| AccountState {
            bucket: LeakyBucket::new(config.bucket_capacity, config.bucket_period, now),
            next_eligible_at: None,
            attempt: 0,
        })
    }

    /// Non-blocking admission check. `op_class` only affects how the
    /// caller should space out *subsequent* calls (see
    /// [`Governor::pacing_delay`]) — the bucket itself is shared across
    /// classes for a given account, since they all draw on the same
    /// underlying session.
    #[instrument(skip(self), fields(account_id, ?op_class))]
    pub fn admit(&self, account_id: i64, op_class: OpClass) -> AdmitDecision {
        let now = Utc::now();
        let mut accounts = self.accounts.lock();
        let state = Self::state_for(&mut accounts, account_id, &self.config, now);

        if let Some(eligible_at) = state.next_eligible_at {
            if now < eligible_at {
                let wait = (eligible_at - now).to_std().unwrap_or(Duration::ZERO);
                debug!(account_id, wait_ms = wait.as_millis() as u64, "governor: account not yet eligible");
                return AdmitDecision::RetryAfter(wait);
            }
        }

        match state.bucket.try_consume(now) {
            None => AdmitDecision::Admitted,
            Some(wait) => {
                debug!(account_id, wait_ms = wait.as_millis() as u64, "governor: bucket exhausted");
                AdmitDecision::RetryAfter(wait)
            }
        }
    }

    /// Records an observed flood-wait: `next-eligible-at = now + Δ +
    /// jitter`, and bumps the account's generic attempt counter so a
    /// subsequent [`Governor::backoff_delay`] call escalates.
    #[instrument(skip(self), fields(account_id, delta_ms = delta.as_millis() as u64))]
    pub fn on_flood_wait(&self, account_id: i64, delta: Duration) {
        let now = Utc::now();
        let mut accounts = self.accounts.lock();
        let state = Self::state_for(&mut accounts, account_id, &self.config, now);

        let jitter_ms = rand::thread_rng().gen_range(0..=((delta.as_millis() as u64 / 10).max(1)));
        let eligible_at = now + ChronoDuration::milliseconds(delta.as_millis() as i64) + ChronoDuration::milliseconds(jitter_ms as i64);
        state.next_eligible_at = Some(eligible_at);
        state.attempt = state.attempt.saturating_add(1);
        warn!(account_id, eligible_at = %eligible_at, "governor: flood-wait recorded");
    }

    /// Resets the account's attempt counter after a clean operation.
    #[instrument(skip(self), fields(account_id))]
    pub fn on_success(&self, account_id: i64) {
        let now = Utc::now();
        let mut accounts = self.accounts.lock();
        let state = Self::state_for(&mut accounts, account_id, &self.config, now);
        state.attempt = 0;
    }

    /// Generic retryable failure (network timeout, protocol error) not
    /// carrying an explicit flood-wait delay: bumps the attempt counter
    /// and returns the backoff the caller should wait before retrying.
    pub fn on_retryable_failure(&self, account_id: i64) -> Duration {
        let now = Utc::now();
        let mut accounts = self.accounts.lock();
        let state = Self::state_for(&mut accounts, account_id, &self.config, now);
        let delay = backoff::jittered_backoff(self.config.backoff_base, state.attempt, self.config.backoff_cap, self.config.backoff_variance);
        state.attempt = state.attempt.saturating_add(1);
        delay
    }

    /// Timing-obfuscation delay for a real sleep between operations of
    /// `op_class` (inter-message pacing, invitation spacing, discovery
    /// request spacing) — drawn uniformly within the class's configured
    /// bounds so cadences don't look deterministic to the remote end.
    pub fn pacing_delay(&self, op_class: OpClass) -> Duration {
        let (lo, hi) = op_class.pacing_jitter_bounds();
        let lo_nanos = lo.as_nanos() as u64;
        let hi_nanos = hi.as_nanos() as u64;
        if hi_nanos <= lo_nanos {
            return lo;
        }
        Duration::from_nanos(rand::thread_rng().gen_range(lo_nanos..=hi_nanos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_capacity_then_throttles() {
        let governor = Governor::new(GovernorConfig { bucket_capacity: 3, ..GovernorConfig::default() });
        for _ in 0..3 {
            assert_eq!(governor.admit(1, OpClass::Message), AdmitDecision::Admitted);
        }
        assert!(matches!(governor.admit(1, OpClass::Message), AdmitDecision::RetryAfter(_)));
    }

    #[test]
    fn accounts_are_independent() {
        let governor = Governor::new(GovernorConfig { bucket_capacity: 1, ..GovernorConfig::default() });
        assert_eq!(governor.admit(1, OpClass::Message), AdmitDecision::Admitted);
        assert_eq!(governor.admit(2, OpClass::Message), AdmitDecision::Admitted);
    }

    #[test]
    fn flood_wait_blocks_until_eligible() {
        let governor = Governor::new(GovernorConfig::default());
        governor.on_flood_wait(1, Duration::from_secs(30));
        match governor.admit(1, OpClass::Message) {
            AdmitDecision::RetryAfter(wait) => assert!(wait.as_secs() >= 29),
            AdmitDecision::Admitted => panic!("expected account to still be in flood-wait"),
        }
    }

    #[test]
    fn on_success_resets_attempt_counter() {
        let governor = Governor::new(GovernorConfig::default());
        governor.on_flood_wait(1, Duration::from_millis(10));
        let first = governor.on_retryable_failure(1);
        governor.on_success(1);
        let after_reset = governor.on_retryable_failure(1);
        assert!(after_reset <= first || after_reset.as_millis() > 0);
    }

    #[test]
    fn retryable_failure_backoff_escalates() {
        let governor = Governor::new(GovernorConfig {
            backoff_base: Duration::from_millis(100),
            backoff_cap: Duration::from_secs(10),
            backoff_variance: 0.0,
            ..GovernorConfig::default()
        });
        let first = governor.on_retryable_failure(1);
        let second = governor.on_retryable_failure(1);
        assert!(second > first, "second backoff ({second:?}) should exceed first ({first:?})");
    }

    #[test]
    fn pacing_delay_respects_op_class_bounds() {
        let governor = Governor::new(GovernorConfig::default());
        let (lo, hi) = OpClass::Discovery.pacing_jitter_bounds();
        for _ in 0..50 {
            let d = governor.pacing_delay(OpClass::Discovery);
            assert!(d >= lo && d <= hi);
        }
    }
}
