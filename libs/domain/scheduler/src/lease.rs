// [libs/domain/scheduler/src/lease.rs]
//! Account selection policy: round-robin, smart, and
//! pinned-with-fallback, layered on top of `Registry::list_leaseable`
//! and gated by the Governor's admission check so a busy account is
//! skipped rather than leased and immediately retried.

use crate::errors::SchedulerError;
use chrono::{DateTime, Utc};
use spectra_credentials::{AccountHandle, Registry};
use spectra_domain_models::Account;
use spectra_governor::{AdmitDecision, Governor, OpClass};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{instrument, warn};

#[derive(Debug, Clone, Copy)]
pub enum LeasePolicy {
    RoundRobin,
    Smart,
    /// Falls back to smart selection if the pinned account is absent
    /// from the leaseable set.
    Pinned(i64),
}

/// Picks and leases accounts on behalf of the worker pool. One
/// instance is shared by every worker; the round-robin cursor is the
/// only mutable state it carries itself — everything else is read
/// fresh from the Registry on each call.
pub struct AccountSelector {
    registry: Registry,
    round_robin_cursor: Mutex<Option<i64>>,
}

impl AccountSelector {
    pub fn new(registry: Registry) -> Self {
        AccountSelector { registry, round_robin_cursor: Mutex::new(None) }
    }

    /// Leases the best available account for `op_class` under `policy`.
    /// Accounts the Governor would currently throttle are skipped
    /// rather than leased; if every leaseable account is throttled this
    /// returns the smallest observed `RetryAfter`.
    #[instrument(skip(self, governor))]
    pub async fn lease(&self, policy: LeasePolicy, op_class: OpClass, governor: &Governor) -> Result<AccountHandle, SchedulerError> {
        let now = Utc::now();
        let candidates = self.registry.list_leaseable(now).await?;
        if candidates.is_empty() {
            return Err(SchedulerError::NoEligibleAccount);
        }

        let ordered = self.order_candidates(policy, candidates);
        let mut min_wait: Option<Duration> = None;

        for account in ordered {
            match governor.admit(account.id, op_class) {
                AdmitDecision::RetryAfter(wait) => {
                    min_wait = Some(min_wait.map_or(wait, |current| current.min(wait)));
                    continue;
                }
                AdmitDecision::Admitted => match self.registry.lease(&account.session_name, now).await {
                    Ok(handle) => {
                        if matches!(policy, LeasePolicy::RoundRobin) {
                            *self.round_robin_cursor.lock().expect("round robin cursor mutex poisoned") = Some(handle.account_id);
                        }
                        return Ok(handle);
                    }
                    Err(spectra_credentials::RegistryError::AlreadyLeased(_)) => continue,
                    Err(other) => return Err(other.into()),
                },
            }
        }

        match min_wait {
            Some(wait) => Err(SchedulerError::RetryAfter(wait)),
            None => Err(SchedulerError::NoEligibleAccount),
        }
    }

    pub fn release(&self, handle: &AccountHandle) {
        self.registry.release(handle);
    }

    /// Notifies the Registry of an unrecoverable auth failure: the
    /// account transitions to `banned` so a later lease attempt skips
    /// it, and the caller's job re-enters the queue for a different
    /// account to pick up.
    pub async fn mark_banned(&self, account_id: i64) -> Result<(), SchedulerError> {
        self.registry
            .record_health(account_id, spectra_domain_models::AccountHealth::Banned, None)
            .await
            .map_err(SchedulerError::from)
    }

    fn order_candidates(&self, policy: LeasePolicy, mut candidates: Vec<Account>) -> Vec<Account> {
        match policy {
            LeasePolicy::RoundRobin => {
                let cursor = *self.round_robin_cursor.lock().expect("round robin cursor mutex poisoned");
                order_round_robin(candidates, cursor)
            }
            LeasePolicy::Smart => {
                order_smart(&mut candidates);
                candidates
            }
            LeasePolicy::Pinned(account_id) => {
                if let Some(position) = candidates.iter().position(|account| account.id == account_id) {
                    let pinned = candidates.remove(position);
                    order_smart(&mut candidates);
                    let mut ordered = Vec::with_capacity(candidates.len() + 1);
                    ordered.push(pinned);
                    ordered.extend(candidates);
                    ordered
                } else {
                    warn!(account_id, "pinned account is not leaseable, falling back to smart selection");
                    order_smart(&mut candidates);
                    candidates
                }
            }
        }
    }
}

/// Rotates strictly through ascending account ids starting just after
/// `cursor` (the last id actually leased), wrapping at the end of the
/// leaseable set. The cursor only advances on a successful lease, in
/// `lease()` above — this only computes the candidate order for one
/// attempt.
fn order_round_robin(mut candidates: Vec<Account>, cursor: Option<i64>) -> Vec<Account> {
    candidates.sort_by_key(|account| account.id);
    let split_at = match cursor {
        Some(last) => candidates.iter().position(|account| account.id > last).unwrap_or(0),
        None => 0,
    };
    candidates.rotate_left(split_at);
    candidates
}

/// Oldest `last_used_at` first (accounts never leased sort first,
/// since `None < Some(_)`), ties broken by lowest usage counter.
fn order_smart(candidates: &mut [Account]) {
    candidates.sort_by_key(|account| (account.last_used_at, account.usage_counter));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(id: i64, usage_counter: u64, last_used_at: Option<DateTime<Utc>>) -> Account {
        Account {
            id,
            session_name: format!("acct-{id}"),
            api_id: 1,
            api_hash: "hash".into(),
            phone_number: "+10000000000".into(),
            password: None,
            proxy_id: None,
            usage_counter,
            last_used_at,
            cooldown_until: None,
            health: spectra_domain_models::AccountHealth::Active,
        }
    }

    #[test]
    fn smart_prefers_oldest_last_used_then_lowest_usage() {
        let mut accounts = vec![
            account(1, 5, Some(Utc::now())),
            account(2, 1, None),
            account(3, 2, None),
        ];
        order_smart(&mut accounts);
        assert_eq!(accounts[0].id, 2);
        assert_eq!(accounts[1].id, 3);
        assert_eq!(accounts[2].id, 1);
    }

    #[test]
    fn round_robin_rotates_from_cursor_and_wraps() {
        let candidates = vec![account(1, 0, None), account(2, 0, None), account(3, 0, None)];
        let ordered = order_round_robin(candidates, Some(2));
        let ids: Vec<i64> = ordered.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn round_robin_starts_from_front_with_no_cursor() {
        let candidates = vec![account(3, 0, None), account(1, 0, None), account(2, 0, None)];
        let ordered = order_round_robin(candidates, None);
        let ids: Vec<i64> = ordered.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
