// [libs/domain/forwarder/src/invitations.rs]
//! Invitation Sub-Pipeline: joins a pinned invitee account to a
//! destination on behalf of `discover-and-forward` forwarding, pacing
//! attempts with jittered delays so accepted invites don't arrive in
//! an obviously automated cadence.
//!
//! Not one of the three `JobQueue`-backed pipelines — `InvitationTask`
//! rows are driven by their own periodic loop (the orchestrator's
//! responsibility; see `InvitationRepository`'s module doc for the
//! `invitation_state.json` mirroring contract) rather than through
//! `WorkerPool`.

use crate::errors::ForwarderError;
use crate::resolve::resolve_for_account;
use chrono::Utc;
use rand::Rng;
use spectra_domain_models::{InvitationDelaysConfig, InvitationState};
use spectra_governor::{Governor, OpClass};
use spectra_persistence::Repositories;
use spectra_scheduler::{AccountSelector, LeasePolicy};
use spectra_telegram_client::TelegramClient;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

pub struct InvitationDispatcher {
    repositories: Repositories,
    client: Arc<dyn TelegramClient>,
    selector: Arc<AccountSelector>,
    governor: Arc<Governor>,
    delays: InvitationDelaysConfig,
}

impl InvitationDispatcher {
    pub fn new(repositories: Repositories, client: Arc<dyn TelegramClient>, selector: Arc<AccountSelector>, governor: Arc<Governor>, delays: InvitationDelaysConfig) -> Self {
        InvitationDispatcher { repositories, client, selector, governor, delays }
    }

    /// Processes up to `limit` eligible tasks, pacing between each with
    /// a jittered delay drawn from `delays`. Returns the number of
    /// tasks actually attempted.
    #[instrument(skip(self))]
    pub async fn run_once(&self, limit: u32) -> Result<u32, ForwarderError> {
        let now = Utc::now();
        let tasks = self.repositories.invitations.list_eligible(now, limit).await?;

        let mut attempted = 0u32;
        for task in tasks {
            self.attempt(task.destination_entity_id, task.invitee_account_id).await;
            attempted += 1;

            let pacing = self.jittered_invitation_delay();
            if pacing > Duration::ZERO {
                tokio::time::sleep(pacing).await;
            }
        }
        Ok(attempted)
    }

    async fn attempt(&self, destination_entity_id: i64, invitee_account_id: i64) {
        let account = match self.selector.lease(LeasePolicy::Pinned(invitee_account_id), OpClass::Invitation, &self.governor).await {
            Ok(account) => account,
            Err(error) => {
                warn!(destination_entity_id, invitee_account_id, %error, "could not lease invitee account, deferring");
                let next_eligible_at = Utc::now() + chrono::Duration::seconds(self.delays.min_seconds as i64);
                let _ = self.repositories.invitations.record_outcome(destination_entity_id, invitee_account_id, InvitationState::Failed, Some(next_eligible_at)).await;
                return;
            }
        };

        let outcome = self.join(destination_entity_id, &account).await;
        self.selector.release(&account);

        let (state, next_eligible_at) = match outcome {
            Ok(()) => {
                info!(destination_entity_id, invitee_account_id, "invitation succeeded");
                (InvitationState::Succeeded, None)
            }
            Err(error) => {
                warn!(destination_entity_id, invitee_account_id, %error, "invitation attempt failed");
                (InvitationState::Failed, Some(Utc::now() + chrono::Duration::seconds(self.jittered_invitation_delay().as_secs() as i64)))
            }
        };

        if let Err(error) = self.repositories.invitations.record_outcome(destination_entity_id, invitee_account_id, state, next_eligible_at).await {
            warn!(destination_entity_id, invitee_account_id, %error, "failed to record invitation outcome");
        }
    }

    async fn join(&self, destination_entity_id: i64, account: &spectra_credentials::AccountHandle) -> Result<(), ForwarderError> {
        let destination = resolve_for_account(&self.repositories, self.client.as_ref(), account, destination_entity_id).await?;
        self.client.join(account, &destination).await?;
        Ok(())
    }

    /// Uniform delay around the midpoint of `[min_seconds, max_seconds]`,
    /// spread by `variance` — a jittered delay drawn from the
    /// configured bounds.
    fn jittered_invitation_delay(&self) -> Duration {
        let midpoint = (self.delays.min_seconds + self.delays.max_seconds) as f64 / 2.0;
        let variance = self.delays.variance.clamp(0.0, 1.0);
        let lo = (midpoint * (1.0 - variance)).max(self.delays.min_seconds as f64);
        let hi = (midpoint * (1.0 + variance)).min(self.delays.max_seconds as f64);
        let seconds = if hi > lo { rand::thread_rng().gen_range(lo..=hi) } else { self.delays.min_seconds as f64 };
        Duration::from_secs_f64(seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jittered_delay_stays_within_configured_bounds() {
        let delays = InvitationDelaysConfig { min_seconds: 120, max_seconds: 600, variance: 0.3 };
        let dispatcher_delay_fn = |delays: &InvitationDelaysConfig| {
            let midpoint = (delays.min_seconds + delays.max_seconds) as f64 / 2.0;
            let variance = delays.variance.clamp(0.0, 1.0);
            let lo = (midpoint * (1.0 - variance)).max(delays.min_seconds as f64);
            let hi = (midpoint * (1.0 + variance)).min(delays.max_seconds as f64);
            rand::thread_rng().gen_range(lo..=hi)
        };
        for _ in 0..100 {
            let seconds = dispatcher_delay_fn(&delays);
            assert!(seconds >= 120.0 && seconds <= 600.0);
        }
    }
}
