// [libs/domain/forwarder/src/pipeline.rs]
//! The Forwarder: resolves source and destination entities, walks
//! each source from its resumption cursor, groups and
//! deduplicates the batch, and dispatches the survivors — selective,
//! total, or discover-and-forward — while holding the destination's
//! fingerprint lock for the whole batch so two jobs can never race the
//! same destination's dedup set.
//!
//! Grounded on the Archival pipeline's `Runner<Q>` shape (same crate
//! family, same worker pool) and on `spectra_governor::OpClass::Message`
//! for pacing between individual forward/send calls.

use crate::dedup::{is_duplicate, CandidateFingerprint};
use crate::errors::ForwarderError;
use crate::grouping;
use crate::resolve::resolve_for_account;
use async_trait::async_trait;
use chrono::Utc;
use spectra_credentials::AccountHandle;
use spectra_domain_models::{
    canonical_fingerprint_sha256, ForwardFingerprint, ForwardJob, ForwardMode, NearDuplicateThresholds,
};
use spectra_governor::{Governor, OpClass};
use spectra_persistence::{ForwardJobRepository, KeyedLockTable, Repositories};
use spectra_scheduler::{JobQueue, Runner, StepOutcome};
use spectra_telegram_client::{
    ClientError, ForwardRequest, HistoryPage, RemoteMessage, ResolvedEntity, SendRequest, TelegramClient,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

pub const OP_CLASS: OpClass = OpClass::Message;

pub struct ForwarderPipeline {
    repositories: Repositories,
    fingerprint_locks: KeyedLockTable,
    client: Arc<dyn TelegramClient>,
    governor: Arc<Governor>,
    enable_near_duplicates: bool,
    near_duplicate_thresholds: NearDuplicateThresholds,
}

impl ForwarderPipeline {
    pub fn new(
        repositories: Repositories,
        fingerprint_locks: KeyedLockTable,
        client: Arc<dyn TelegramClient>,
        governor: Arc<Governor>,
        enable_near_duplicates: bool,
        near_duplicate_thresholds: NearDuplicateThresholds,
    ) -> Self {
        ForwarderPipeline { repositories, fingerprint_locks, client, governor, enable_near_duplicates, near_duplicate_thresholds }
    }

    #[instrument(skip(self, job, account), fields(job_id = job.id, destination = job.destination_entity_id))]
    async fn run_job(&self, job: &ForwardJob, account: &AccountHandle) -> Result<u32, ForwarderError> {
        let _guard = self.fingerprint_locks.lock(job.destination_entity_id).await;

        let destination = resolve_for_account(&self.repositories, self.client.as_ref(), account, job.destination_entity_id).await?;
        let thresholds = self.near_duplicate_thresholds;

        // Selective and Total modes differ only in how the operator
        // layer populated `source_entity_ids` before enqueueing (Total
        // expands it from the AccessRecord table); both drain the same
        // way here. DiscoverAndForward additionally seeds invitations
        // for entities the Discovery Crawler has queued as candidates,
        // which is that crate's responsibility to enqueue, not this
        // pipeline's.
        let mut delivered = 0u32;
        for &source_entity_id in &job.source_entity_ids {
            delivered += self.drain_source(job, account, &destination, source_entity_id, thresholds).await?;
        }

        info!(job_id = job.id, mode = ?job.mode, destination = job.destination_entity_id, delivered, "forward batch complete");
        Ok(delivered)
    }

    /// Walks one source entity from the job's shared resumption cursor
    /// to exhaustion, applying grouping and dedup per batch.
    async fn drain_source(
        &self,
        job: &ForwardJob,
        account: &AccountHandle,
        destination: &ResolvedEntity,
        source_entity_id: i64,
        thresholds: NearDuplicateThresholds,
    ) -> Result<u32, ForwarderError> {
        let source = resolve_for_account(&self.repositories, self.client.as_ref(), account, source_entity_id).await?;
        let mut cursor = Some(job.progress_cursor).filter(|c| *c > 0);
        let mut delivered = 0u32;

        loop {
            let page = HistoryPage { after_message_id: cursor, limit: 100, topic_id: None };
            let batch = self.client.history_page(account, &source, page).await?;
            if batch.is_empty() {
                break;
            }

            let max_id = batch.iter().map(|m| m.message_id).max().unwrap_or(cursor.unwrap_or(0));
            let groups = grouping::partition(batch, job.flags.grouping);

            for group in groups {
                if self.forward_group(job, account, &source, destination, &group, thresholds).await? {
                    delivered += group.len() as u32;
                }
            }

            self.repositories.forward_jobs.advance_cursor(job.id, max_id).await?;
            cursor = Some(max_id);

            if self.governor.pacing_delay(OP_CLASS) > Duration::ZERO {
                tokio::time::sleep(self.governor.pacing_delay(OP_CLASS)).await;
            }
        }

        Ok(delivered)
    }

    /// Dedups and dispatches one group, representing the whole group by
    /// its first message's fingerprint — dedup applies at group
    /// granularity, not per message. Returns whether the group was
    /// actually delivered.
    async fn forward_group(
        &self,
        job: &ForwardJob,
        account: &AccountHandle,
        source: &ResolvedEntity,
        destination: &ResolvedEntity,
        group: &[RemoteMessage],
        thresholds: NearDuplicateThresholds,
    ) -> Result<bool, ForwarderError> {
        let Some(representative) = group.first() else { return Ok(false) };

        if job.flags.enable_deduplication {
            let fingerprint = self.fingerprint_for(source.entity_id, representative).await?;
            let candidate = CandidateFingerprint {
                sha256: &fingerprint.sha256,
                perceptual_hash: fingerprint.perceptual_hash,
                fuzzy_hash: fingerprint.fuzzy_hash.as_deref(),
            };
            if is_duplicate(&self.repositories.fingerprints, job.destination_entity_id, &candidate, self.enable_near_duplicates, thresholds).await? {
                return Ok(false);
            }

            self.dispatch(job, account, source, destination, group).await?;

            self.repositories
                .fingerprints
                .insert(&ForwardFingerprint {
                    destination_entity_id: job.destination_entity_id,
                    sha256: fingerprint.sha256,
                    perceptual_hash: fingerprint.perceptual_hash,
                    fuzzy_hash: fingerprint.fuzzy_hash,
                    first_seen_at: Utc::now(),
                    origin_entity_id: source.entity_id,
                })
                .await?;
        } else {
            self.dispatch(job, account, source, destination, group).await?;
        }

        Ok(true)
    }

    /// Canonical fingerprint for a message, preferring an already
    /// archived copy's real media hashes over a file-reference proxy —
    /// the Archival pipeline may have captured this same entity
    /// separately, and re-downloading media purely to fingerprint it
    /// during a live forward would double the bandwidth for no gain.
    async fn fingerprint_for(&self, source_entity_id: i64, message: &RemoteMessage) -> Result<ForwardFingerprint, ForwarderError> {
        let mut media_sha256 = None;
        let mut media_mime = None;
        let mut perceptual_hash = None;
        let mut fuzzy_hash = None;

        if let Some(archived) = self.repositories.messages.get(source_entity_id, message.message_id).await? {
            if let Some(media_id) = archived.media_id {
                if let Some(media) = self.repositories.media.get_by_id(media_id).await? {
                    media_sha256 = Some(media.sha256);
                    media_mime = Some(media.mime_type);
                    perceptual_hash = media.phash;
                    fuzzy_hash = media.fuzzy_hash;
                }
            }
        } else if let Some(descriptor) = &message.media {
            use sha2::{Digest, Sha256};
            let mut hasher = Sha256::new();
            hasher.update(descriptor.file_reference.as_bytes());
            media_sha256 = Some(hex::encode(hasher.finalize()));
            media_mime = Some(descriptor.mime_type.clone());
        }

        let sha256 = canonical_fingerprint_sha256(message.text.as_deref(), media_sha256.as_deref(), media_mime.as_deref(), &message.caption_entities);
        Ok(ForwardFingerprint { destination_entity_id: 0, sha256, perceptual_hash, fuzzy_hash, first_seen_at: Utc::now(), origin_entity_id: source_entity_id })
    }

    /// Native forward by default, or a text-only copy when
    /// `copy_into_destination` is set. The opaque `TelegramClient::send`
    /// seam carries no media payload, so a media group under
    /// copy-mode is represented by its caption text alone — a known
    /// limitation, not an oversight.
    async fn dispatch(&self, job: &ForwardJob, account: &AccountHandle, source: &ResolvedEntity, destination: &ResolvedEntity, group: &[RemoteMessage]) -> Result<(), ForwarderError> {
        if job.flags.copy_into_destination {
            let mut text = group.iter().filter_map(|m| m.text.as_deref()).collect::<Vec<_>>().join("\n");
            if job.flags.prepend_origin_info {
                text = format!("[forwarded from {}]\n{text}", source.title);
            }
            self.client.send(account, SendRequest { destination_entity: destination.clone(), text }).await?;
        } else {
            let message_ids = group.iter().map(|m| m.message_id).collect();
            self.client
                .forward(account, ForwardRequest { source_entity: source.clone(), destination_entity: destination.clone(), message_ids, copy_into_destination: false })
                .await?;
        }

        if let Some(secondary) = job.flags.secondary_unique_destination {
            if let Ok(secondary_entity) = resolve_for_account(&self.repositories, self.client.as_ref(), account, secondary).await {
                let message_ids = group.iter().map(|m| m.message_id).collect();
                if let Err(error) = self
                    .client
                    .forward(account, ForwardRequest { source_entity: source.clone(), destination_entity: secondary_entity, message_ids, copy_into_destination: job.flags.copy_into_destination })
                    .await
                {
                    warn!(secondary_destination = secondary, %error, "best-effort secondary delivery failed");
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Runner<ForwardJobRepository> for ForwarderPipeline {
    async fn run(&self, job: ForwardJob, account: AccountHandle) -> StepOutcome {
        match self.run_job(&job, &account).await {
            Ok(_delivered) => StepOutcome::Completed,
            Err(error) => classify(error),
        }
    }
}

fn classify(error: ForwarderError) -> StepOutcome {
    match error {
        ForwarderError::Client(ClientError::FloodWait(delay)) => StepOutcome::Retry { cause: "flood wait".to_string(), after: delay },
        ForwarderError::Client(ClientError::Auth) => StepOutcome::AuthFailure { cause: "authentication failed or was revoked".to_string() },
        ForwarderError::Client(ClientError::Cancelled) => StepOutcome::Cancelled,
        other => StepOutcome::Retry { cause: other.to_string(), after: Duration::from_secs(30) },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectra_domain_models::{EntityKind, ForwardFlags, JobStatus, MessageKind};
    use spectra_persistence::Store;
    use spectra_telegram_client::{RemoteMediaDescriptor, SimulatedTelegramClient};

    fn account() -> AccountHandle {
        AccountHandle { account_id: 1, session_name: "acct-1".into() }
    }

    async fn pipeline_with_store() -> (ForwarderPipeline, Arc<SimulatedTelegramClient>) {
        let store = Store::connect(":memory:", None).await.unwrap();
        let repositories = Repositories::new(store.clone());
        let client = Arc::new(SimulatedTelegramClient::new());
        let governor = Arc::new(Governor::new(Default::default()));
        let thresholds = NearDuplicateThresholds { perceptual_hash_distance: 6, fuzzy_similarity: 85 };
        let pipeline = ForwarderPipeline::new(repositories, store.fingerprint_locks.clone(), client.clone(), governor, true, thresholds);
        (pipeline, client)
    }

    fn remote(id: i64, text: &str) -> RemoteMessage {
        RemoteMessage { message_id: id, sender_id: Some(3), kind: MessageKind::Text, date: Utc::now(), edit_date: None, text: Some(text.to_string()), reply_to: None, media: None, caption_entities: Vec::new() }
    }

    fn job(id: i64, sources: Vec<i64>, destination: i64, flags: ForwardFlags) -> ForwardJob {
        ForwardJob { id, source_entity_ids: sources, destination_entity_id: destination, mode: ForwardMode::Selective, flags, progress_cursor: 0, status: JobStatus::Running, attempts: 0, cause: None, pinned_account_id: None }
    }

    #[tokio::test]
    async fn forwards_a_backlog_and_advances_the_cursor() {
        let (pipeline, client) = pipeline_with_store().await;
        client.seed_entity("entity:1", ResolvedEntity { entity_id: 1, access_hash: 1, title: "Source".into(), kind: EntityKind::Channel });
        client.seed_entity("entity:2", ResolvedEntity { entity_id: 2, access_hash: 2, title: "Dest".into(), kind: EntityKind::Channel });
        client.seed_backlog(1, vec![remote(1, "a"), remote(2, "b")]);

        let j = job(1, vec![1], 2, ForwardFlags { enable_deduplication: true, ..Default::default() });
        let delivered = pipeline.run_job(&j, &account()).await.unwrap();
        assert_eq!(delivered, 2);
    }

    #[tokio::test]
    async fn duplicate_text_is_skipped_on_second_run() {
        let (pipeline, client) = pipeline_with_store().await;
        client.seed_entity("entity:1", ResolvedEntity { entity_id: 1, access_hash: 1, title: "Source".into(), kind: EntityKind::Channel });
        client.seed_entity("entity:2", ResolvedEntity { entity_id: 2, access_hash: 2, title: "Dest".into(), kind: EntityKind::Channel });
        client.seed_backlog(1, vec![remote(1, "same text")]);

        let flags = ForwardFlags { enable_deduplication: true, ..Default::default() };
        let first = job(1, vec![1], 2, flags.clone());
        assert_eq!(pipeline.run_job(&first, &account()).await.unwrap(), 1);

        client.seed_backlog(1, vec![remote(1, "same text")]);
        let second = job(2, vec![1], 2, flags);
        assert_eq!(pipeline.run_job(&second, &account()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn copy_into_destination_sends_text_only() {
        let (pipeline, client) = pipeline_with_store().await;
        client.seed_entity("entity:1", ResolvedEntity { entity_id: 1, access_hash: 1, title: "Source".into(), kind: EntityKind::Channel });
        client.seed_entity("entity:2", ResolvedEntity { entity_id: 2, access_hash: 2, title: "Dest".into(), kind: EntityKind::Channel });
        client.seed_backlog(1, vec![remote(1, "copy me")]);

        let flags = ForwardFlags { enable_deduplication: false, copy_into_destination: true, prepend_origin_info: true, ..Default::default() };
        let j = job(1, vec![1], 2, flags);
        let delivered = pipeline.run_job(&j, &account()).await.unwrap();
        assert_eq!(delivered, 1);
    }
}
