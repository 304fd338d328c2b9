// [libs/domain/archival/src/pipeline.rs]
//! The Archival Pipeline: resolves an entity, iterates its history in
//! checkpointed batches, downloads media within policy, and commits
//! everything idempotently so an interrupted run resumes exactly
//! where it left off.
//!
//! Grounded on the Scheduler's `Runner<Q>` seam (this crate never
//! leases or releases accounts itself — the worker pool owns that) and
//! on `spectra_media_fetch::download_media` for the streaming/hashing
//! half of the fetch step.

use crate::errors::ArchivalError;
use crate::summary::{build_summary, ArchiveSummary};
use async_trait::async_trait;
use chrono::Utc;
use spectra_credentials::AccountHandle;
use spectra_domain_models::{
    media_relative_path, AccessRecord, ArchiveJob, ArchiveOptions, Checkpoint, Entity, EntityAccessHash, Message,
};
use spectra_governor::OpClass;
use spectra_media_fetch::{download_media, write_sidecar};
use spectra_persistence::{ArchiveJobRepository, KeyedLockTable, Repositories};
use spectra_scheduler::{JobQueue, Runner, StepOutcome};
use spectra_telegram_client::{ClientError, HistoryPage, RemoteMessage, ResolvedEntity, TelegramClient};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

pub const OP_CLASS: OpClass = OpClass::Metadata;

pub struct ArchivalPipeline {
    repositories: Repositories,
    checkpoint_locks: KeyedLockTable,
    client: Arc<dyn TelegramClient>,
    media_root: PathBuf,
}

impl ArchivalPipeline {
    pub fn new(repositories: Repositories, checkpoint_locks: KeyedLockTable, client: Arc<dyn TelegramClient>, media_root: PathBuf) -> Self {
        ArchivalPipeline { repositories, checkpoint_locks, client, media_root }
    }

    #[instrument(skip(self, job, account), fields(entity_id = job.target_entity_id, job_id = job.id))]
    async fn run_job(&self, job: &ArchiveJob, account: &AccountHandle) -> Result<ArchiveSummary, ArchivalError> {
        let entity_id = job.target_entity_id;
        let _guard = self.checkpoint_locks.lock(entity_id).await;

        let resolved = self.resolve_for_account(account, entity_id).await?;

        self.process_context(account, &resolved, Checkpoint::archive_context(), None, &job.options).await?;

        if job.options.archive_topics {
            let topics = self.client.list_topics(account, &resolved).await?;
            for topic_id in topics {
                self.process_context(account, &resolved, Checkpoint::topic_context(topic_id), Some(topic_id), &job.options).await?;
            }
        }

        let summary = build_summary(&self.repositories.messages, entity_id).await?;
        info!(
            entity_id,
            message_count = summary.message_count,
            total_media_bytes = summary.total_media_bytes,
            checksum_digest = %summary.checksum_digest,
            "archive run complete"
        );
        Ok(summary)
    }

    /// Resolves `entity_id` for `account`, reusing a cached access hash
    /// when one exists rather than round-tripping to the client. If the
    /// entity lacks a stored access hash for this account, performs a
    /// lookup and writes an `AccessRecord`.
    async fn resolve_for_account(&self, account: &AccountHandle, entity_id: i64) -> Result<ResolvedEntity, ArchivalError> {
        if let Some(access_hash) = self.repositories.entities.get_access_hash(account.account_id, entity_id).await? {
            if let Some(entity) = self.repositories.entities.get_by_id(entity_id).await? {
                return Ok(ResolvedEntity { entity_id, access_hash, title: entity.title, kind: entity.kind });
            }
        }

        let resolved = self.client.resolve_entity(account, &entity_reference(entity_id)).await?;
        let now = Utc::now();

        self.repositories
            .entities
            .upsert_access_hash(&EntityAccessHash { account_id: account.account_id, entity_id: resolved.entity_id, access_hash: resolved.access_hash, learned_at: now })
            .await?;
        self.repositories
            .access_records
            .record(&AccessRecord { account_id: account.account_id, entity_id: resolved.entity_id, access_hash: resolved.access_hash, last_seen_at: now })
            .await?;
        self.repositories
            .entities
            .upsert(&Entity { id: resolved.entity_id, title: resolved.title.clone(), kind: resolved.kind, first_seen_at: now, last_seen_at: now, discovery_depth: 0, priority_score: 0.0 })
            .await?;

        Ok(resolved)
    }

    /// Iterates one checkpoint context to exhaustion in fixed-size
    /// batches, each batch its own commit point.
    async fn process_context(&self, account: &AccountHandle, entity: &ResolvedEntity, context: String, topic_id: Option<i64>, options: &ArchiveOptions) -> Result<(), ArchivalError> {
        loop {
            let checkpoint = self.repositories.checkpoints.get(entity.entity_id, &context).await?;
            let after = checkpoint.as_ref().map(|c| c.last_fetched_message_id);

            let page = HistoryPage { after_message_id: after, limit: options.batch_size, topic_id };
            let remote_messages = self.client.history_page(account, entity, page).await?;
            if remote_messages.is_empty() {
                break;
            }

            let mut max_id = after.unwrap_or(0);
            for remote in &remote_messages {
                self.archive_one_message(account, entity, remote, options).await?;
                max_id = max_id.max(remote.message_id);
            }

            self.repositories.checkpoints.advance(entity.entity_id, &context, max_id, Utc::now()).await?;

            if (remote_messages.len() as u32) < options.batch_size {
                break;
            }
            if options.sleep_ms > 0 {
                tokio::time::sleep(Duration::from_millis(options.sleep_ms)).await;
            }
        }
        Ok(())
    }

    async fn archive_one_message(&self, account: &AccountHandle, entity: &ResolvedEntity, remote: &RemoteMessage, options: &ArchiveOptions) -> Result<(), ArchivalError> {
        let media_ref = if options.download_media {
            self.maybe_download(account, entity, remote, options).await?
        } else {
            None
        };

        let checksum = spectra_domain_models::canonical_message_checksum(
            entity.entity_id,
            remote.message_id,
            remote.sender_id,
            remote.text.as_deref(),
            media_ref.as_ref().map(|m| m.sha256.as_str()),
        );

        let message = Message {
            entity_id: entity.entity_id,
            message_id: remote.message_id,
            sender_id: remote.sender_id,
            kind: remote.kind,
            date: remote.date,
            edit_date: remote.edit_date,
            text: remote.text.clone(),
            reply_to: remote.reply_to,
            media_id: media_ref.map(|m| m.id),
            checksum_sha256: checksum,
        };
        self.repositories.messages.upsert(&message).await?;
        Ok(())
    }

    async fn maybe_download(&self, account: &AccountHandle, entity: &ResolvedEntity, remote: &RemoteMessage, options: &ArchiveOptions) -> Result<Option<DownloadedMediaRef>, ArchivalError> {
        let Some(descriptor) = &remote.media else { return Ok(None) };
        let max_bytes = options.max_file_size_mb.saturating_mul(1024 * 1024);
        if descriptor.size_bytes > max_bytes {
            warn!(message_id = remote.message_id, size_bytes = descriptor.size_bytes, max_bytes, "media exceeds configured cap, skipping download");
            return Ok(None);
        }
        if !media_type_allowed(&options.media_types, &descriptor.mime_type) {
            return Ok(None);
        }

        let extension = extension_for_mime(&descriptor.mime_type);
        let relative_path = media_relative_path(entity.entity_id, remote.date, remote.message_id, extension);

        let downloaded = download_media(self.client.as_ref(), account, &descriptor.file_reference, max_bytes, &self.media_root, &relative_path, &descriptor.mime_type).await?;

        let media_object = spectra_domain_models::MediaObject {
            id: 0,
            mime_type: descriptor.mime_type.clone(),
            size_bytes: downloaded.size_bytes,
            file_path: downloaded.relative_path.clone(),
            original_filename: descriptor.original_filename.clone(),
            sha256: downloaded.sha256.clone(),
            phash: downloaded.phash,
            fuzzy_hash: downloaded.fuzzy_hash.clone(),
        };
        let media_id = self.repositories.media.insert(&media_object).await?;
        write_sidecar(&self.media_root, &relative_path, &downloaded, media_id, &descriptor.mime_type, entity.entity_id, remote.message_id).await?;

        Ok(Some(DownloadedMediaRef { id: media_id, sha256: downloaded.sha256 }))
    }
}

struct DownloadedMediaRef {
    id: i64,
    sha256: String,
}

/// Synthetic lookup key for an entity this account has never resolved
/// before. A concrete wire client resolves this string however its
/// provider requires; the opaque `TelegramClient` seam makes no claim
/// about the reference format beyond "something the client can turn
/// into a `ResolvedEntity`".
fn entity_reference(entity_id: i64) -> String {
    format!("entity:{entity_id}")
}

fn media_type_allowed(configured: &[String], mime_type: &str) -> bool {
    configured.is_empty() || configured.iter().any(|prefix| mime_type.starts_with(prefix.as_str()))
}

fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "video/mp4" => "mp4",
        "audio/mpeg" => "mp3",
        "audio/ogg" => "ogg",
        "application/pdf" => "pdf",
        _ => "bin",
    }
}

#[async_trait]
impl Runner<ArchiveJobRepository> for ArchivalPipeline {
    async fn run(&self, job: ArchiveJob, account: AccountHandle) -> StepOutcome {
        match self.run_job(&job, &account).await {
            Ok(_summary) => StepOutcome::Completed,
            Err(error) => classify(error),
        }
    }
}

fn classify(error: ArchivalError) -> StepOutcome {
    match error {
        ArchivalError::Client(ClientError::FloodWait(delay)) => StepOutcome::Retry { cause: "flood wait".to_string(), after: delay },
        ArchivalError::Client(ClientError::Auth) => StepOutcome::AuthFailure { cause: "authentication failed or was revoked".to_string() },
        ArchivalError::Client(ClientError::Cancelled) => StepOutcome::Cancelled,
        other => StepOutcome::Retry { cause: other.to_string(), after: Duration::from_secs(30) },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectra_domain_models::{ArchiveOptions, EntityKind, JobStatus, MessageKind};
    use spectra_persistence::Store;
    use spectra_telegram_client::{RemoteMediaDescriptor, SimulatedTelegramClient};

    fn account() -> AccountHandle {
        AccountHandle { account_id: 1, session_name: "acct-1".into() }
    }

    async fn pipeline_with_store() -> (ArchivalPipeline, Store, Arc<SimulatedTelegramClient>, tempfile::TempDir) {
        let store = Store::connect(":memory:", None).await.unwrap();
        let repositories = Repositories::new(store.clone());
        let client = Arc::new(SimulatedTelegramClient::new());
        let media_dir = tempfile::tempdir().unwrap();
        let pipeline = ArchivalPipeline::new(repositories, store.checkpoint_locks.clone(), client.clone(), media_dir.path().to_path_buf());
        (pipeline, store, client, media_dir)
    }

    fn remote(id: i64, text: &str, media: Option<RemoteMediaDescriptor>) -> RemoteMessage {
        RemoteMessage { message_id: id, sender_id: Some(7), kind: MessageKind::Text, date: Utc::now(), edit_date: None, text: Some(text.to_string()), reply_to: None, media, caption_entities: Vec::new() }
    }

    fn job(id: i64, target_entity_id: i64, options: ArchiveOptions) -> ArchiveJob {
        ArchiveJob { id, target_entity_id, options, status: JobStatus::Running, attempts: 0, cause: None, pinned_account_id: None }
    }

    #[tokio::test]
    async fn archives_a_backlog_and_commits_idempotent_checkpoint() {
        let (pipeline, store, client, _dir) = pipeline_with_store().await;
        client.seed_entity("entity:42", ResolvedEntity { entity_id: 42, access_hash: 99, title: "Channel".into(), kind: EntityKind::Channel });
        client.seed_backlog(42, (1..=5).map(|id| remote(id, "hello", None)).collect());

        let options = ArchiveOptions { download_media: false, batch_size: 2, ..ArchiveOptions::default() };
        let mut j = job(1, 42, options);

        let summary = pipeline.run_job(&j, &account()).await.unwrap();
        assert_eq!(summary.message_count, 5);
        assert_eq!(summary.min_message_id, Some(1));
        assert_eq!(summary.max_message_id, Some(5));

        let checkpoint = store.connection().unwrap();
        drop(checkpoint);
        let repositories = Repositories::new(store.clone());
        let cp = repositories.checkpoints.get(42, &Checkpoint::archive_context()).await.unwrap().unwrap();
        assert_eq!(cp.last_fetched_message_id, 5);

        // re-running from the committed checkpoint archives nothing new.
        j.attempts += 1;
        let summary_again = pipeline.run_job(&j, &account()).await.unwrap();
        assert_eq!(summary_again.message_count, 5);
    }

    #[tokio::test]
    async fn downloads_media_within_the_size_cap() {
        let (pipeline, _store, client, dir) = pipeline_with_store().await;
        client.seed_entity("entity:7", ResolvedEntity { entity_id: 7, access_hash: 1, title: "C".into(), kind: EntityKind::Channel });
        let descriptor = RemoteMediaDescriptor { file_reference: "file-1".into(), mime_type: "image/jpeg".into(), size_bytes: 10, original_filename: Some("a.jpg".into()) };
        client.seed_backlog(7, vec![remote(1, "pic", Some(descriptor))]);

        let options = ArchiveOptions { download_media: true, batch_size: 10, max_file_size_mb: 1, ..ArchiveOptions::default() };
        let j = job(1, 7, options);

        let summary = pipeline.run_job(&j, &account()).await.unwrap();
        assert_eq!(summary.message_count, 1);
        assert!(summary.total_media_bytes > 0);
        assert!(dir.path().join("7").exists());
    }

    #[tokio::test]
    async fn flood_wait_classifies_as_retry() {
        let (pipeline, _store, client, _dir) = pipeline_with_store().await;
        client.seed_entity("entity:9", ResolvedEntity { entity_id: 9, access_hash: 1, title: "C".into(), kind: EntityKind::Channel });
        client.inject_flood_wait(Duration::from_secs(5));

        let options = ArchiveOptions { download_media: false, batch_size: 10, ..ArchiveOptions::default() };
        let j = job(1, 9, options);

        let outcome = Runner::run(&pipeline, j, account()).await;
        assert!(matches!(outcome, StepOutcome::Retry { .. }));
    }

    #[test]
    fn mime_filter_matches_configured_prefixes() {
        assert!(media_type_allowed(&[], "image/jpeg"));
        assert!(media_type_allowed(&["image/".to_string()], "image/png"));
        assert!(!media_type_allowed(&["video/".to_string()], "image/png"));
    }

}
