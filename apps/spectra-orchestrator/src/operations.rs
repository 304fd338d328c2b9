// [apps/spectra-orchestrator/src/operations.rs]
//! The operator surface: `archive`, `discover`, `forward`,
//! `accounts.{import,list,test,reset}`, `channels.update-access`,
//! `schedule.{add,list,remove}`. Each verb is a thin function over a
//! `Bootstrap` handle — enqueueing work for the scheduler's worker pool
//! to pick up, or reading/mutating state directly where no job is
//! involved.

use crate::errors::CoreError;
use crate::Bootstrap;
use chrono::Utc;
use spectra_domain_models::{Account, ArchiveJob, ArchiveOptions, DiscoveryJob, DiscoveryOptions, ForwardFlags, ForwardJob, ForwardMode};

pub async fn archive(bootstrap: &Bootstrap, entity_id: i64, options: ArchiveOptions, pinned_account_id: Option<i64>) -> Result<i64, CoreError> {
    let id = bootstrap.repositories.archive_jobs.enqueue(entity_id, &options, pinned_account_id).await?;
    Ok(id)
}

pub async fn discover(bootstrap: &Bootstrap, seeds: &[i64], options: DiscoveryOptions, pinned_account_id: Option<i64>) -> Result<i64, CoreError> {
    let id = bootstrap.repositories.discovery_jobs.enqueue(seeds, &options, pinned_account_id).await?;
    Ok(id)
}

pub async fn forward(
    bootstrap: &Bootstrap,
    source_entity_ids: &[i64],
    destination_entity_id: i64,
    mode: ForwardMode,
    flags: ForwardFlags,
    pinned_account_id: Option<i64>,
) -> Result<i64, CoreError> {
    let id = bootstrap
        .repositories
        .forward_jobs
        .enqueue(source_entity_ids, destination_entity_id, mode, &flags, pinned_account_id)
        .await?;
    Ok(id)
}

/// `accounts.*` — managed through the Registry, not the job queues:
/// accounts are configuration, not work items.
pub mod accounts {
    use super::*;
    use spectra_domain_models::AccountImport;

    pub async fn import(bootstrap: &Bootstrap, import: AccountImport) -> Result<Account, CoreError> {
        Ok(bootstrap.registry.import(import).await?)
    }

    pub async fn list(bootstrap: &Bootstrap) -> Result<Vec<Account>, CoreError> {
        Ok(bootstrap.registry.list().await?)
    }

    /// No live network probe: the wire client is an opaque dependency
    /// with no generic "ping" operation, so `test` reports the durable
    /// health state a real lease attempt would consult rather than
    /// round-tripping to Telegram.
    pub async fn test(bootstrap: &Bootstrap, account_id: i64) -> Result<bool, CoreError> {
        let account = bootstrap
            .repositories
            .accounts
            .get_by_id(account_id)
            .await?
            .ok_or_else(|| CoreError::Configuration(format!("unknown account id {account_id}")))?;
        Ok(account.is_leaseable(Utc::now()))
    }

    pub async fn reset(bootstrap: &Bootstrap, account_id: i64) -> Result<(), CoreError> {
        bootstrap.repositories.accounts.reset(account_id).await?;
        Ok(())
    }
}

/// `channels.update-access` — forces the next resolve to look up a
/// fresh access hash instead of trusting a cached one: access hashes
/// go stale when a channel's ownership or visibility changes.
pub mod channels {
    use super::*;

    pub async fn update_access(bootstrap: &Bootstrap, account_id: i64, entity_id: i64) -> Result<(), CoreError> {
        bootstrap.repositories.entities.clear_access_hash(account_id, entity_id).await?;
        Ok(())
    }
}

/// `schedule.*` — a thin view over the three job queues. `add` is a
/// dispatch table over job kind; `list`/`remove` need to know which
/// queue a job id lives in, so callers pass the kind explicitly rather
/// than this module guessing by probing all three tables.
pub mod schedule {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum JobKind {
        Archive,
        Forward,
        Discovery,
    }

    pub enum ScheduleRequest {
        Archive { entity_id: i64, options: ArchiveOptions, pinned_account_id: Option<i64> },
        Forward { source_entity_ids: Vec<i64>, destination_entity_id: i64, mode: ForwardMode, flags: ForwardFlags, pinned_account_id: Option<i64> },
        Discovery { seeds: Vec<i64>, options: DiscoveryOptions, pinned_account_id: Option<i64> },
    }

    pub async fn add(bootstrap: &Bootstrap, request: ScheduleRequest) -> Result<i64, CoreError> {
        match request {
            ScheduleRequest::Archive { entity_id, options, pinned_account_id } => super::archive(bootstrap, entity_id, options, pinned_account_id).await,
            ScheduleRequest::Forward { source_entity_ids, destination_entity_id, mode, flags, pinned_account_id } => {
                super::forward(bootstrap, &source_entity_ids, destination_entity_id, mode, flags, pinned_account_id).await
            }
            ScheduleRequest::Discovery { seeds, options, pinned_account_id } => super::discover(bootstrap, &seeds, options, pinned_account_id).await,
        }
    }

    pub struct PendingJobs {
        pub archive: Vec<ArchiveJob>,
        pub forward: Vec<ForwardJob>,
        pub discovery: Vec<DiscoveryJob>,
    }

    pub async fn list(bootstrap: &Bootstrap) -> Result<PendingJobs, CoreError> {
        let archive = bootstrap.repositories.archive_jobs.list_pending().await?;
        let forward = bootstrap.repositories.forward_jobs.list_pending().await?;
        let discovery = bootstrap.repositories.discovery_jobs.list_pending().await?;
        Ok(PendingJobs { archive, forward, discovery })
    }

    pub async fn remove(bootstrap: &Bootstrap, kind: JobKind, id: i64) -> Result<(), CoreError> {
        match kind {
            JobKind::Archive => bootstrap.repositories.archive_jobs.cancel(id).await?,
            JobKind::Forward => bootstrap.repositories.forward_jobs.cancel(id).await?,
            JobKind::Discovery => bootstrap.repositories.discovery_jobs.cancel(id).await?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::{development_client, Bootstrap};
    use spectra_domain_models::{load_config, AccountImport};

    async fn test_bootstrap() -> Bootstrap {
        let raw = serde_json::json!({
            "db": { "path": ":memory:" },
            "accounts": [],
        })
        .to_string();
        let (config, _warnings) = load_config(&raw).expect("minimal config parses");
        Bootstrap::init(config, development_client()).await.expect("bootstrap initializes")
    }

    #[tokio::test]
    async fn archive_enqueues_a_job() {
        let bootstrap = test_bootstrap().await;
        let id = archive(&bootstrap, 42, ArchiveOptions::default(), None).await.expect("enqueue succeeds");
        let pending = schedule::list(&bootstrap).await.expect("list succeeds");
        assert!(pending.archive.iter().any(|job| job.id == id));
    }

    #[tokio::test]
    async fn schedule_remove_cancels_the_job() {
        let bootstrap = test_bootstrap().await;
        let id = discover(&bootstrap, &[1], DiscoveryOptions::default(), None).await.expect("enqueue succeeds");
        schedule::remove(&bootstrap, schedule::JobKind::Discovery, id).await.expect("cancel succeeds");
        let pending = schedule::list(&bootstrap).await.expect("list succeeds");
        assert!(!pending.discovery.iter().any(|job| job.id == id));
    }

    #[tokio::test]
    async fn accounts_test_reports_leaseable_state() {
        let bootstrap = test_bootstrap().await;
        let account = bootstrap
            .registry
            .import(AccountImport {
                session_name: "acct-1".into(),
                api_id: 1,
                api_hash: "hash".into(),
                phone_number: "+10000000000".into(),
                password: None,
                session_bytes_base64: None,
            })
            .await
            .expect("import succeeds");
        assert!(accounts::test(&bootstrap, account.id).await.expect("test succeeds"));
    }

    #[tokio::test]
    async fn channels_update_access_clears_the_cached_hash() {
        let bootstrap = test_bootstrap().await;
        channels::update_access(&bootstrap, 1, 99).await.expect("clear succeeds");
        assert_eq!(bootstrap.repositories.entities.get_access_hash(1, 99).await.expect("lookup succeeds"), None);
    }
}
