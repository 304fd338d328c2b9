// [libs/domain/scheduler/src/queue.rs]
//! `JobQueue`: the shape every one of the three job repositories
//! already shares (claim/complete/retry_or_fail/cancel), lifted into
//! a trait so the worker pool can drive archival, forward,
//! and discovery queues through one generic loop instead of three
//! copy-pasted ones.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use spectra_domain_models::{ArchiveJob, DiscoveryJob, ForwardJob};
use spectra_persistence::{ArchiveJobRepository, DiscoveryJobRepository, ForwardJobRepository, PersistenceError};

#[async_trait]
pub trait JobQueue: Send + Sync {
    type Job: Send + 'static;

    fn job_id(job: &Self::Job) -> i64;
    /// Per-job operator pin to a specific account, if any. `None`
    /// defers to the Scheduler's globally configured mode.
    fn pinned_account_id(job: &Self::Job) -> Option<i64>;

    async fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<Self::Job>, PersistenceError>;
    async fn complete(&self, id: i64) -> Result<(), PersistenceError>;
    async fn retry_or_fail(&self, id: i64, cause: &str, earliest_run_at: DateTime<Utc>, attempt_cap: u32) -> Result<(), PersistenceError>;
    async fn cancel(&self, id: i64) -> Result<(), PersistenceError>;
}

#[async_trait]
impl JobQueue for ArchiveJobRepository {
    type Job = ArchiveJob;

    fn job_id(job: &Self::Job) -> i64 {
        job.id
    }

    fn pinned_account_id(job: &Self::Job) -> Option<i64> {
        job.pinned_account_id
    }

    async fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<Self::Job>, PersistenceError> {
        ArchiveJobRepository::claim_next(self, now).await
    }

    async fn complete(&self, id: i64) -> Result<(), PersistenceError> {
        ArchiveJobRepository::complete(self, id).await
    }

    async fn retry_or_fail(&self, id: i64, cause: &str, earliest_run_at: DateTime<Utc>, attempt_cap: u32) -> Result<(), PersistenceError> {
        ArchiveJobRepository::retry_or_fail(self, id, cause, earliest_run_at, attempt_cap).await
    }

    async fn cancel(&self, id: i64) -> Result<(), PersistenceError> {
        ArchiveJobRepository::cancel(self, id).await
    }
}

#[async_trait]
impl JobQueue for ForwardJobRepository {
    type Job = ForwardJob;

    fn job_id(job: &Self::Job) -> i64 {
        job.id
    }

    fn pinned_account_id(job: &Self::Job) -> Option<i64> {
        job.pinned_account_id
    }

    async fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<Self::Job>, PersistenceError> {
        ForwardJobRepository::claim_next(self, now).await
    }

    async fn complete(&self, id: i64) -> Result<(), PersistenceError> {
        ForwardJobRepository::complete(self, id).await
    }

    async fn retry_or_fail(&self, id: i64, cause: &str, earliest_run_at: DateTime<Utc>, attempt_cap: u32) -> Result<(), PersistenceError> {
        ForwardJobRepository::retry_or_fail(self, id, cause, earliest_run_at, attempt_cap).await
    }

    async fn cancel(&self, id: i64) -> Result<(), PersistenceError> {
        ForwardJobRepository::cancel(self, id).await
    }
}

#[async_trait]
impl JobQueue for DiscoveryJobRepository {
    type Job = DiscoveryJob;

    fn job_id(job: &Self::Job) -> i64 {
        job.id
    }

    fn pinned_account_id(job: &Self::Job) -> Option<i64> {
        job.pinned_account_id
    }

    async fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<Self::Job>, PersistenceError> {
        DiscoveryJobRepository::claim_next(self, now).await
    }

    async fn complete(&self, id: i64) -> Result<(), PersistenceError> {
        DiscoveryJobRepository::complete(self, id).await
    }

    async fn retry_or_fail(&self, id: i64, cause: &str, earliest_run_at: DateTime<Utc>, attempt_cap: u32) -> Result<(), PersistenceError> {
        DiscoveryJobRepository::retry_or_fail(self, id, cause, earliest_run_at, attempt_cap).await
    }

    async fn cancel(&self, id: i64) -> Result<(), PersistenceError> {
        DiscoveryJobRepository::cancel(self, id).await
    }
}
