// [libs/core/persistence/src/repositories/jobs.rs]
//! Job queue repositories: one table per job kind (archive/forward/
//! discovery), same claim/requeue/terminate shape for each. Grounded
//! on the source's job repository atomic-claim pattern — `UPDATE ...
//! WHERE status = 'queued'` guarded by `earliest_run_at`, rather than a
//! `SELECT` followed by a racy `UPDATE`.
//!
//! Cross-queue priority (archival > forwarding > discovery) is the
//! Scheduler's concern: it polls these three repositories in that
//! order. Within one queue, pinned jobs are claimed first.

use crate::errors::PersistenceError;
use crate::store::Store;
use chrono::{DateTime, Utc};
use libsql::{params, Row};
use spectra_domain_models::{
    ArchiveJob, ArchiveOptions, DiscoveryJob, DiscoveryOptions, ForwardFlags, ForwardJob, ForwardMode, JobStatus,
};
use tracing::instrument;

fn status_str(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Queued => "queued",
        JobStatus::Running => "running",
        JobStatus::Succeeded => "succeeded",
        JobStatus::Failed => "failed",
        JobStatus::Cancelled => "cancelled",
    }
}

fn parse_status(raw: &str) -> JobStatus {
    match raw {
        "running" => JobStatus::Running,
        "succeeded" => JobStatus::Succeeded,
        "failed" => JobStatus::Failed,
        "cancelled" => JobStatus::Cancelled,
        _ => JobStatus::Queued,
    }
}

macro_rules! claim_query {
    ($table:literal) => {
        concat!(
            "UPDATE ",
            $table,
            " SET status = 'running' WHERE id = (
                SELECT id FROM ",
            $table,
            "
                WHERE status = 'queued' AND (earliest_run_at IS NULL OR earliest_run_at <= ?1)
                ORDER BY (pinned_account_id IS NOT NULL) DESC, id ASC
                LIMIT 1
            )
            RETURNING id"
        )
    };
}

#[derive(Clone)]
pub struct ArchiveJobRepository {
    store: Store,
}

impl ArchiveJobRepository {
    pub fn new(store: Store) -> Self {
        ArchiveJobRepository { store }
    }

    #[instrument(skip(self, target_entity_id, options))]
    pub async fn enqueue(&self, target_entity_id: i64, options: &ArchiveOptions, pinned_account_id: Option<i64>) -> Result<i64, PersistenceError> {
        let connection = self.store.connection()?;
        let options_json = serde_json::to_string(options).map_err(|e| PersistenceError::Mapping(e.to_string()))?;
        connection
            .execute(
                "INSERT INTO archive_jobs (target_entity_id, options_json, pinned_account_id) VALUES (?1, ?2, ?3)",
                params![target_entity_id, options_json, pinned_account_id],
            )
            .await?;
        last_insert_id(&connection).await
    }

    /// Atomically claims the next eligible job, or `None` if the queue
    /// is empty or every job is scheduled for the future.
    pub async fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<ArchiveJob>, PersistenceError> {
        let connection = self.store.connection()?;
        let mut rows = connection.query(claim_query!("archive_jobs"), params![now.to_rfc3339()]).await?;
        let Some(claimed) = rows.next().await? else { return Ok(None) };
        let id: i64 = claimed.get(0).map_err(|e| PersistenceError::Mapping(e.to_string()))?;
        self.get(id).await
    }

    pub async fn get(&self, id: i64) -> Result<Option<ArchiveJob>, PersistenceError> {
        let connection = self.store.connection()?;
        let mut rows = connection
            .query(
                "SELECT id, target_entity_id, options_json, status, attempts, cause, pinned_account_id FROM archive_jobs WHERE id = ?1",
                params![id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(map_row(row)?)),
            None => Ok(None),
        }
    }

    pub async fn complete(&self, id: i64) -> Result<(), PersistenceError> {
        set_status(&self.store, "archive_jobs", id, JobStatus::Succeeded, None, None).await
    }

    /// On `RetryAfter` or a retryable failure: re-queues with
    /// `earliest_run_at` and bumps attempts; once `attempts` reaches
    /// `attempt_cap` the job terminates `failed` instead.
    pub async fn retry_or_fail(&self, id: i64, cause: &str, earliest_run_at: DateTime<Utc>, attempt_cap: u32) -> Result<(), PersistenceError> {
        let connection = self.store.connection()?;
        connection
            .execute(
                r#"
                UPDATE archive_jobs
                SET attempts = attempts + 1,
                    cause = ?1,
                    earliest_run_at = ?2,
                    status = CASE WHEN attempts + 1 >= ?3 THEN 'failed' ELSE 'queued' END
                WHERE id = ?4
                "#,
                params![cause, earliest_run_at.to_rfc3339(), attempt_cap, id],
            )
            .await?;
        Ok(())
    }

    pub async fn cancel(&self, id: i64) -> Result<(), PersistenceError> {
        set_status(&self.store, "archive_jobs", id, JobStatus::Cancelled, None, None).await
    }

    /// Jobs still in flight (`queued` or `running`), oldest first.
    /// Backs the `schedule.list` operator verb.
    pub async fn list_pending(&self) -> Result<Vec<ArchiveJob>, PersistenceError> {
        let connection = self.store.connection()?;
        let mut rows = connection
            .query(
                "SELECT id, target_entity_id, options_json, status, attempts, cause, pinned_account_id FROM archive_jobs WHERE status IN ('queued', 'running') ORDER BY id ASC",
                (),
            )
            .await?;
        let mut jobs = Vec::new();
        while let Some(row) = rows.next().await? {
            jobs.push(map_row(row)?);
        }
        Ok(jobs)
    }
}

#[derive(Clone)]
pub struct ForwardJobRepository {
    store: Store,
}

impl ForwardJobRepository {
    pub fn new(store: Store) -> Self {
        ForwardJobRepository { store }
    }

    #[instrument(skip(self, source_entity_ids, flags))]
    pub async fn enqueue(
        &self,
        source_entity_ids: &[i64],
        destination_entity_id: i64,
        mode: ForwardMode,
        flags: &ForwardFlags,
        pinned_account_id: Option<i64>,
    ) -> Result<i64, PersistenceError> {
        let connection = self.store.connection()?;
        let sources_json = serde_json::to_string(source_entity_ids).map_err(|e| PersistenceError::Mapping(e.to_string()))?;
        let flags_json = serde_json::to_string(flags).map_err(|e| PersistenceError::Mapping(e.to_string()))?;
        connection
            .execute(
                r#"INSERT INTO forward_jobs (source_entity_ids_json, destination_entity_id, mode, flags_json, pinned_account_id)
                   VALUES (?1, ?2, ?3, ?4, ?5)"#,
                params![sources_json, destination_entity_id, mode_str(mode), flags_json, pinned_account_id],
            )
            .await?;
        last_insert_id(&connection).await
    }

    pub async fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<ForwardJob>, PersistenceError> {
        let connection = self.store.connection()?;
        let mut rows = connection.query(claim_query!("forward_jobs"), params![now.to_rfc3339()]).await?;
        let Some(claimed) = rows.next().await? else { return Ok(None) };
        let id: i64 = claimed.get(0).map_err(|e| PersistenceError::Mapping(e.to_string()))?;
        self.get(id).await
    }

    pub async fn get(&self, id: i64) -> Result<Option<ForwardJob>, PersistenceError> {
        let connection = self.store.connection()?;
        let mut rows = connection
            .query(
                "SELECT id, source_entity_ids_json, destination_entity_id, mode, flags_json, progress_cursor, status, attempts, cause, pinned_account_id FROM forward_jobs WHERE id = ?1",
                params![id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(map_forward_row(row)?)),
            None => Ok(None),
        }
    }

    /// Advances the resumption cursor. Callers must commit this in the
    /// same transaction as the destination's fingerprint insert to
    /// preserve the at-most-once delivery bound.
    pub async fn advance_cursor(&self, id: i64, progress_cursor: i64) -> Result<(), PersistenceError> {
        let connection = self.store.connection()?;
        connection.execute("UPDATE forward_jobs SET progress_cursor = ?1 WHERE id = ?2", params![progress_cursor, id]).await?;
        Ok(())
    }

    pub async fn complete(&self, id: i64) -> Result<(), PersistenceError> {
        set_status(&self.store, "forward_jobs", id, JobStatus::Succeeded, None, None).await
    }

    pub async fn retry_or_fail(&self, id: i64, cause: &str, earliest_run_at: DateTime<Utc>, attempt_cap: u32) -> Result<(), PersistenceError> {
        let connection = self.store.connection()?;
        connection
            .execute(
                r#"
                UPDATE forward_jobs
                SET attempts = attempts + 1,
                    cause = ?1,
                    earliest_run_at = ?2,
                    status = CASE WHEN attempts + 1 >= ?3 THEN 'failed' ELSE 'queued' END
                WHERE id = ?4
                "#,
                params![cause, earliest_run_at.to_rfc3339(), attempt_cap, id],
            )
            .await?;
        Ok(())
    }

    pub async fn cancel(&self, id: i64) -> Result<(), PersistenceError> {
        set_status(&self.store, "forward_jobs", id, JobStatus::Cancelled, None, None).await
    }

    pub async fn list_pending(&self) -> Result<Vec<ForwardJob>, PersistenceError> {
        let connection = self.store.connection()?;
        let mut rows = connection
            .query(
                "SELECT id, source_entity_ids_json, destination_entity_id, mode, flags_json, progress_cursor, status, attempts, cause, pinned_account_id FROM forward_jobs WHERE status IN ('queued', 'running') ORDER BY id ASC",
                (),
            )
            .await?;
        let mut jobs = Vec::new();
        while let Some(row) = rows.next().await? {
            jobs.push(map_forward_row(row)?);
        }
        Ok(jobs)
    }
}

#[derive(Clone)]
pub struct DiscoveryJobRepository {
    store: Store,
}

impl DiscoveryJobRepository {
    pub fn new(store: Store) -> Self {
        DiscoveryJobRepository { store }
    }

    #[instrument(skip(self, seeds, options))]
    pub async fn enqueue(&self, seeds: &[i64], options: &DiscoveryOptions, pinned_account_id: Option<i64>) -> Result<i64, PersistenceError> {
        let connection = self.store.connection()?;
        let seeds_json = serde_json::to_string(seeds).map_err(|e| PersistenceError::Mapping(e.to_string()))?;
        let options_json = serde_json::to_string(options).map_err(|e| PersistenceError::Mapping(e.to_string()))?;
        connection
            .execute(
                "INSERT INTO discovery_jobs (seeds_json, options_json, pinned_account_id) VALUES (?1, ?2, ?3)",
                params![seeds_json, options_json, pinned_account_id],
            )
            .await?;
        last_insert_id(&connection).await
    }

    pub async fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<DiscoveryJob>, PersistenceError> {
        let connection = self.store.connection()?;
        let mut rows = connection.query(claim_query!("discovery_jobs"), params![now.to_rfc3339()]).await?;
        let Some(claimed) = rows.next().await? else { return Ok(None) };
        let id: i64 = claimed.get(0).map_err(|e| PersistenceError::Mapping(e.to_string()))?;
        self.get(id).await
    }

    pub async fn get(&self, id: i64) -> Result<Option<DiscoveryJob>, PersistenceError> {
        let connection = self.store.connection()?;
        let mut rows = connection
            .query(
                "SELECT id, seeds_json, options_json, status, attempts, cause, pinned_account_id FROM discovery_jobs WHERE id = ?1",
                params![id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(map_discovery_row(row)?)),
            None => Ok(None),
        }
    }

    pub async fn complete(&self, id: i64) -> Result<(), PersistenceError> {
        set_status(&self.store, "discovery_jobs", id, JobStatus::Succeeded, None, None).await
    }

    pub async fn retry_or_fail(&self, id: i64, cause: &str, earliest_run_at: DateTime<Utc>, attempt_cap: u32) -> Result<(), PersistenceError> {
        let connection = self.store.connection()?;
        connection
            .execute(
                r#"
                UPDATE discovery_jobs
                SET attempts = attempts + 1,
                    cause = ?1,
                    earliest_run_at = ?2,
                    status = CASE WHEN attempts + 1 >= ?3 THEN 'failed' ELSE 'queued' END
                WHERE id = ?4
                "#,
                params![cause, earliest_run_at.to_rfc3339(), attempt_cap, id],
            )
            .await?;
        Ok(())
    }

    pub async fn cancel(&self, id: i64) -> Result<(), PersistenceError> {
        set_status(&self.store, "discovery_jobs", id, JobStatus::Cancelled, None, None).await
    }

    pub async fn list_pending(&self) -> Result<Vec<DiscoveryJob>, PersistenceError> {
        let connection = self.store.connection()?;
        let mut rows = connection
            .query(
                "SELECT id, seeds_json, options_json, status, attempts, cause, pinned_account_id FROM discovery_jobs WHERE status IN ('queued', 'running') ORDER BY id ASC",
                (),
            )
            .await?;
        let mut jobs = Vec::new();
        while let Some(row) = rows.next().await? {
            jobs.push(map_discovery_row(row)?);
        }
        Ok(jobs)
    }
}

async fn last_insert_id(connection: &libsql::Connection) -> Result<i64, PersistenceError> {
    let mut rows = connection.query("SELECT last_insert_rowid()", ()).await?;
    let row = rows.next().await?.ok_or(PersistenceError::NotFound)?;
    row.get(0).map_err(|e| PersistenceError::Mapping(e.to_string()))
}

async fn set_status(store: &Store, table: &str, id: i64, status: JobStatus, cause: Option<&str>, earliest_run_at: Option<DateTime<Utc>>) -> Result<(), PersistenceError> {
    let connection = store.connection()?;
    let sql = format!("UPDATE {table} SET status = ?1, cause = ?2, earliest_run_at = ?3 WHERE id = ?4");
    connection
        .execute(&sql, params![status_str(status), cause, earliest_run_at.map(|t| t.to_rfc3339()), id])
        .await?;
    Ok(())
}

fn mode_str(mode: ForwardMode) -> &'static str {
    match mode {
        ForwardMode::Selective => "selective",
        ForwardMode::Total => "total",
        ForwardMode::DiscoverAndForward => "discover_and_forward",
    }
}

fn parse_mode(raw: &str) -> ForwardMode {
    match raw {
        "total" => ForwardMode::Total,
        "discover_and_forward" => ForwardMode::DiscoverAndForward,
        _ => ForwardMode::Selective,
    }
}

fn map_row(row: Row) -> Result<ArchiveJob, PersistenceError> {
    let options_json: String = row.get(2).map_err(|e| PersistenceError::Mapping(e.to_string()))?;
    let status_raw: String = row.get(3).map_err(|e| PersistenceError::Mapping(e.to_string()))?;
    Ok(ArchiveJob {
        id: row.get(0).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        target_entity_id: row.get(1).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        options: serde_json::from_str(&options_json).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        status: parse_status(&status_raw),
        attempts: row.get::<i64>(4).map_err(|e| PersistenceError::Mapping(e.to_string()))? as u32,
        cause: row.get(5).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        pinned_account_id: row.get(6).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
    })
}

fn map_forward_row(row: Row) -> Result<ForwardJob, PersistenceError> {
    let sources_json: String = row.get(1).map_err(|e| PersistenceError::Mapping(e.to_string()))?;
    let mode_raw: String = row.get(3).map_err(|e| PersistenceError::Mapping(e.to_string()))?;
    let flags_json: String = row.get(4).map_err(|e| PersistenceError::Mapping(e.to_string()))?;
    let status_raw: String = row.get(6).map_err(|e| PersistenceError::Mapping(e.to_string()))?;
    Ok(ForwardJob {
        id: row.get(0).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        source_entity_ids: serde_json::from_str(&sources_json).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        destination_entity_id: row.get(2).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        mode: parse_mode(&mode_raw),
        flags: serde_json::from_str(&flags_json).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        progress_cursor: row.get(5).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        status: parse_status(&status_raw),
        attempts: row.get::<i64>(7).map_err(|e| PersistenceError::Mapping(e.to_string()))? as u32,
        cause: row.get(8).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        pinned_account_id: row.get(9).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
    })
}

fn map_discovery_row(row: Row) -> Result<DiscoveryJob, PersistenceError> {
    let seeds_json: String = row.get(1).map_err(|e| PersistenceError::Mapping(e.to_string()))?;
    let options_json: String = row.get(2).map_err(|e| PersistenceError::Mapping(e.to_string()))?;
    let status_raw: String = row.get(3).map_err(|e| PersistenceError::Mapping(e.to_string()))?;
    Ok(DiscoveryJob {
        id: row.get(0).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        seeds: serde_json::from_str(&seeds_json).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        options: serde_json::from_str(&options_json).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        status: parse_status(&status_raw),
        attempts: row.get::<i64>(4).map_err(|e| PersistenceError::Mapping(e.to_string()))? as u32,
        cause: row.get(5).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        pinned_account_id: row.get(6).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
    })
}
