// [libs/core/persistence/src/store.rs]
//! Connection management for the SPECTRA persistence store: opens the
//! embedded libSQL database in WAL mode, applies the schema, holds the
//! file-level exclusion lock for the process lifetime, and offers a
//! commit-retry helper shared by every repository.
//!
//! Grounded on the source's `TursoClient`: a `Database` handle shared
//! behind an `Arc`, one short-lived `Connection` per call rather than a
//! pool, and an in-memory anchor connection to keep `:memory:` databases
//! alive across connects (used by the crate's own tests).

use crate::errors::PersistenceError;
use crate::exclusion_lock::ExclusionLock;
use crate::lock_table::KeyedLockTable;
use crate::schema;
use libsql::{Builder, Connection, Database};
use spectra_governor::jittered_backoff;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

const COMMIT_RETRY_BASE: Duration = Duration::from_millis(50);
const COMMIT_RETRY_CAP: Duration = Duration::from_secs(2);
const COMMIT_RETRY_VARIANCE: f64 = 0.3;
const COMMIT_RETRY_MAX_ATTEMPTS: u32 = 8;

#[derive(Clone)]
pub struct Store {
    database: Arc<Database>,
    _exclusion_lock: Option<Arc<ExclusionLock>>,
    _memory_anchor: Option<Arc<Connection>>,
    /// Serialises checkpoint writes per entity and fingerprint writes
    /// per destination, preserving write ordering.
    pub checkpoint_locks: KeyedLockTable,
    pub fingerprint_locks: KeyedLockTable,
}

impl Store {
    /// Opens `db_path` (or connects to a remote libSQL endpoint when
    /// `db_path` looks like a `libsql://`/`https://` URL), applies the
    /// schema, and takes the file-level exclusion lock. `:memory:`
    /// databases skip the exclusion lock — they exist only within this
    /// process and tests open many of them concurrently.
    #[instrument(skip(remote_auth_token))]
    pub async fn connect(db_path: &str, remote_auth_token: Option<String>) -> Result<Self, PersistenceError> {
        if db_path.is_empty() {
            return Err(PersistenceError::StorageUnavailable("db.path is empty".into()));
        }

        let is_remote = db_path.starts_with("libsql://") || db_path.starts_with("https://");
        let is_memory = db_path == ":memory:" || db_path.contains("mode=memory");

        let database = if is_remote {
            let token = remote_auth_token
                .ok_or_else(|| PersistenceError::StorageUnavailable("remote db url given without an auth token".into()))?;
            Builder::new_remote(db_path.to_string(), token)
                .build()
                .await
                .map_err(|e| PersistenceError::StorageUnavailable(format!("remote connect failed: {e}")))?
        } else {
            Builder::new_local(db_path)
                .build()
                .await
                .map_err(|e| PersistenceError::StorageUnavailable(format!("local open failed: {e}")))?
        };

        let database = Arc::new(database);

        let exclusion_lock = if is_memory || is_remote {
            None
        } else {
            Some(Arc::new(ExclusionLock::acquire(Path::new(db_path))?))
        };

        let mut memory_anchor = None;
        let bootstrap_connection = database.connect().map_err(PersistenceError::from)?;

        if !is_remote {
            bootstrap_connection.query("PRAGMA journal_mode = WAL;", ()).await.map_err(PersistenceError::from)?;
        }
        schema::apply_schema(&bootstrap_connection).await?;

        if is_memory {
            // Without a live connection the in-memory database is torn
            // down the moment `bootstrap_connection` drops.
            memory_anchor = Some(Arc::new(bootstrap_connection));
        }

        info!(db_path, "persistence store ready");

        Ok(Store {
            database,
            _exclusion_lock: exclusion_lock,
            _memory_anchor: memory_anchor,
            checkpoint_locks: KeyedLockTable::new(),
            fingerprint_locks: KeyedLockTable::new(),
        })
    }

    pub fn connection(&self) -> Result<Connection, PersistenceError> {
        if let Some(anchor) = &self._memory_anchor {
            return Ok((**anchor).clone());
        }
        self.database.connect().map_err(PersistenceError::from)
    }

    /// Runs `operation` against a fresh transaction, retrying on a busy
    /// database up to `COMMIT_RETRY_MAX_ATTEMPTS` times with jittered
    /// exponential backoff (the same curve the Governor uses for
    /// flood-wait, via `spectra_governor::jittered_backoff`).
    pub async fn commit_with_retry<F, Fut, T>(&self, mut operation: F) -> Result<T, PersistenceError>
    where
        F: FnMut(libsql::Transaction) -> Fut,
        Fut: std::future::Future<Output = Result<T, PersistenceError>>,
    {
        let mut attempt = 0;
        loop {
            let connection = self.connection()?;
            let transaction = connection.transaction().await.map_err(PersistenceError::from)?;

            match operation(transaction).await {
                Ok(value) => return Ok(value),
                Err(PersistenceError::BusyTimeout { .. }) if attempt < COMMIT_RETRY_MAX_ATTEMPTS => {
                    let delay = jittered_backoff(COMMIT_RETRY_BASE, attempt, COMMIT_RETRY_CAP, COMMIT_RETRY_VARIANCE);
                    warn!(attempt, delay_ms = delay.as_millis() as u64, "commit busy, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(other) => return Err(other),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connects_and_reapplies_schema_idempotently() {
        let store = Store::connect(":memory:", None).await.unwrap();
        let connection = store.connection().unwrap();
        schema::apply_schema(&connection).await.unwrap();
    }
}
