// [libs/core/persistence/src/repositories/access_records.rs]
//! AccessRecord repository — used by "total" mode forwarding to pick
//! an account known to have access to a source, and marked stale on
//! `EntityAccess` errors.

use crate::errors::PersistenceError;
use crate::store::Store;
use chrono::{DateTime, Utc};
use libsql::{params, Row};
use spectra_domain_models::AccessRecord;
use tracing::instrument;

#[derive(Clone)]
pub struct AccessRecordRepository {
    store: Store,
}

impl AccessRecordRepository {
    pub fn new(store: Store) -> Self {
        AccessRecordRepository { store }
    }

    #[instrument(skip(self, record))]
    pub async fn record(&self, record: &AccessRecord) -> Result<(), PersistenceError> {
        let connection = self.store.connection()?;
        connection
            .execute(
                r#"
                INSERT INTO access_records (account_id, entity_id, access_hash, last_seen_at, stale)
                VALUES (?1, ?2, ?3, ?4, 0)
                ON CONFLICT(account_id, entity_id) DO UPDATE SET
                    access_hash = excluded.access_hash,
                    last_seen_at = excluded.last_seen_at,
                    stale = 0
                "#,
                params![record.account_id, record.entity_id, record.access_hash, record.last_seen_at.to_rfc3339()],
            )
            .await?;
        Ok(())
    }

    pub async fn mark_stale(&self, account_id: i64, entity_id: i64) -> Result<(), PersistenceError> {
        let connection = self.store.connection()?;
        connection
            .execute(
                "UPDATE access_records SET stale = 1 WHERE account_id = ?1 AND entity_id = ?2",
                params![account_id, entity_id],
            )
            .await?;
        Ok(())
    }

    /// Any non-stale account known to have access to `entity_id` —
    /// the fallback path for total-mode forwarding after an
    /// `EntityAccess` failure on the primary account.
    pub async fn find_accessible_account(&self, entity_id: i64) -> Result<Option<i64>, PersistenceError> {
        let connection = self.store.connection()?;
        let mut rows = connection
            .query(
                "SELECT account_id FROM access_records WHERE entity_id = ?1 AND stale = 0 ORDER BY last_seen_at DESC LIMIT 1",
                params![entity_id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row.get(0).map_err(|e| PersistenceError::Mapping(e.to_string()))?)),
            None => Ok(None),
        }
    }

    pub async fn list_for_entity(&self, entity_id: i64) -> Result<Vec<AccessRecord>, PersistenceError> {
        let connection = self.store.connection()?;
        let mut rows = connection
            .query(
                "SELECT account_id, entity_id, access_hash, last_seen_at FROM access_records WHERE entity_id = ?1",
                params![entity_id],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(map_row(row)?);
        }
        Ok(out)
    }
}

fn map_row(row: Row) -> Result<AccessRecord, PersistenceError> {
    let last_seen: String = row.get(3).map_err(|e| PersistenceError::Mapping(e.to_string()))?;
    Ok(AccessRecord {
        account_id: row.get(0).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        entity_id: row.get(1).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        access_hash: row.get(2).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        last_seen_at: parse_timestamp(last_seen),
    })
}

fn parse_timestamp(value: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&value).map(|dt| dt.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now())
}
