// [libs/core/persistence/src/repositories/integrity.rs]
//! `StoreIntegrityReport`: schema-version confirmation, a `PRAGMA
//! foreign_key_check`-equivalent scan, a spot-check for indexes the
//! schema module is expected to have created, and a cheap engine-level
//! consistency probe.

use crate::errors::PersistenceError;
use crate::schema::SCHEMA_VERSION;
use crate::store::Store;
use libsql::params;
use serde::{Deserialize, Serialize};
use tracing::instrument;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyViolation {
    pub table: String,
    pub rowid: i64,
    pub parent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreIntegrityReport {
    pub schema_ok: bool,
    pub foreign_key_violations: Vec<ForeignKeyViolation>,
    pub missing_indexes: Vec<String>,
    pub engine_check_ok: bool,
}

impl StoreIntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.schema_ok && self.foreign_key_violations.is_empty() && self.missing_indexes.is_empty() && self.engine_check_ok
    }
}

const EXPECTED_INDEXES: &[&str] = &[
    "idx_accounts_health",
    "idx_messages_date",
    "idx_archive_jobs_status",
    "idx_forward_jobs_status",
    "idx_discovery_jobs_status",
    "idx_invitations_eligible",
    "idx_discovery_edges_source",
];

#[derive(Clone)]
pub struct IntegrityRepository {
    store: Store,
}

impl IntegrityRepository {
    pub fn new(store: Store) -> Self {
        IntegrityRepository { store }
    }

    #[instrument(skip(self))]
    pub async fn run_check(&self) -> Result<StoreIntegrityReport, PersistenceError> {
        let connection = self.store.connection()?;

        let schema_ok = match connection.query("SELECT version FROM schema_version LIMIT 1", ()).await {
            Ok(mut rows) => match rows.next().await? {
                Some(row) => row.get::<i64>(0).map_err(|e| PersistenceError::Mapping(e.to_string()))? == SCHEMA_VERSION,
                None => false,
            },
            Err(_) => false,
        };

        let mut foreign_key_violations = Vec::new();
        let mut fk_rows = connection.query("PRAGMA foreign_key_check", ()).await?;
        while let Some(row) = fk_rows.next().await? {
            foreign_key_violations.push(ForeignKeyViolation {
                table: row.get(0).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
                rowid: row.get::<Option<i64>>(1).map_err(|e| PersistenceError::Mapping(e.to_string()))?.unwrap_or(-1),
                parent: row.get(2).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
            });
        }

        let mut present = std::collections::HashSet::new();
        let mut index_rows = connection.query("SELECT name FROM sqlite_master WHERE type = 'index'", ()).await?;
        while let Some(row) = index_rows.next().await? {
            present.insert(row.get::<String>(0).map_err(|e| PersistenceError::Mapping(e.to_string()))?);
        }
        let missing_indexes: Vec<String> = EXPECTED_INDEXES.iter().filter(|name| !present.contains(**name)).map(|name| name.to_string()).collect();

        let engine_check_ok = match connection.query("PRAGMA quick_check", ()).await {
            Ok(mut rows) => match rows.next().await? {
                Some(row) => row.get::<String>(0).map_err(|e| PersistenceError::Mapping(e.to_string()))? == "ok",
                None => true,
            },
            Err(_) => false,
        };

        Ok(StoreIntegrityReport { schema_ok, foreign_key_violations, missing_indexes, engine_check_ok })
    }

    /// Reassigns orphaned `media_objects` rows to nothing: media rows
    /// whose file no longer exists are left for the caller to clean up,
    /// this only reports `message.media_id` values with no matching row.
    pub async fn dangling_media_references(&self) -> Result<Vec<i64>, PersistenceError> {
        let connection = self.store.connection()?;
        let mut rows = connection
            .query(
                r#"
                SELECT m.media_id FROM messages m
                LEFT JOIN media_objects mo ON mo.id = m.media_id
                WHERE m.media_id IS NOT NULL AND mo.id IS NULL
                "#,
                params![],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row.get(0).map_err(|e| PersistenceError::Mapping(e.to_string()))?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healthy_report_requires_every_field_clean() {
        let report = StoreIntegrityReport { schema_ok: true, foreign_key_violations: vec![], missing_indexes: vec![], engine_check_ok: true };
        assert!(report.is_healthy());

        let unhealthy = StoreIntegrityReport { schema_ok: true, foreign_key_violations: vec![], missing_indexes: vec!["idx_x".into()], engine_check_ok: true };
        assert!(!unhealthy.is_healthy());
    }
}
