// [libs/core/persistence/src/repositories/checkpoints.rs]
//! Checkpoint repository. Callers must hold `Store::checkpoint_locks`
//! for the entity before calling `advance` — this repository does not
//! take the lock itself, since a single archival batch often needs to
//! read-modify-write the checkpoint multiple times under one hold.

use crate::errors::PersistenceError;
use crate::store::Store;
use chrono::{DateTime, Utc};
use libsql::params;
use spectra_domain_models::Checkpoint;
use tracing::instrument;

#[derive(Clone)]
pub struct CheckpointRepository {
    store: Store,
}

impl CheckpointRepository {
    pub fn new(store: Store) -> Self {
        CheckpointRepository { store }
    }

    pub async fn get(&self, entity_id: i64, context: &str) -> Result<Option<Checkpoint>, PersistenceError> {
        let connection = self.store.connection()?;
        let mut rows = connection
            .query(
                "SELECT entity_id, context, last_fetched_message_id, updated_at FROM checkpoints WHERE entity_id = ?1 AND context = ?2",
                params![entity_id, context],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Checkpoint {
                entity_id: row.get(0).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
                context: row.get(1).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
                last_fetched_message_id: row.get(2).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
                updated_at: parse_timestamp(row.get(3).map_err(|e| PersistenceError::Mapping(e.to_string()))?),
            })),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn advance(&self, entity_id: i64, context: &str, last_fetched_message_id: i64, now: DateTime<Utc>) -> Result<(), PersistenceError> {
        let connection = self.store.connection()?;
        connection
            .execute(
                r#"
                INSERT INTO checkpoints (entity_id, context, last_fetched_message_id, updated_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(entity_id, context) DO UPDATE SET
                    last_fetched_message_id = excluded.last_fetched_message_id,
                    updated_at = excluded.updated_at
                "#,
                params![entity_id, context, last_fetched_message_id, now.to_rfc3339()],
            )
            .await?;
        Ok(())
    }
}

fn parse_timestamp(value: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&value).map(|dt| dt.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now())
}
