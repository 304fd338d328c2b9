// [libs/core/persistence/src/repositories/entities.rs]
//! Entity repository: the Discovery Crawler's visited set — the
//! Entity table keyed by id — plus the per-account access-hash
//! bindings every pipeline needs before it can address a
//! channel/group through the client.

use crate::errors::PersistenceError;
use crate::store::Store;
use chrono::{DateTime, Utc};
use libsql::{params, Row};
use spectra_domain_models::{Entity, EntityAccessHash, EntityKind};
use tracing::instrument;

#[derive(Clone)]
pub struct EntityRepository {
    store: Store,
}

impl EntityRepository {
    pub fn new(store: Store) -> Self {
        EntityRepository { store }
    }

    /// Inserts the entity if unseen, or bumps `last_seen_at` and
    /// `priority_score` if already known — the Discovery Crawler calls
    /// this for every popped candidate regardless of whether it was
    /// already in the visited set.
    #[instrument(skip(self, entity), fields(entity_id = entity.id))]
    pub async fn upsert(&self, entity: &Entity) -> Result<(), PersistenceError> {
        let connection = self.store.connection()?;
        connection
            .execute(
                r#"
                INSERT INTO entities (id, title, kind, first_seen_at, last_seen_at, discovery_depth, priority_score)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    last_seen_at = excluded.last_seen_at,
                    priority_score = excluded.priority_score
                "#,
                params![
                    entity.id,
                    entity.title.clone(),
                    kind_str(entity.kind),
                    entity.first_seen_at.to_rfc3339(),
                    entity.last_seen_at.to_rfc3339(),
                    entity.discovery_depth,
                    entity.priority_score
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Entity>, PersistenceError> {
        let connection = self.store.connection()?;
        let mut rows = connection
            .query(
                "SELECT id, title, kind, first_seen_at, last_seen_at, discovery_depth, priority_score FROM entities WHERE id = ?1",
                params![id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(map_row(row)?)),
            None => Ok(None),
        }
    }

    pub async fn is_visited(&self, id: i64) -> Result<bool, PersistenceError> {
        Ok(self.get_by_id(id).await?.is_some())
    }

    pub async fn list_all(&self) -> Result<Vec<Entity>, PersistenceError> {
        let connection = self.store.connection()?;
        let mut rows = connection
            .query("SELECT id, title, kind, first_seen_at, last_seen_at, discovery_depth, priority_score FROM entities ORDER BY priority_score DESC", ())
            .await?;
        let mut entities = Vec::new();
        while let Some(row) = rows.next().await? {
            entities.push(map_row(row)?);
        }
        Ok(entities)
    }

    #[instrument(skip(self))]
    pub async fn upsert_access_hash(&self, binding: &EntityAccessHash) -> Result<(), PersistenceError> {
        let connection = self.store.connection()?;
        connection
            .execute(
                r#"
                INSERT INTO entity_access_hashes (account_id, entity_id, access_hash, learned_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(account_id, entity_id) DO UPDATE SET
                    access_hash = excluded.access_hash,
                    learned_at = excluded.learned_at
                "#,
                params![binding.account_id, binding.entity_id, binding.access_hash, binding.learned_at.to_rfc3339()],
            )
            .await?;
        Ok(())
    }

    pub async fn get_access_hash(&self, account_id: i64, entity_id: i64) -> Result<Option<i64>, PersistenceError> {
        let connection = self.store.connection()?;
        let mut rows = connection
            .query(
                "SELECT access_hash FROM entity_access_hashes WHERE account_id = ?1 AND entity_id = ?2",
                params![account_id, entity_id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row.get(0).map_err(|e| PersistenceError::Mapping(e.to_string()))?)),
            None => Ok(None),
        }
    }

    /// "channels.update-access" operator verb target: forces a fresh
    /// access-hash lookup by clearing the cached binding.
    pub async fn clear_access_hash(&self, account_id: i64, entity_id: i64) -> Result<(), PersistenceError> {
        let connection = self.store.connection()?;
        connection
            .execute("DELETE FROM entity_access_hashes WHERE account_id = ?1 AND entity_id = ?2", params![account_id, entity_id])
            .await?;
        Ok(())
    }
}

fn kind_str(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Channel => "channel",
        EntityKind::Supergroup => "supergroup",
        EntityKind::Chat => "chat",
    }
}

fn parse_kind(raw: &str) -> EntityKind {
    match raw {
        "supergroup" => EntityKind::Supergroup,
        "chat" => EntityKind::Chat,
        _ => EntityKind::Channel,
    }
}

fn parse_timestamp(value: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&value).map(|dt| dt.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now())
}

fn map_row(row: Row) -> Result<Entity, PersistenceError> {
    let kind_raw: String = row.get(2).map_err(|e| PersistenceError::Mapping(e.to_string()))?;
    let first_seen: String = row.get(3).map_err(|e| PersistenceError::Mapping(e.to_string()))?;
    let last_seen: String = row.get(4).map_err(|e| PersistenceError::Mapping(e.to_string()))?;
    Ok(Entity {
        id: row.get(0).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        title: row.get(1).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        kind: parse_kind(&kind_raw),
        first_seen_at: parse_timestamp(first_seen),
        last_seen_at: parse_timestamp(last_seen),
        discovery_depth: row.get::<i64>(5).map_err(|e| PersistenceError::Mapping(e.to_string()))? as u32,
        priority_score: row.get(6).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
    })
}
