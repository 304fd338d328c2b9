// [libs/core/persistence/src/repositories/discovery_edges.rs]
//! Discovery edge repository: persists edges (source -> target,
//! observed-at, context). Pure write-and-list — downstream network
//! analysis is explicitly out of scope, so this repository only needs
//! to make the edges a reliable read later.

use crate::errors::PersistenceError;
use crate::store::Store;
use chrono::{DateTime, Utc};
use libsql::params;
use tracing::instrument;

#[derive(Clone)]
pub struct DiscoveryEdgeRepository {
    store: Store,
}

#[derive(Debug, Clone)]
pub struct DiscoveryEdge {
    pub source_entity_id: i64,
    pub target_entity_id: i64,
    pub observed_at: DateTime<Utc>,
    pub context: String,
}

impl DiscoveryEdgeRepository {
    pub fn new(store: Store) -> Self {
        DiscoveryEdgeRepository { store }
    }

    #[instrument(skip(self, edge))]
    pub async fn record(&self, edge: &DiscoveryEdge) -> Result<(), PersistenceError> {
        let connection = self.store.connection()?;
        connection
            .execute(
                r#"
                INSERT INTO discovery_edges (source_entity_id, target_entity_id, observed_at, context)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(source_entity_id, target_entity_id, context) DO UPDATE SET
                    observed_at = excluded.observed_at
                "#,
                params![edge.source_entity_id, edge.target_entity_id, edge.observed_at.to_rfc3339(), edge.context.clone()],
            )
            .await?;
        Ok(())
    }

    pub async fn list_outbound(&self, source_entity_id: i64) -> Result<Vec<DiscoveryEdge>, PersistenceError> {
        let connection = self.store.connection()?;
        let mut rows = connection
            .query(
                "SELECT source_entity_id, target_entity_id, observed_at, context FROM discovery_edges WHERE source_entity_id = ?1",
                params![source_entity_id],
            )
            .await?;
        let mut edges = Vec::new();
        while let Some(row) = rows.next().await? {
            let observed_at: String = row.get(2).map_err(|e| PersistenceError::Mapping(e.to_string()))?;
            edges.push(DiscoveryEdge {
                source_entity_id: row.get(0).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
                target_entity_id: row.get(1).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
                observed_at: DateTime::parse_from_rfc3339(&observed_at).map(|dt| dt.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now()),
                context: row.get(3).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
            });
        }
        Ok(edges)
    }
}
