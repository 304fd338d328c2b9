// [libs/core/persistence/src/repositories/fingerprints.rs]
//! ForwardFingerprint repository: per-destination dedup sets. Callers
//! must hold `Store::fingerprint_locks` for the destination entity
//! across a whole forwarding batch: dedup-fingerprint writes are
//! serialised per destination entity, and within a destination the
//! forwarder must observe the fingerprint set as-of the start of its
//! batch plus any writes it has made itself.

use crate::errors::PersistenceError;
use crate::store::Store;
use chrono::{DateTime, Utc};
use libsql::{params, Row};
use spectra_domain_models::ForwardFingerprint;
use tracing::instrument;

#[derive(Clone)]
pub struct FingerprintRepository {
    store: Store,
}

impl FingerprintRepository {
    pub fn new(store: Store) -> Self {
        FingerprintRepository { store }
    }

    pub async fn exists(&self, destination_entity_id: i64, sha256: &str) -> Result<bool, PersistenceError> {
        let connection = self.store.connection()?;
        let mut rows = connection
            .query(
                "SELECT 1 FROM forward_fingerprints WHERE destination_entity_id = ?1 AND sha256 = ?2",
                params![destination_entity_id, sha256],
            )
            .await?;
        Ok(rows.next().await?.is_some())
    }

    /// Near-duplicate check by perceptual-hash Hamming distance against
    /// every fingerprint already recorded for the destination. `O(n)`
    /// in fingerprints-per-destination, acceptable at SPECTRA's scale
    /// (a destination's dedup set rarely exceeds a few hundred
    /// thousand rows and this runs once per candidate message).
    pub async fn nearest_perceptual_distance(&self, destination_entity_id: i64, phash: u64) -> Result<Option<u32>, PersistenceError> {
        let connection = self.store.connection()?;
        let mut rows = connection
            .query(
                "SELECT perceptual_hash FROM forward_fingerprints WHERE destination_entity_id = ?1 AND perceptual_hash IS NOT NULL",
                params![destination_entity_id],
            )
            .await?;
        let mut closest = None;
        while let Some(row) = rows.next().await? {
            let other: i64 = row.get(0).map_err(|e| PersistenceError::Mapping(e.to_string()))?;
            let distance = spectra_domain_models::phash_hamming_distance(phash, other as u64);
            closest = Some(closest.map_or(distance, |c: u32| c.min(distance)));
        }
        Ok(closest)
    }

    #[instrument(skip(self, fingerprint))]
    pub async fn insert(&self, fingerprint: &ForwardFingerprint) -> Result<(), PersistenceError> {
        let connection = self.store.connection()?;
        connection
            .execute(
                r#"
                INSERT INTO forward_fingerprints (destination_entity_id, sha256, perceptual_hash, fuzzy_hash, first_seen_at, origin_entity_id)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(destination_entity_id, sha256) DO NOTHING
                "#,
                params![
                    fingerprint.destination_entity_id,
                    fingerprint.sha256.clone(),
                    fingerprint.perceptual_hash.map(|p| p as i64),
                    fingerprint.fuzzy_hash.clone(),
                    fingerprint.first_seen_at.to_rfc3339(),
                    fingerprint.origin_entity_id
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn list_for_destination(&self, destination_entity_id: i64) -> Result<Vec<ForwardFingerprint>, PersistenceError> {
        let connection = self.store.connection()?;
        let mut rows = connection
            .query(
                "SELECT destination_entity_id, sha256, perceptual_hash, fuzzy_hash, first_seen_at, origin_entity_id FROM forward_fingerprints WHERE destination_entity_id = ?1",
                params![destination_entity_id],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(map_row(row)?);
        }
        Ok(out)
    }
}

fn map_row(row: Row) -> Result<ForwardFingerprint, PersistenceError> {
    let first_seen: String = row.get(4).map_err(|e| PersistenceError::Mapping(e.to_string()))?;
    Ok(ForwardFingerprint {
        destination_entity_id: row.get(0).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        sha256: row.get(1).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        perceptual_hash: row.get::<Option<i64>>(2).map_err(|e| PersistenceError::Mapping(e.to_string()))?.map(|p| p as u64),
        fuzzy_hash: row.get(3).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        first_seen_at: parse_timestamp(first_seen),
        origin_entity_id: row.get(5).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
    })
}

fn parse_timestamp(value: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&value).map(|dt| dt.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now())
}
