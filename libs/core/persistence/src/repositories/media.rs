// [libs/core/persistence/src/repositories/media.rs]
//! MediaObject repository — metadata rows for downloaded media files;
//! the file bytes themselves live under `media_dir`.

use crate::errors::PersistenceError;
use crate::store::Store;
use libsql::{params, Row};
use spectra_domain_models::MediaObject;
use tracing::instrument;

#[derive(Clone)]
pub struct MediaRepository {
    store: Store,
}

impl MediaRepository {
    pub fn new(store: Store) -> Self {
        MediaRepository { store }
    }

    #[instrument(skip(self, media))]
    pub async fn insert(&self, media: &MediaObject) -> Result<i64, PersistenceError> {
        let connection = self.store.connection()?;
        connection
            .execute(
                r#"INSERT INTO media_objects (mime_type, size_bytes, file_path, original_filename, sha256, phash, fuzzy_hash)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
                params![
                    media.mime_type.clone(),
                    media.size_bytes,
                    media.file_path.clone(),
                    media.original_filename.clone(),
                    media.sha256.clone(),
                    media.phash.map(|p| p as i64),
                    media.fuzzy_hash.clone()
                ],
            )
            .await?;
        let mut rows = connection.query("SELECT last_insert_rowid()", ()).await?;
        let row = rows.next().await?.ok_or(PersistenceError::NotFound)?;
        row.get(0).map_err(|e| PersistenceError::Mapping(e.to_string()))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<MediaObject>, PersistenceError> {
        let connection = self.store.connection()?;
        let mut rows = connection
            .query(
                "SELECT id, mime_type, size_bytes, file_path, original_filename, sha256, phash, fuzzy_hash FROM media_objects WHERE id = ?1",
                params![id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(map_row(row)?)),
            None => Ok(None),
        }
    }

    /// Looks up an existing media row by content hash, letting the
    /// Archival pipeline skip re-downloading a file it already has
    /// (e.g. a forwarded copy observed in two source entities).
    pub async fn get_by_sha256(&self, sha256: &str) -> Result<Option<MediaObject>, PersistenceError> {
        let connection = self.store.connection()?;
        let mut rows = connection
            .query(
                "SELECT id, mime_type, size_bytes, file_path, original_filename, sha256, phash, fuzzy_hash FROM media_objects WHERE sha256 = ?1",
                params![sha256],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(map_row(row)?)),
            None => Ok(None),
        }
    }
}

fn map_row(row: Row) -> Result<MediaObject, PersistenceError> {
    Ok(MediaObject {
        id: row.get(0).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        mime_type: row.get(1).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        size_bytes: row.get::<i64>(2).map_err(|e| PersistenceError::Mapping(e.to_string()))? as u64,
        file_path: row.get(3).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        original_filename: row.get(4).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        sha256: row.get(5).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        phash: row.get::<Option<i64>>(6).map_err(|e| PersistenceError::Mapping(e.to_string()))?.map(|p| p as u64),
        fuzzy_hash: row.get(7).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
    })
}
