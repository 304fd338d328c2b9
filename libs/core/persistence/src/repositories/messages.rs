// [libs/core/persistence/src/repositories/messages.rs]
//! Message repository. `(entity_id, message_id)` writes are
//! idempotent — re-running an interrupted archive batch overwrites a
//! row with identical content rather than producing a duplicate.

use crate::errors::PersistenceError;
use crate::store::Store;
use chrono::{DateTime, Utc};
use libsql::{params, Row};
use spectra_domain_models::{Message, MessageKind};
use tracing::instrument;

#[derive(Clone)]
pub struct MessageRepository {
    store: Store,
}

impl MessageRepository {
    pub fn new(store: Store) -> Self {
        MessageRepository { store }
    }

    #[instrument(skip(self, message), fields(entity_id = message.entity_id, message_id = message.message_id))]
    pub async fn upsert(&self, message: &Message) -> Result<(), PersistenceError> {
        let connection = self.store.connection()?;
        connection
            .execute(
                r#"
                INSERT INTO messages (entity_id, message_id, sender_id, kind, date, edit_date, text, reply_to, media_id, checksum_sha256)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(entity_id, message_id) DO UPDATE SET
                    sender_id = excluded.sender_id,
                    kind = excluded.kind,
                    date = excluded.date,
                    edit_date = excluded.edit_date,
                    text = excluded.text,
                    reply_to = excluded.reply_to,
                    media_id = excluded.media_id,
                    checksum_sha256 = excluded.checksum_sha256
                "#,
                params![
                    message.entity_id,
                    message.message_id,
                    message.sender_id,
                    kind_str(message.kind),
                    message.date.to_rfc3339(),
                    message.edit_date.map(|d| d.to_rfc3339()),
                    message.text.clone(),
                    message.reply_to,
                    message.media_id,
                    message.checksum_sha256.clone()
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn get(&self, entity_id: i64, message_id: i64) -> Result<Option<Message>, PersistenceError> {
        let connection = self.store.connection()?;
        let mut rows = connection.query(SELECT_COLUMNS_BY_KEY, params![entity_id, message_id]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(map_row(row)?)),
            None => Ok(None),
        }
    }

    /// Most recent `limit` messages for an entity, newest first —
    /// consumed by the Discovery Crawler's reference scan.
    pub async fn recent(&self, entity_id: i64, limit: u32) -> Result<Vec<Message>, PersistenceError> {
        let connection = self.store.connection()?;
        let mut rows = connection
            .query(
                &format!("{SELECT_COLUMNS_ALL} WHERE entity_id = ?1 ORDER BY message_id DESC LIMIT ?2"),
                params![entity_id, limit],
            )
            .await?;
        let mut messages = Vec::new();
        while let Some(row) = rows.next().await? {
            messages.push(map_row(row)?);
        }
        Ok(messages)
    }

    /// SHA-256 checksums in message-id order, used by the Archival
    /// pipeline's completion summary: the SHA-256 of the concatenated
    /// per-message checksums.
    pub async fn checksums_in_order(&self, entity_id: i64) -> Result<Vec<String>, PersistenceError> {
        let connection = self.store.connection()?;
        let mut rows = connection
            .query(
                "SELECT checksum_sha256 FROM messages WHERE entity_id = ?1 ORDER BY message_id ASC",
                params![entity_id],
            )
            .await?;
        let mut checksums = Vec::new();
        while let Some(row) = rows.next().await? {
            checksums.push(row.get(0).map_err(|e| PersistenceError::Mapping(e.to_string()))?);
        }
        Ok(checksums)
    }

    /// `(count, min message id, max message id)` for an entity, or
    /// `None` if nothing has been archived yet — the count/range half
    /// of the Archival Pipeline's completion summary.
    pub async fn range_stats(&self, entity_id: i64) -> Result<Option<(i64, i64, i64)>, PersistenceError> {
        let connection = self.store.connection()?;
        let mut rows = connection
            .query(
                "SELECT COUNT(*), MIN(message_id), MAX(message_id) FROM messages WHERE entity_id = ?1",
                params![entity_id],
            )
            .await?;
        let Some(row) = rows.next().await? else { return Ok(None) };
        let count: i64 = row.get(0).map_err(|e| PersistenceError::Mapping(e.to_string()))?;
        if count == 0 {
            return Ok(None);
        }
        let min_id: i64 = row.get(1).map_err(|e| PersistenceError::Mapping(e.to_string()))?;
        let max_id: i64 = row.get(2).map_err(|e| PersistenceError::Mapping(e.to_string()))?;
        Ok(Some((count, min_id, max_id)))
    }

    /// Total bytes of media attached to an entity's archived messages.
    pub async fn total_media_bytes(&self, entity_id: i64) -> Result<u64, PersistenceError> {
        let connection = self.store.connection()?;
        let mut rows = connection
            .query(
                r#"
                SELECT COALESCE(SUM(mo.size_bytes), 0) FROM messages m
                JOIN media_objects mo ON mo.id = m.media_id
                WHERE m.entity_id = ?1
                "#,
                params![entity_id],
            )
            .await?;
        let Some(row) = rows.next().await? else { return Ok(0) };
        let total: i64 = row.get(0).map_err(|e| PersistenceError::Mapping(e.to_string()))?;
        Ok(total as u64)
    }
}

const SELECT_COLUMNS_ALL: &str = "SELECT entity_id, message_id, sender_id, kind, date, edit_date, text, reply_to, media_id, checksum_sha256 FROM messages";
const SELECT_COLUMNS_BY_KEY: &str = "SELECT entity_id, message_id, sender_id, kind, date, edit_date, text, reply_to, media_id, checksum_sha256 FROM messages WHERE entity_id = ?1 AND message_id = ?2";

fn kind_str(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::Text => "text",
        MessageKind::Media => "media",
        MessageKind::Service => "service",
    }
}

fn parse_kind(raw: &str) -> MessageKind {
    match raw {
        "media" => MessageKind::Media,
        "service" => MessageKind::Service,
        _ => MessageKind::Text,
    }
}

fn parse_timestamp(value: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&value).map(|dt| dt.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now())
}

fn parse_optional_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value.and_then(|v| DateTime::parse_from_rfc3339(&v).ok()).map(|dt| dt.with_timezone(&Utc))
}

fn map_row(row: Row) -> Result<Message, PersistenceError> {
    let kind_raw: String = row.get(3).map_err(|e| PersistenceError::Mapping(e.to_string()))?;
    let date: String = row.get(4).map_err(|e| PersistenceError::Mapping(e.to_string()))?;
    Ok(Message {
        entity_id: row.get(0).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        message_id: row.get(1).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        sender_id: row.get(2).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        kind: parse_kind(&kind_raw),
        date: parse_timestamp(date),
        edit_date: parse_optional_timestamp(row.get(5).map_err(|e| PersistenceError::Mapping(e.to_string()))?),
        text: row.get(6).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        reply_to: row.get(7).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        media_id: row.get(8).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        checksum_sha256: row.get(9).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
    })
}
