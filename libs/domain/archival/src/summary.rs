// [libs/domain/archival/src/summary.rs]
//! Completion summary for one archive run: count, id range, total
//! media bytes, and a single digest over every per-message checksum
//! in id order — verifiable offline from the stored rows alone, with
//! no dependency on this crate.

use crate::errors::ArchivalError;
use serde::Serialize;
use sha2::{Digest, Sha256};
use spectra_persistence::MessageRepository;

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveSummary {
    pub entity_id: i64,
    pub message_count: i64,
    pub min_message_id: Option<i64>,
    pub max_message_id: Option<i64>,
    pub total_media_bytes: u64,
    pub checksum_digest: String,
}

pub async fn build_summary(messages: &MessageRepository, entity_id: i64) -> Result<ArchiveSummary, ArchivalError> {
    let stats = messages.range_stats(entity_id).await?;
    let total_media_bytes = messages.total_media_bytes(entity_id).await?;
    let checksums = messages.checksums_in_order(entity_id).await?;

    let mut hasher = Sha256::new();
    for checksum in &checksums {
        hasher.update(checksum.as_bytes());
    }

    let (message_count, min_message_id, max_message_id) = match stats {
        Some((count, min_id, max_id)) => (count, Some(min_id), Some(max_id)),
        None => (0, None, None),
    };

    Ok(ArchiveSummary {
        entity_id,
        message_count,
        min_message_id,
        max_message_id,
        total_media_bytes,
        checksum_digest: hex::encode(hasher.finalize()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectra_domain_models::{Message, MessageKind};
    use spectra_persistence::Store;

    async fn repo() -> MessageRepository {
        let store = Store::connect(":memory:", None).await.unwrap();
        MessageRepository::new(store)
    }

    fn message(entity_id: i64, message_id: i64) -> Message {
        Message {
            entity_id,
            message_id,
            sender_id: None,
            kind: MessageKind::Text,
            date: chrono::Utc::now(),
            edit_date: None,
            text: Some("hi".into()),
            reply_to: None,
            media_id: None,
            checksum_sha256: format!("checksum-{message_id}"),
        }
    }

    #[tokio::test]
    async fn summary_is_empty_for_unarchived_entity() {
        let messages = repo().await;
        let summary = build_summary(&messages, 1).await.unwrap();
        assert_eq!(summary.message_count, 0);
        assert!(summary.min_message_id.is_none());
        assert!(summary.max_message_id.is_none());
    }

    #[tokio::test]
    async fn summary_reflects_archived_range() {
        let messages = repo().await;
        for id in [3, 1, 2] {
            messages.upsert(&message(1, id)).await.unwrap();
        }
        let summary = build_summary(&messages, 1).await.unwrap();
        assert_eq!(summary.message_count, 3);
        assert_eq!(summary.min_message_id, Some(1));
        assert_eq!(summary.max_message_id, Some(3));
        assert!(!summary.checksum_digest.is_empty());
    }

    #[tokio::test]
    async fn summary_digest_is_deterministic() {
        let messages = repo().await;
        messages.upsert(&message(1, 1)).await.unwrap();
        let a = build_summary(&messages, 1).await.unwrap();
        let b = build_summary(&messages, 1).await.unwrap();
        assert_eq!(a.checksum_digest, b.checksum_digest);
    }
}
