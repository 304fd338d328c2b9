// [libs/infra/media-fetch/src/downloader.rs]
//! Bounded-chunk media downloader: streams to the media directory and
//! writes a sidecar metadata object. Grounded on
//! the source's `ForensicDnaHydrator`/`WorkerClient` shard download:
//! async `tokio::fs` I/O, a running SHA-256 over the stream, and a
//! size ceiling enforced before the write lands — except chunks are
//! staged to a temp file and renamed into place instead of written
//! directly, so a crash mid-download never leaves a partial file at
//! the final path the Persistence layer might already reference.

use crate::errors::MediaFetchError;
use crate::hashing::{average_hash, fuzzy_hash};
use chrono::Utc;
use sha2::{Digest, Sha256};
use spectra_credentials::AccountHandle;
use spectra_domain_models::{MediaSidecar, MediaSidecarSource};
use spectra_telegram_client::{DownloadRequest, TelegramClient};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::instrument;

/// Telegram media is fetched in chunks no larger than this, independent
/// of the operator's overall `max_file_size_mb` cap.
pub const CHUNK_SIZE_BYTES: u64 = 1 << 20;

pub struct DownloadedMedia {
    pub absolute_path: PathBuf,
    pub relative_path: String,
    pub size_bytes: u64,
    pub sha256: String,
    pub phash: Option<u64>,
    pub fuzzy_hash: Option<String>,
}

#[instrument(skip(client, account), fields(relative_path = %relative_path))]
pub async fn download_media(
    client: &dyn TelegramClient,
    account: &AccountHandle,
    file_reference: &str,
    max_bytes: u64,
    media_root: &Path,
    relative_path: &str,
    mime_type: &str,
) -> Result<DownloadedMedia, MediaFetchError> {
    let final_path = media_root.join(relative_path);
    if let Some(parent) = final_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let temp_path = final_path.with_extension(format!("{}.part", uuid::Uuid::new_v4()));
    let mut temp_file = tokio::fs::File::create(&temp_path).await?;

    let request = DownloadRequest { file_reference: file_reference.to_string(), max_bytes };
    let mut hasher = Sha256::new();
    let mut buffer = Vec::new();
    let mut total = 0u64;
    let mut offset = 0u64;

    loop {
        let chunk = client.download_chunk(account, &request, offset).await?;
        total += chunk.bytes.len() as u64;
        if total > max_bytes {
            drop(temp_file);
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(MediaFetchError::TooLarge { size_bytes: total, max_bytes });
        }
        hasher.update(&chunk.bytes);
        temp_file.write_all(&chunk.bytes).await?;
        buffer.extend_from_slice(&chunk.bytes);
        offset += chunk.bytes.len() as u64;
        if chunk.is_final {
            break;
        }
    }
    temp_file.flush().await?;
    drop(temp_file);

    tokio::fs::rename(&temp_path, &final_path).await?;

    let sha256 = hex::encode(hasher.finalize());
    let phash = mime_type.starts_with("image/").then(|| average_hash(&buffer));
    let fuzzy = (!buffer.is_empty()).then(|| fuzzy_hash(&buffer));

    Ok(DownloadedMedia { absolute_path: final_path, relative_path: relative_path.to_string(), size_bytes: total, sha256, phash, fuzzy_hash: fuzzy })
}

/// Writes the append-only sidecar metadata object alongside a
/// downloaded file.
pub async fn write_sidecar(media_root: &Path, relative_path: &str, media: &DownloadedMedia, media_id: i64, mime: &str, entity_id: i64, message_id: i64) -> Result<(), MediaFetchError> {
    let sidecar = MediaSidecar {
        id: media_id,
        mime: mime.to_string(),
        size: media.size_bytes,
        sha256: media.sha256.clone(),
        phash: media.phash,
        source: MediaSidecarSource { entity: entity_id, message: message_id },
        fetched_at: Utc::now(),
    };
    let sidecar_path = media_root.join(relative_path).with_extension("json");
    let json = serde_json::to_vec_pretty(&sidecar).map_err(|e| MediaFetchError::Serialization(e.to_string()))?;
    tokio::fs::write(sidecar_path, json).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectra_telegram_client::{ClientError, DownloadChunk, ForwardRequest, HistoryPage, RemoteMessage, ResolvedEntity, SendRequest};
    use std::sync::atomic::{AtomicU64, Ordering};

    struct FixedChunksClient {
        chunks: Vec<Vec<u8>>,
        served: AtomicU64,
    }

    #[async_trait::async_trait]
    impl TelegramClient for FixedChunksClient {
        async fn resolve_entity(&self, _account: &AccountHandle, _reference: &str) -> Result<ResolvedEntity, ClientError> {
            unimplemented!()
        }
        async fn history_page(&self, _account: &AccountHandle, _entity: &ResolvedEntity, _page: HistoryPage) -> Result<Vec<RemoteMessage>, ClientError> {
            unimplemented!()
        }
        async fn list_topics(&self, _account: &AccountHandle, _entity: &ResolvedEntity) -> Result<Vec<i64>, ClientError> {
            unimplemented!()
        }
        async fn forward(&self, _account: &AccountHandle, _request: ForwardRequest) -> Result<(), ClientError> {
            unimplemented!()
        }
        async fn send(&self, _account: &AccountHandle, _request: SendRequest) -> Result<(), ClientError> {
            unimplemented!()
        }
        async fn download_chunk(&self, _account: &AccountHandle, _request: &DownloadRequest, _offset: u64) -> Result<DownloadChunk, ClientError> {
            let index = self.served.fetch_add(1, Ordering::SeqCst) as usize;
            let is_final = index + 1 == self.chunks.len();
            Ok(DownloadChunk { bytes: self.chunks[index].clone(), is_final })
        }
        async fn join(&self, _account: &AccountHandle, _entity: &ResolvedEntity) -> Result<(), ClientError> {
            unimplemented!()
        }
    }

    fn account() -> AccountHandle {
        AccountHandle { account_id: 1, session_name: "acct-1".into() }
    }

    #[tokio::test]
    async fn downloads_reassembles_chunks_and_renames_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let client = FixedChunksClient { chunks: vec![vec![1u8; 10], vec![2u8; 10]], served: AtomicU64::new(0) };

        let media = download_media(&client, &account(), "file-ref", 1024, dir.path(), "1/2026/03/900.bin", "application/octet-stream").await.unwrap();

        assert_eq!(media.size_bytes, 20);
        assert!(media.absolute_path.exists());
        assert!(!media.absolute_path.with_extension("bin.part").exists());
    }

    #[tokio::test]
    async fn exceeding_cap_is_rejected_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let client = FixedChunksClient { chunks: vec![vec![0u8; 2048]], served: AtomicU64::new(0) };

        let result = download_media(&client, &account(), "file-ref", 1024, dir.path(), "1/2026/03/901.bin", "application/octet-stream").await;
        assert!(matches!(result, Err(MediaFetchError::TooLarge { .. })));
    }
}
