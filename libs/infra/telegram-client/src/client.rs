// [libs/infra/telegram-client/src/client.rs]
//! The opaque Telegram client abstraction: the core treats it as an
//! opaque dependency exposing entity resolution, history iteration,
//! forward, send, download, join, and flood-wait signalling. No
//! custom wire protocol is defined here.
//!
//! Every pipeline crate (archival, forwarder, discovery) depends on
//! `TelegramClient`, never on a concrete wire implementation — the
//! concrete implementation behind it is swappable without touching
//! pipeline logic, the same seam the source draws around
//! `BitcoinNetworkUplinkClient`.

use crate::errors::ClientError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use spectra_credentials::AccountHandle;
use spectra_domain_models::{CaptionEntity, EntityKind, MessageKind};

#[derive(Debug, Clone)]
pub struct ResolvedEntity {
    pub entity_id: i64,
    pub access_hash: i64,
    pub title: String,
    pub kind: EntityKind,
}

#[derive(Debug, Clone)]
pub struct RemoteMessage {
    pub message_id: i64,
    pub sender_id: Option<i64>,
    pub kind: MessageKind,
    pub date: DateTime<Utc>,
    pub edit_date: Option<DateTime<Utc>>,
    pub text: Option<String>,
    pub reply_to: Option<i64>,
    pub media: Option<RemoteMediaDescriptor>,
    /// Bold/url/mention spans carried alongside `text`, used by the
    /// Forwarder's canonical fingerprint.
    pub caption_entities: Vec<CaptionEntity>,
}

#[derive(Debug, Clone)]
pub struct RemoteMediaDescriptor {
    pub file_reference: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub original_filename: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct HistoryPage {
    /// Exclusive lower bound, ascending order: returns messages with
    /// id > `after_message_id`, oldest of the page first. `None` starts
    /// from the oldest message the entity has — the shape a resumable
    /// checkpoint-driven archival fetch needs.
    pub after_message_id: Option<i64>,
    pub limit: u32,
    /// Restricts the page to one forum topic thread; `None` reads the
    /// entity's main history.
    pub topic_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub source_entity: ResolvedEntity,
    pub destination_entity: ResolvedEntity,
    pub message_ids: Vec<i64>,
    /// `true` copies content as a new message instead of a native
    /// forward, stripping the "forwarded from" banner.
    pub copy_into_destination: bool,
}

#[derive(Debug, Clone)]
pub struct SendRequest {
    pub destination_entity: ResolvedEntity,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub file_reference: String,
    pub max_bytes: u64,
}

/// One streamed chunk of a media download — never larger than the
/// bounded-chunk size the media-fetch crate enforces.
#[derive(Debug, Clone)]
pub struct DownloadChunk {
    pub bytes: Vec<u8>,
    pub is_final: bool,
}

#[async_trait]
pub trait TelegramClient: Send + Sync {
    async fn resolve_entity(&self, account: &AccountHandle, reference: &str) -> Result<ResolvedEntity, ClientError>;

    async fn history_page(&self, account: &AccountHandle, entity: &ResolvedEntity, page: HistoryPage) -> Result<Vec<RemoteMessage>, ClientError>;

    /// Forum topic threads exposed by `entity`, if any. Entities
    /// without topics return an empty list.
    async fn list_topics(&self, account: &AccountHandle, entity: &ResolvedEntity) -> Result<Vec<i64>, ClientError>;

    async fn forward(&self, account: &AccountHandle, request: ForwardRequest) -> Result<(), ClientError>;

    async fn send(&self, account: &AccountHandle, request: SendRequest) -> Result<(), ClientError>;

    async fn download_chunk(&self, account: &AccountHandle, request: &DownloadRequest, offset: u64) -> Result<DownloadChunk, ClientError>;

    async fn join(&self, account: &AccountHandle, entity: &ResolvedEntity) -> Result<(), ClientError>;
}
