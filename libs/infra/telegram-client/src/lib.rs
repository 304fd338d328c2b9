//! Telegram client abstraction consumed by the archival, forwarder and
//! discovery pipelines: an opaque trait plus a simulated
//! implementation for tests and offline development. No wire protocol
//! is implemented in this crate — a concrete client would plug in
//! behind `TelegramClient` without the pipelines changing.

pub mod client;
pub mod errors;
pub mod simulated;

pub use client::{DownloadChunk, DownloadRequest, ForwardRequest, HistoryPage, RemoteMediaDescriptor, RemoteMessage, ResolvedEntity, SendRequest, TelegramClient};
pub use errors::ClientError;
pub use simulated::SimulatedTelegramClient;
