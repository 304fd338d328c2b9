//! Media download and hashing for the SPECTRA archival pipeline:
//! bounded-chunk streaming from a
//! `TelegramClient`, temp-path-then-rename durability, SHA-256 and
//! perceptual/fuzzy hashing, and sidecar metadata.

pub mod downloader;
pub mod errors;
pub mod hashing;

pub use downloader::{download_media, write_sidecar, DownloadedMedia, CHUNK_SIZE_BYTES};
pub use errors::MediaFetchError;
pub use hashing::{average_hash, fuzzy_hash, fuzzy_similarity};
