// [libs/infra/media-fetch/src/errors.rs]
//! Error catalog for the media downloader. Grounded on the source's
//! `ForensicDnaHydrator`: io faults and integrity mismatches surfaced
//! distinctly rather than collapsed into one variant.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaFetchError {
    #[error("telegram client error: {0}")]
    Client(#[from] spectra_telegram_client::ClientError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("media exceeds configured size cap ({size_bytes} > {max_bytes})")]
    TooLarge { size_bytes: u64, max_bytes: u64 },

    #[error("sidecar serialization error: {0}")]
    Serialization(String),
}
