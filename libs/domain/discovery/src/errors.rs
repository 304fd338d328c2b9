// [libs/domain/discovery/src/errors.rs]
//! Error catalog for the Discovery Crawler.

use spectra_persistence::PersistenceError;
use spectra_telegram_client::ClientError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("telegram client error: {0}")]
    Client(#[from] ClientError),
}
