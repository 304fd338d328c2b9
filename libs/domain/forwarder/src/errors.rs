// [libs/domain/forwarder/src/errors.rs]
//! Error catalog for the Forwarder and its invitation sub-pipeline.

use spectra_persistence::PersistenceError;
use spectra_telegram_client::ClientError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForwarderError {
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("telegram client error: {0}")]
    Client(#[from] ClientError),

    #[error("source entity {0} has no account with recorded access")]
    NoAccessibleAccount(i64),
}
