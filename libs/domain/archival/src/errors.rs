// [libs/domain/archival/src/errors.rs]
//! Error catalog for the Archival Pipeline, collapsing the pipeline's
//! three failure surfaces (storage, wire client, media I/O) behind one
//! enum so `ArchivalPipeline::run` can classify each into the
//! Scheduler's `StepOutcome` without matching three separate types at
//! every call site.

use spectra_media_fetch::MediaFetchError;
use spectra_persistence::PersistenceError;
use spectra_telegram_client::ClientError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchivalError {
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("telegram client error: {0}")]
    Client(#[from] ClientError),

    #[error("media fetch error: {0}")]
    Media(#[from] MediaFetchError),
}
