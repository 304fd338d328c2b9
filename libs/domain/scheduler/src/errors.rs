// [libs/domain/scheduler/src/errors.rs]
//! Error catalog for the Account Scheduler: `SchedulerError` wraps the
//! Governor's `RetryAfter` plus `QueueFull`, `NoEligibleAccount`,
//! `Cancelled`.

use spectra_credentials::RegistryError;
use spectra_persistence::PersistenceError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("credential registry error: {0}")]
    Credentials(#[from] RegistryError),

    #[error("no account is admitted right now, retry after {0:?}")]
    RetryAfter(Duration),

    #[error("work queue at capacity")]
    QueueFull,

    #[error("no eligible account for lease")]
    NoEligibleAccount,

    #[error("cancelled")]
    Cancelled,
}
