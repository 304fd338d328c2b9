// [apps/spectra-orchestrator/src/errors.rs]
//! `CoreError`: the composition root's single error type. Every
//! pipeline/crate error converts into one of these kinds, and
//! `exit_code` maps them onto the operator surface's process exit
//! status (0 success, 2 configuration, 3 storage, 4 auth/ban, 5
//! cancelled).

use spectra_archival::ArchivalError;
use spectra_credentials::RegistryError;
use spectra_discovery::DiscoveryError;
use spectra_forwarder::ForwarderError;
use spectra_persistence::PersistenceError;
use spectra_scheduler::SchedulerError;
use spectra_telegram_client::ClientError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("authentication failed or account banned: {0}")]
    Auth(String),

    #[error("cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl CoreError {
    /// Process exit status: 0 success, 2 configuration error, 3
    /// storage error, 4 authentication/ban, 5 cancelled.
    pub fn exit_code(&self) -> i32 {
        match self {
            CoreError::Configuration(_) => 2,
            CoreError::Storage(_) => 3,
            CoreError::Auth(_) => 4,
            CoreError::Cancelled => 5,
            CoreError::Other(_) => 1,
        }
    }
}

impl From<PersistenceError> for CoreError {
    fn from(error: PersistenceError) -> Self {
        CoreError::Storage(error.to_string())
    }
}

impl From<RegistryError> for CoreError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::Banned(account) => CoreError::Auth(format!("account {account} is banned")),
            RegistryError::UnknownAccount(account) => CoreError::Configuration(format!("unknown account: {account}")),
            other => CoreError::Other(other.to_string()),
        }
    }
}

impl From<SchedulerError> for CoreError {
    fn from(error: SchedulerError) -> Self {
        match error {
            SchedulerError::Persistence(e) => e.into(),
            SchedulerError::Credentials(e) => e.into(),
            SchedulerError::Cancelled => CoreError::Cancelled,
            other => CoreError::Other(other.to_string()),
        }
    }
}

impl From<ClientError> for CoreError {
    fn from(error: ClientError) -> Self {
        match error {
            ClientError::Auth => CoreError::Auth("telegram client authentication failed".to_string()),
            ClientError::Cancelled => CoreError::Cancelled,
            other => CoreError::Other(other.to_string()),
        }
    }
}

impl From<ArchivalError> for CoreError {
    fn from(error: ArchivalError) -> Self {
        match error {
            ArchivalError::Persistence(e) => e.into(),
            ArchivalError::Client(e) => e.into(),
            ArchivalError::Media(e) => CoreError::Other(e.to_string()),
        }
    }
}

impl From<ForwarderError> for CoreError {
    fn from(error: ForwarderError) -> Self {
        match error {
            ForwarderError::Persistence(e) => e.into(),
            ForwarderError::Client(e) => e.into(),
            other => CoreError::Other(other.to_string()),
        }
    }
}

impl From<DiscoveryError> for CoreError {
    fn from(error: DiscoveryError) -> Self {
        match error {
            DiscoveryError::Persistence(e) => e.into(),
            DiscoveryError::Client(e) => e.into(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(error: serde_json::Error) -> Self {
        CoreError::Configuration(error.to_string())
    }
}

impl From<std::io::Error> for CoreError {
    fn from(error: std::io::Error) -> Self {
        CoreError::Configuration(error.to_string())
    }
}
