// [libs/core/credentials/src/errors.rs]
//! Error catalog for the Credential & Session Registry: `Unknown
//! account`, `AlreadyLeased`, `Banned`, plus the vault and file-system
//! faults the session-sealing path can raise.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("unknown account: {0}")]
    UnknownAccount(String),

    #[error("account {0} already leased")]
    AlreadyLeased(String),

    #[error("account {0} is banned")]
    Banned(String),

    #[error("session vault operation failed")]
    VaultFault,

    #[error("session file i/o error: {0}")]
    Io(String),

    #[error("session serialization error: {0}")]
    Serialization(String),
}
