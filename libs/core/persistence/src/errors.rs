// [libs/core/persistence/src/errors.rs]
//! Error catalog for the persistence layer: `StorageUnavailable`,
//! `ConstraintViolation`, `Conflict`, `BusyTimeout`, `Migration`,
//! `Integrity`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("busy timeout after {attempts} attempts")]
    BusyTimeout { attempts: u32 },

    #[error("schema migration failed: {0}")]
    Migration(String),

    #[error("integrity violation: {0}")]
    Integrity(String),

    #[error("record not found")]
    NotFound,

    #[error("data mapping error: {0}")]
    Mapping(String),
}

impl From<libsql::Error> for PersistenceError {
    fn from(source: libsql::Error) -> Self {
        let message = source.to_string();
        if message.contains("UNIQUE constraint") || message.contains("constraint failed") {
            PersistenceError::ConstraintViolation(message)
        } else if message.contains("database is locked") || message.contains("SQLITE_BUSY") {
            PersistenceError::BusyTimeout { attempts: 0 }
        } else {
            PersistenceError::StorageUnavailable(message)
        }
    }
}
