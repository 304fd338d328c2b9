// [libs/infra/telegram-client/src/errors.rs]
//! `ClientError`: the error kinds a concrete client implementation can
//! surface to the pipelines — `Auth`, `FloodWait(Δ)`, `EntityAccess`,
//! `NetworkTimeout`, `Protocol`, `Cancelled`. Grounded on the source's
//! `BlockchainNetworkError`:
//! a small, closed enum distinguishing connectivity faults from
//! provider/protocol rejections, extended here with the flood-wait
//! signal the Governor consumes directly.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("authentication failed or was revoked")]
    Auth,

    #[error("flood wait: retry after {0:?}")]
    FloodWait(Duration),

    #[error("leased account lacks access to the entity")]
    EntityAccess,

    #[error("network timeout")]
    NetworkTimeout,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("operation cancelled")]
    Cancelled,
}
