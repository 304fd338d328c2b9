//! Credential & Session Registry: the authoritative account list,
//! session-byte custody and the account health state machine. Durable
//! account fields live in `spectra_persistence`; session material
//! lives only here, as zeroizing, constant-time-equal buffers.

pub mod errors;
pub mod registry;
pub mod secure_bytes;
pub mod session_file;
pub mod vault;

pub use errors::RegistryError;
pub use registry::{AccountHandle, Registry};
pub use secure_bytes::SecureBytes;
pub use vault::SessionEnvelope;
