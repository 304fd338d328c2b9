// [libs/core/persistence/src/repositories/mod.rs]
//! Repository layer: one struct per aggregate, each wrapping a `Store`
//! handle and exposing async `#[instrument]`-annotated methods.

pub mod access_records;
pub mod accounts;
pub mod checkpoints;
pub mod discovery_edges;
pub mod entities;
pub mod fingerprints;
pub mod integrity;
pub mod invitations;
pub mod jobs;
pub mod media;
pub mod messages;
pub mod proxies;

pub use access_records::AccessRecordRepository;
pub use accounts::AccountRepository;
pub use checkpoints::CheckpointRepository;
pub use discovery_edges::{DiscoveryEdge, DiscoveryEdgeRepository};
pub use entities::EntityRepository;
pub use fingerprints::FingerprintRepository;
pub use integrity::{IntegrityRepository, StoreIntegrityReport};
pub use invitations::InvitationRepository;
pub use jobs::{ArchiveJobRepository, DiscoveryJobRepository, ForwardJobRepository};
pub use media::MediaRepository;
pub use messages::MessageRepository;
pub use proxies::ProxyRepository;
