//! Persistence layer for SPECTRA: an embedded libSQL store, its schema,
//! and the repository layer every other crate in the workspace reads
//! and writes through. Nothing outside this crate touches SQL
//! directly.

pub mod errors;
pub mod exclusion_lock;
pub mod lock_table;
pub mod repositories;
pub mod schema;
pub mod store;

pub use errors::PersistenceError;
pub use exclusion_lock::ExclusionLock;
pub use lock_table::KeyedLockTable;
pub use schema::SCHEMA_VERSION;
pub use store::Store;

pub use repositories::{
    AccessRecordRepository, AccountRepository, ArchiveJobRepository, CheckpointRepository, DiscoveryEdge, DiscoveryEdgeRepository,
    DiscoveryJobRepository, EntityRepository, FingerprintRepository, ForwardJobRepository, IntegrityRepository, InvitationRepository,
    MediaRepository, MessageRepository, ProxyRepository, StoreIntegrityReport,
};

/// Bundles one instance of every repository behind a `Store` clone.
/// Downstream crates (Scheduler, Archival, Forwarder, Discovery,
/// orchestrator) take a `Repositories` rather than wiring up a dozen
/// repository structs by hand at their own call sites.
#[derive(Clone)]
pub struct Repositories {
    pub accounts: AccountRepository,
    pub proxies: ProxyRepository,
    pub entities: EntityRepository,
    pub messages: MessageRepository,
    pub media: MediaRepository,
    pub checkpoints: CheckpointRepository,
    pub fingerprints: FingerprintRepository,
    pub invitations: InvitationRepository,
    pub access_records: AccessRecordRepository,
    pub discovery_edges: DiscoveryEdgeRepository,
    pub archive_jobs: ArchiveJobRepository,
    pub forward_jobs: ForwardJobRepository,
    pub discovery_jobs: DiscoveryJobRepository,
    pub integrity: IntegrityRepository,
}

impl Repositories {
    pub fn new(store: Store) -> Self {
        Repositories {
            accounts: AccountRepository::new(store.clone()),
            proxies: ProxyRepository::new(store.clone()),
            entities: EntityRepository::new(store.clone()),
            messages: MessageRepository::new(store.clone()),
            media: MediaRepository::new(store.clone()),
            checkpoints: CheckpointRepository::new(store.clone()),
            fingerprints: FingerprintRepository::new(store.clone()),
            invitations: InvitationRepository::new(store.clone()),
            access_records: AccessRecordRepository::new(store.clone()),
            discovery_edges: DiscoveryEdgeRepository::new(store.clone()),
            archive_jobs: ArchiveJobRepository::new(store.clone()),
            forward_jobs: ForwardJobRepository::new(store.clone()),
            discovery_jobs: DiscoveryJobRepository::new(store.clone()),
            integrity: IntegrityRepository::new(store),
        }
    }
}
