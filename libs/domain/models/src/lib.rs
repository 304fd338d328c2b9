//! Shared domain entities and DTOs for the SPECTRA core — the single
//! source of truth consumed by every persistence, scheduling and
//! pipeline crate in the workspace.

pub mod account;
pub mod proxy;
pub mod entity;
pub mod message;
pub mod media;
pub mod checkpoint;
pub mod fingerprint;
pub mod jobs;
pub mod access_record;
pub mod config;

pub use account::{Account, AccountHealth, AccountImport};
pub use proxy::{Proxy, ProxyTransport};
pub use entity::{Entity, EntityAccessHash, EntityKind};
pub use message::{canonical_message_checksum, Message, MessageKind};
pub use media::{media_relative_path, MediaObject, MediaSidecar, MediaSidecarSource};
pub use checkpoint::Checkpoint;
pub use fingerprint::{canonical_fingerprint_sha256, phash_hamming_distance, CaptionEntity, ForwardFingerprint};
pub use jobs::{
    ArchiveJob, ArchiveOptions, DiscoveryJob, DiscoveryOptions, ForwardFlags, ForwardJob, ForwardMode, GroupingStrategy,
    InvitationState, InvitationTask, JobStatus,
};
pub use access_record::AccessRecord;
pub use config::{
    AccountConfigEntry, AccountRotationConfig, ArchiveConfig, ConfigProxyType, ConfigWarning, DbConfig, DeduplicationConfig,
    DiscoveryConfig, ForwardingConfig, InvitationDelaysConfig, LoggingConfig, NearDuplicateThresholds, ParallelConfig, ProxyConfig,
    RateLimitConfig, RotationMode, SpectraConfig, load_config,
};
