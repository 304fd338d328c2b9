// [apps/spectra-orchestrator/src/bootstrap.rs]
//! Wires the persistence store, credential registry, governor,
//! scheduler and the three pipelines behind one `Bootstrap` handle.
//! Nothing here talks to the operator surface directly —
//! `operations.rs` does that against the handles this module builds.

use crate::errors::CoreError;
use spectra_archival::ArchivalPipeline;
use spectra_credentials::Registry;
use spectra_discovery::DiscoveryCrawler;
use spectra_domain_models::{AccountImport, AccountRotationConfig, RotationMode, SpectraConfig};
use spectra_forwarder::{ForwarderPipeline, InvitationDispatcher};
use spectra_governor::{Governor, GovernorConfig};
use spectra_persistence::{ArchiveJobRepository, DiscoveryJobRepository, ForwardJobRepository, Repositories, Store};
use spectra_scheduler::{AccountSelector, LeasePolicy, QueueBinding, SchedulerConfig, WorkerPool};
use spectra_telegram_client::{SimulatedTelegramClient, TelegramClient};
use std::path::PathBuf;
use std::sync::Arc;

/// The composition root's live handle set. `client` is injected rather
/// than constructed here: the wire protocol is an opaque external
/// dependency the core never picks a concrete implementation for (see
/// DESIGN.md).
pub struct Bootstrap {
    pub config: SpectraConfig,
    pub store: Store,
    pub repositories: Repositories,
    pub registry: Registry,
    pub selector: Arc<AccountSelector>,
    pub governor: Arc<Governor>,
    pub client: Arc<dyn TelegramClient>,
    pub media_root: PathBuf,
}

impl Bootstrap {
    pub async fn init(config: SpectraConfig, client: Arc<dyn TelegramClient>) -> Result<Self, CoreError> {
        let store = Store::connect(&config.db.path, None).await?;
        let repositories = Repositories::new(store.clone());
        let registry = Registry::new(repositories.accounts.clone(), None, None);

        for entry in &config.accounts {
            registry
                .import(AccountImport {
                    session_name: entry.session_name.clone(),
                    api_id: entry.api_id,
                    api_hash: entry.api_hash.clone(),
                    phone_number: entry.phone_number.clone(),
                    password: entry.password.clone(),
                    session_bytes_base64: None,
                })
                .await?;
        }

        let selector = Arc::new(AccountSelector::new(registry.clone()));
        let governor = Arc::new(Governor::new(governor_config(&config.account_rotation)));
        let media_root = PathBuf::from("media");

        Ok(Bootstrap { config, store, repositories, registry, selector, governor, client, media_root })
    }

    pub fn lease_policy(&self) -> LeasePolicy {
        match self.config.account_rotation.mode {
            RotationMode::RoundRobin => LeasePolicy::RoundRobin,
            RotationMode::Smart | RotationMode::Pinned => LeasePolicy::Smart,
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig { worker_count: self.config.parallel.max_workers as usize, ..SchedulerConfig::default() }
    }

    pub fn archival_pipeline(&self) -> ArchivalPipeline {
        ArchivalPipeline::new(self.repositories.clone(), self.store.checkpoint_locks.clone(), self.client.clone(), self.media_root.clone())
    }

    pub fn forwarder_pipeline(&self) -> ForwarderPipeline {
        ForwarderPipeline::new(
            self.repositories.clone(),
            self.store.fingerprint_locks.clone(),
            self.client.clone(),
            self.governor.clone(),
            self.config.deduplication.enable_near_duplicates,
            self.config.near_duplicate_thresholds(),
        )
    }

    pub fn discovery_crawler(&self) -> DiscoveryCrawler {
        DiscoveryCrawler::new(self.repositories.clone(), self.store.checkpoint_locks.clone(), self.client.clone())
    }

    pub fn invitation_dispatcher(&self) -> InvitationDispatcher {
        InvitationDispatcher::new(
            self.repositories.clone(),
            self.client.clone(),
            self.selector.clone(),
            self.governor.clone(),
            self.config.forwarding.invitation_delays.clone(),
        )
    }

    pub fn worker_pool(&self) -> WorkerPool {
        WorkerPool::new(self.scheduler_config(), self.selector.clone(), self.governor.clone())
    }

    pub fn archival_binding(&self) -> QueueBinding<ArchiveJobRepository> {
        QueueBinding { queue: self.repositories.archive_jobs.clone(), runner: Arc::new(self.archival_pipeline()), op_class: spectra_archival::OP_CLASS }
    }

    pub fn forward_binding(&self) -> QueueBinding<ForwardJobRepository> {
        QueueBinding { queue: self.repositories.forward_jobs.clone(), runner: Arc::new(self.forwarder_pipeline()), op_class: spectra_forwarder::OP_CLASS }
    }

    pub fn discovery_binding(&self) -> QueueBinding<DiscoveryJobRepository> {
        QueueBinding { queue: self.repositories.discovery_jobs.clone(), runner: Arc::new(self.discovery_crawler()), op_class: spectra_discovery::OP_CLASS }
    }
}

fn governor_config(rotation: &AccountRotationConfig) -> GovernorConfig {
    GovernorConfig { backoff_base: std::time::Duration::from_millis((500.0 * rotation.flood_wait_multiplier) as u64), ..GovernorConfig::default() }
}

/// The in-memory `TelegramClient` used when no production wire client
/// is configured — local development and the operator surface's
/// offline smoke path.
pub fn development_client() -> Arc<dyn TelegramClient> {
    Arc::new(SimulatedTelegramClient::new())
}
