// [libs/domain/discovery/src/pipeline.rs]
//! The Discovery Crawler: bounded breadth-first expansion of a seed
//! set into a directed graph of observed references. Candidates
//! within a level are ordered by
//! `scoring::score`; the crawler never begins expanding level `d+1`
//! until every entity in level `d` has been processed, so the BFS
//! layer ordering invariant holds regardless of how scoring orders
//! candidates within a level.

use crate::errors::DiscoveryError;
use crate::scan;
use crate::scoring::{self, Candidate, ScoredCandidate};
use async_trait::async_trait;
use chrono::Utc;
use spectra_credentials::AccountHandle;
use spectra_domain_models::{AccessRecord, DiscoveryJob, DiscoveryOptions, Entity, EntityAccessHash, EntityKind};
use spectra_governor::OpClass;
use spectra_persistence::{DiscoveryEdge, DiscoveryJobRepository, KeyedLockTable, Repositories};
use spectra_scheduler::{JobQueue, Runner, StepOutcome};
use spectra_telegram_client::{ClientError, HistoryPage, ResolvedEntity, TelegramClient};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{info, instrument, warn};

pub const OP_CLASS: OpClass = OpClass::Discovery;

pub struct DiscoveryCrawler {
    repositories: Repositories,
    entity_locks: KeyedLockTable,
    client: std::sync::Arc<dyn TelegramClient>,
}

#[derive(Debug, Default)]
pub struct DiscoverySummary {
    pub entities_visited: u32,
    pub edges_recorded: u32,
    pub max_depth_reached: u32,
}

impl DiscoveryCrawler {
    pub fn new(repositories: Repositories, entity_locks: KeyedLockTable, client: std::sync::Arc<dyn TelegramClient>) -> Self {
        DiscoveryCrawler { repositories, entity_locks, client }
    }

    #[instrument(skip(self, job, account), fields(job_id = job.id))]
    async fn run_job(&self, job: &DiscoveryJob, account: &AccountHandle) -> Result<DiscoverySummary, DiscoveryError> {
        let mut summary = DiscoverySummary::default();
        let mut inbound_counts: HashMap<String, u32> = HashMap::new();

        let mut current_level = Vec::new();
        for &seed in &job.seeds {
            if let Ok(resolved) = self.resolve_for_account(account, seed).await {
                current_level.push(resolved);
            }
        }

        let mut depth = 0u32;
        while !current_level.is_empty() && depth <= job.options.max_depth {
            let mut contributed: Vec<ScoredCandidate> = Vec::new();

            for resolved in &current_level {
                if self.repositories.entities.is_visited(resolved.entity_id).await? && depth > 0 {
                    continue;
                }

                let _guard = self.entity_locks.lock(resolved.entity_id).await;
                self.commit_entity(account, resolved, depth).await?;
                summary.entities_visited += 1;
                summary.max_depth_reached = summary.max_depth_reached.max(depth);

                if job.options.include_public && resolved.kind != EntityKind::Chat {
                    if let Err(error) = self.client.join(account, resolved).await {
                        warn!(entity_id = resolved.entity_id, %error, "best-effort join failed during discovery");
                    }
                }

                if depth < job.options.max_depth {
                    let local = self.scan_references(account, resolved, &job.options, &mut inbound_counts).await?;
                    contributed.extend(scoring::top_n(local, job.options.per_level_cap));
                }
            }

            current_level = self.resolve_next_level(account, contributed, depth, &mut summary).await?;
            depth += 1;
        }

        info!(job_id = job.id, entities_visited = summary.entities_visited, edges_recorded = summary.edges_recorded, "discovery run complete");
        Ok(summary)
    }

    async fn commit_entity(&self, account: &AccountHandle, resolved: &ResolvedEntity, depth: u32) -> Result<(), DiscoveryError> {
        let now = Utc::now();
        self.repositories
            .access_records
            .record(&AccessRecord { account_id: account.account_id, entity_id: resolved.entity_id, access_hash: resolved.access_hash, last_seen_at: now })
            .await?;
        let existing_depth = self.repositories.entities.get_by_id(resolved.entity_id).await?.map(|e| e.discovery_depth);
        self.repositories
            .entities
            .upsert(&Entity {
                id: resolved.entity_id,
                title: resolved.title.clone(),
                kind: resolved.kind,
                first_seen_at: now,
                last_seen_at: now,
                discovery_depth: existing_depth.unwrap_or(depth).min(depth),
                priority_score: 0.0,
            })
            .await?;
        Ok(())
    }

    async fn scan_references(
        &self,
        account: &AccountHandle,
        resolved: &ResolvedEntity,
        options: &DiscoveryOptions,
        inbound_counts: &mut HashMap<String, u32>,
    ) -> Result<Vec<ScoredCandidate>, DiscoveryError> {
        let page = HistoryPage { after_message_id: None, limit: options.max_messages, topic_id: None };
        let messages = self.client.history_page(account, resolved, page).await?;

        let mut seen_this_entity = HashSet::new();
        let mut candidates = Vec::new();
        for message in &messages {
            let Some(text) = &message.text else { continue };
            for reference in scan::extract_references(text) {
                if !seen_this_entity.insert(reference.handle.clone()) {
                    continue;
                }
                let count = inbound_counts.entry(reference.handle.clone()).or_insert(0);
                *count += 1;
                candidates.push(ScoredCandidate::new(
                    Candidate {
                        reference: reference.handle.clone(),
                        source_entity_id: resolved.entity_id,
                        depth: 0,
                        inbound_refs: *count,
                        has_invite_link: reference.has_invite_link,
                        title_hint: None,
                    },
                    &options.keywords,
                ));
            }
        }
        Ok(candidates)
    }

    /// Resolves every surviving candidate handle from level `depth`
    /// into a concrete entity, records the discovery edge that
    /// produced it, and returns the resolved, not-yet-visited set that
    /// becomes level `depth + 1`.
    async fn resolve_next_level(&self, account: &AccountHandle, contributed: Vec<ScoredCandidate>, depth: u32, summary: &mut DiscoverySummary) -> Result<Vec<ResolvedEntity>, DiscoveryError> {
        let mut next_level = Vec::new();
        let mut seen_handles = HashSet::new();

        for scored in contributed {
            if !seen_handles.insert(scored.candidate.reference.clone()) {
                continue;
            }
            let reference = format!("@{}", scored.candidate.reference);
            let resolved = match self.client.resolve_entity(account, &reference).await {
                Ok(resolved) => resolved,
                Err(_) => continue,
            };

            self.repositories
                .discovery_edges
                .record(&DiscoveryEdge {
                    source_entity_id: scored.candidate.source_entity_id,
                    target_entity_id: resolved.entity_id,
                    observed_at: Utc::now(),
                    context: if scored.candidate.has_invite_link { "invite_link".to_string() } else { "mention".to_string() },
                })
                .await?;
            summary.edges_recorded += 1;

            if !self.repositories.entities.is_visited(resolved.entity_id).await? {
                next_level.push(resolved);
            }
        }

        let _ = depth;
        Ok(next_level)
    }

    /// Cached-access-hash-first entity resolution, the same rule the
    /// Archival and Forwarder pipelines apply.
    async fn resolve_for_account(&self, account: &AccountHandle, entity_id: i64) -> Result<ResolvedEntity, DiscoveryError> {
        if let Some(access_hash) = self.repositories.entities.get_access_hash(account.account_id, entity_id).await? {
            if let Some(entity) = self.repositories.entities.get_by_id(entity_id).await? {
                return Ok(ResolvedEntity { entity_id, access_hash, title: entity.title, kind: entity.kind });
            }
        }

        let resolved = self.client.resolve_entity(account, &format!("entity:{entity_id}")).await?;
        self.repositories
            .entities
            .upsert_access_hash(&EntityAccessHash { account_id: account.account_id, entity_id: resolved.entity_id, access_hash: resolved.access_hash, learned_at: Utc::now() })
            .await?;
        Ok(resolved)
    }
}

#[async_trait]
impl Runner<DiscoveryJobRepository> for DiscoveryCrawler {
    async fn run(&self, job: DiscoveryJob, account: AccountHandle) -> StepOutcome {
        match self.run_job(&job, &account).await {
            Ok(_summary) => StepOutcome::Completed,
            Err(error) => classify(error),
        }
    }
}

fn classify(error: DiscoveryError) -> StepOutcome {
    match error {
        DiscoveryError::Client(ClientError::FloodWait(delay)) => StepOutcome::Retry { cause: "flood wait".to_string(), after: delay },
        DiscoveryError::Client(ClientError::Auth) => StepOutcome::AuthFailure { cause: "authentication failed or was revoked".to_string() },
        DiscoveryError::Client(ClientError::Cancelled) => StepOutcome::Cancelled,
        other => StepOutcome::Retry { cause: other.to_string(), after: Duration::from_secs(30) },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectra_domain_models::{JobStatus, MessageKind};
    use spectra_persistence::Store;
    use spectra_telegram_client::{RemoteMessage, SimulatedTelegramClient};
    use std::sync::Arc;

    fn account() -> AccountHandle {
        AccountHandle { account_id: 1, session_name: "acct-1".into() }
    }

    async fn crawler_with_store() -> (DiscoveryCrawler, Arc<SimulatedTelegramClient>) {
        let store = Store::connect(":memory:", None).await.unwrap();
        let repositories = Repositories::new(store.clone());
        let client = Arc::new(SimulatedTelegramClient::new());
        let crawler = DiscoveryCrawler::new(repositories, store.checkpoint_locks.clone(), client.clone());
        (crawler, client)
    }

    fn remote_with_text(id: i64, text: &str) -> RemoteMessage {
        RemoteMessage { message_id: id, sender_id: Some(1), kind: MessageKind::Text, date: Utc::now(), edit_date: None, text: Some(text.to_string()), reply_to: None, media: None, caption_entities: Vec::new() }
    }

    fn job(seeds: Vec<i64>, options: DiscoveryOptions) -> DiscoveryJob {
        DiscoveryJob { id: 1, seeds, options, status: JobStatus::Running, attempts: 0, cause: None, pinned_account_id: None }
    }

    #[tokio::test]
    async fn expands_one_level_from_a_seed_reference() {
        let (crawler, client) = crawler_with_store().await;
        client.seed_entity("entity:1", ResolvedEntity { entity_id: 1, access_hash: 1, title: "Seed".into(), kind: EntityKind::Channel });
        client.seed_entity("@childchannel", ResolvedEntity { entity_id: 2, access_hash: 2, title: "Child".into(), kind: EntityKind::Channel });
        client.seed_backlog(1, vec![remote_with_text(1, "join t.me/childchannel now")]);

        let options = DiscoveryOptions { max_messages: 10, max_depth: 1, per_level_cap: 5, include_private: false, include_public: false, keywords: Vec::new() };
        let j = job(vec![1], options);

        let summary = crawler.run_job(&j, &account()).await.unwrap();
        assert_eq!(summary.entities_visited, 2);
        assert_eq!(summary.edges_recorded, 1);

        let edges = crawler.repositories.discovery_edges.list_outbound(1).await.unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].target_entity_id, 2);
    }

    #[tokio::test]
    async fn respects_max_depth_bound() {
        let (crawler, client) = crawler_with_store().await;
        client.seed_entity("entity:1", ResolvedEntity { entity_id: 1, access_hash: 1, title: "Seed".into(), kind: EntityKind::Channel });
        client.seed_backlog(1, vec![remote_with_text(1, "see @nope")]);

        let options = DiscoveryOptions { max_messages: 10, max_depth: 0, per_level_cap: 5, include_private: false, include_public: false, keywords: Vec::new() };
        let j = job(vec![1], options);

        let summary = crawler.run_job(&j, &account()).await.unwrap();
        assert_eq!(summary.entities_visited, 1);
        assert_eq!(summary.edges_recorded, 0);
    }

    #[tokio::test]
    async fn flood_wait_classifies_as_retry() {
        let (crawler, client) = crawler_with_store().await;
        client.seed_entity("entity:9", ResolvedEntity { entity_id: 9, access_hash: 1, title: "C".into(), kind: EntityKind::Channel });
        client.inject_flood_wait(Duration::from_secs(5));

        let options = DiscoveryOptions { max_messages: 10, max_depth: 1, per_level_cap: 5, include_private: false, include_public: false, keywords: Vec::new() };
        let j = job(vec![9], options);

        let outcome = Runner::run(&crawler, j, account()).await;
        assert!(matches!(outcome, StepOutcome::Retry { .. }));
    }
}
