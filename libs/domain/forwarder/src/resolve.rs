// [libs/domain/forwarder/src/resolve.rs]
//! Entity resolution for a leased account, reusing a cached access
//! hash when one already exists instead of round-tripping to the
//! client — the same cached-hash-first rule the Archival pipeline
//! applies, needed again here because the Forwarder and Archival
//! crates do not share code across the pipeline boundary.

use crate::errors::ForwarderError;
use chrono::Utc;
use spectra_credentials::AccountHandle;
use spectra_domain_models::{AccessRecord, Entity, EntityAccessHash};
use spectra_persistence::Repositories;
use spectra_telegram_client::{ResolvedEntity, TelegramClient};

pub async fn resolve_for_account(
    repositories: &Repositories,
    client: &dyn TelegramClient,
    account: &AccountHandle,
    entity_id: i64,
) -> Result<ResolvedEntity, ForwarderError> {
    if let Some(access_hash) = repositories.entities.get_access_hash(account.account_id, entity_id).await? {
        if let Some(entity) = repositories.entities.get_by_id(entity_id).await? {
            return Ok(ResolvedEntity { entity_id, access_hash, title: entity.title, kind: entity.kind });
        }
    }

    let resolved = client.resolve_entity(account, &format!("entity:{entity_id}")).await?;
    let now = Utc::now();

    repositories
        .entities
        .upsert_access_hash(&EntityAccessHash { account_id: account.account_id, entity_id: resolved.entity_id, access_hash: resolved.access_hash, learned_at: now })
        .await?;
    repositories
        .access_records
        .record(&AccessRecord { account_id: account.account_id, entity_id: resolved.entity_id, access_hash: resolved.access_hash, last_seen_at: now })
        .await?;
    repositories
        .entities
        .upsert(&Entity { id: resolved.entity_id, title: resolved.title.clone(), kind: resolved.kind, first_seen_at: now, last_seen_at: now, discovery_depth: 0, priority_score: 0.0 })
        .await?;

    Ok(resolved)
}
