// [apps/spectra-orchestrator/src/invitation_state.rs]
//! Mirrors `InvitationRepository` to the documented sidecar file,
//! `invitation_state.json`: `{ "<entity-id>": {
//! "<account-session-name>": {status, attempts, next_after_ts} } }`,
//! atomically replaced on each write (write-to-temp + rename).
//!
//! The table is authoritative — the Scheduler's eligibility query needs
//! an index, which a flat file can't give it (see
//! `InvitationRepository`'s own doc comment) — this file exists purely
//! so the documented format stays inspectable from outside the
//! database.

use crate::errors::CoreError;
use serde::Serialize;
use spectra_domain_models::{InvitationState, InvitationTask};
use spectra_persistence::Repositories;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Serialize)]
struct TaskSnapshot {
    status: &'static str,
    attempts: u32,
    next_after_ts: String,
}

fn status_str(state: InvitationState) -> &'static str {
    match state {
        InvitationState::Pending => "pending",
        InvitationState::Succeeded => "succeeded",
        InvitationState::Failed => "failed",
        InvitationState::Skipped => "skipped",
    }
}

async fn snapshot(repositories: &Repositories) -> Result<BTreeMap<String, BTreeMap<String, TaskSnapshot>>, CoreError> {
    let tasks: Vec<InvitationTask> = repositories.invitations.list_all().await?;
    let mut by_entity: BTreeMap<String, BTreeMap<String, TaskSnapshot>> = BTreeMap::new();

    for task in tasks {
        let session_name = repositories
            .accounts
            .get_by_id(task.invitee_account_id)
            .await?
            .map(|account| account.session_name)
            .unwrap_or_else(|| task.invitee_account_id.to_string());

        by_entity.entry(task.destination_entity_id.to_string()).or_default().insert(
            session_name,
            TaskSnapshot { status: status_str(task.state), attempts: task.attempts, next_after_ts: task.next_eligible_at.to_rfc3339() },
        );
    }

    Ok(by_entity)
}

/// Writes the current invitation state to `path`, replacing it
/// atomically: the snapshot is written to a sibling `.tmp` file first
/// and then renamed over the target, so a reader never observes a
/// partially-written document.
pub async fn write_snapshot(repositories: &Repositories, path: &Path) -> Result<(), CoreError> {
    let document = snapshot(repositories).await?;
    let body = serde_json::to_vec_pretty(&document)?;

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, &body).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use spectra_domain_models::AccountImport;
    use spectra_persistence::Store;
    use tempfile::tempdir;

    async fn repositories() -> Repositories {
        let store = Store::connect(":memory:", None).await.expect("store connects");
        Repositories::new(store)
    }

    #[tokio::test]
    async fn writes_a_nested_map_keyed_by_entity_and_session() {
        let repositories = repositories().await;
        let account = repositories
            .accounts
            .import(AccountImport {
                session_name: "acct-1".into(),
                api_id: 1,
                api_hash: "hash".into(),
                phone_number: "+10000000000".into(),
                password: None,
                session_bytes_base64: None,
            })
            .await
            .expect("import succeeds");
        repositories.invitations.enqueue(42, account.id, Utc::now()).await.expect("enqueue succeeds");

        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("invitation_state.json");
        write_snapshot(&repositories, &path).await.expect("snapshot writes");

        let raw = std::fs::read_to_string(&path).expect("file exists");
        let parsed: serde_json::Value = serde_json::from_str(&raw).expect("valid json");
        assert_eq!(parsed["42"]["acct-1"]["status"], "pending");
        assert_eq!(parsed["42"]["acct-1"]["attempts"], 0);
    }

    #[tokio::test]
    async fn overwrites_the_previous_snapshot_without_leaving_a_tmp_file() {
        let repositories = repositories().await;
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("invitation_state.json");

        write_snapshot(&repositories, &path).await.expect("first snapshot writes");
        write_snapshot(&repositories, &path).await.expect("second snapshot writes");

        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }
}
