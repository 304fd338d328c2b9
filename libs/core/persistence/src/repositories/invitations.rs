// [libs/core/persistence/src/repositories/invitations.rs]
//! InvitationTask repository backing the Invitation Sub-Pipeline.
//! Table-backed rather than reading the `invitation_state.json`
//! sidecar directly — both persist the same
//! `(entity, account) -> {pending, succeeded, failed, skipped}` map,
//! but a table gives the Scheduler an indexed "what's eligible now"
//! query instead of a full-file parse on every poll. The orchestrator
//! additionally mirrors this table to `invitation_state.json` on
//! change so the documented sidecar format stays inspectable.

use crate::errors::PersistenceError;
use crate::store::Store;
use chrono::{DateTime, Utc};
use libsql::{params, Row};
use spectra_domain_models::{InvitationState, InvitationTask};
use tracing::instrument;

#[derive(Clone)]
pub struct InvitationRepository {
    store: Store,
}

const RETRY_CAP: u32 = 3;

impl InvitationRepository {
    pub fn new(store: Store) -> Self {
        InvitationRepository { store }
    }

    #[instrument(skip(self))]
    pub async fn enqueue(&self, destination_entity_id: i64, invitee_account_id: i64, now: DateTime<Utc>) -> Result<(), PersistenceError> {
        let connection = self.store.connection()?;
        connection
            .execute(
                r#"
                INSERT INTO invitation_tasks (destination_entity_id, invitee_account_id, attempts, next_eligible_at, state)
                VALUES (?1, ?2, 0, ?3, 'pending')
                ON CONFLICT(destination_entity_id, invitee_account_id) DO NOTHING
                "#,
                params![destination_entity_id, invitee_account_id, now.to_rfc3339()],
            )
            .await?;
        Ok(())
    }

    /// Tasks eligible to run now: `pending`, under the retry cap, and
    /// past `next_eligible_at`.
    pub async fn list_eligible(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<InvitationTask>, PersistenceError> {
        let connection = self.store.connection()?;
        let mut rows = connection
            .query(
                r#"
                SELECT destination_entity_id, invitee_account_id, attempts, next_eligible_at, state
                FROM invitation_tasks
                WHERE state = 'pending' AND attempts < ?1 AND next_eligible_at <= ?2
                ORDER BY next_eligible_at ASC
                LIMIT ?3
                "#,
                params![RETRY_CAP, now.to_rfc3339(), limit],
            )
            .await?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next().await? {
            tasks.push(map_row(row)?);
        }
        Ok(tasks)
    }

    #[instrument(skip(self))]
    pub async fn record_outcome(
        &self,
        destination_entity_id: i64,
        invitee_account_id: i64,
        state: InvitationState,
        next_eligible_at: Option<DateTime<Utc>>,
    ) -> Result<(), PersistenceError> {
        let connection = self.store.connection()?;
        let state_str = state_str(state);

        if state == InvitationState::Failed {
            // Bump attempts and only flip to terminal failed once the retry cap is hit.
            let affected = connection
                .execute(
                    r#"
                    UPDATE invitation_tasks
                    SET attempts = attempts + 1,
                        next_eligible_at = ?1,
                        state = CASE WHEN attempts + 1 >= ?2 THEN 'failed' ELSE 'pending' END
                    WHERE destination_entity_id = ?3 AND invitee_account_id = ?4
                    "#,
                    params![
                        next_eligible_at.unwrap_or_else(Utc::now).to_rfc3339(),
                        RETRY_CAP,
                        destination_entity_id,
                        invitee_account_id
                    ],
                )
                .await?;
            if affected == 0 {
                return Err(PersistenceError::NotFound);
            }
            return Ok(());
        }

        let affected = connection
            .execute(
                "UPDATE invitation_tasks SET state = ?1 WHERE destination_entity_id = ?2 AND invitee_account_id = ?3",
                params![state_str, destination_entity_id, invitee_account_id],
            )
            .await?;
        if affected == 0 {
            return Err(PersistenceError::NotFound);
        }
        Ok(())
    }

    pub async fn list_for_destination(&self, destination_entity_id: i64) -> Result<Vec<InvitationTask>, PersistenceError> {
        let connection = self.store.connection()?;
        let mut rows = connection
            .query(
                "SELECT destination_entity_id, invitee_account_id, attempts, next_eligible_at, state FROM invitation_tasks WHERE destination_entity_id = ?1",
                params![destination_entity_id],
            )
            .await?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next().await? {
            tasks.push(map_row(row)?);
        }
        Ok(tasks)
    }

    /// Every task across every destination, for the orchestrator's
    /// `invitation_state.json` mirror.
    pub async fn list_all(&self) -> Result<Vec<InvitationTask>, PersistenceError> {
        let connection = self.store.connection()?;
        let mut rows = connection
            .query("SELECT destination_entity_id, invitee_account_id, attempts, next_eligible_at, state FROM invitation_tasks", ())
            .await?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next().await? {
            tasks.push(map_row(row)?);
        }
        Ok(tasks)
    }
}

fn state_str(state: InvitationState) -> &'static str {
    match state {
        InvitationState::Pending => "pending",
        InvitationState::Succeeded => "succeeded",
        InvitationState::Failed => "failed",
        InvitationState::Skipped => "skipped",
    }
}

fn parse_state(raw: &str) -> InvitationState {
    match raw {
        "succeeded" => InvitationState::Succeeded,
        "failed" => InvitationState::Failed,
        "skipped" => InvitationState::Skipped,
        _ => InvitationState::Pending,
    }
}

fn map_row(row: Row) -> Result<InvitationTask, PersistenceError> {
    let state_raw: String = row.get(4).map_err(|e| PersistenceError::Mapping(e.to_string()))?;
    let next_eligible: String = row.get(3).map_err(|e| PersistenceError::Mapping(e.to_string()))?;
    Ok(InvitationTask {
        destination_entity_id: row.get(0).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        invitee_account_id: row.get(1).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        attempts: row.get::<i64>(2).map_err(|e| PersistenceError::Mapping(e.to_string()))? as u32,
        next_eligible_at: DateTime::parse_from_rfc3339(&next_eligible).map(|dt| dt.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now()),
        state: parse_state(&state_raw),
    })
}
