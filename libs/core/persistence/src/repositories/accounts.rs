// [libs/core/persistence/src/repositories/accounts.rs]
//! Account repository: import, listing, and the lease-bookkeeping
//! writes the Scheduler issues after binding a job to an account. The
//! Scheduler itself picks *which* leaseable account to use (round-robin
//! / smart / pinned) — this repository only answers "which accounts
//! are currently leaseable" and records the outcome.

use crate::errors::PersistenceError;
use crate::store::Store;
use chrono::{DateTime, Utc};
use libsql::{params, Row};
use spectra_domain_models::{Account, AccountHealth, AccountImport};
use tracing::{info, instrument, warn};

#[derive(Clone)]
pub struct AccountRepository {
    store: Store,
}

impl AccountRepository {
    pub fn new(store: Store) -> Self {
        AccountRepository { store }
    }

    #[instrument(skip(self, import), fields(session_name = %import.session_name))]
    pub async fn import(&self, import: AccountImport) -> Result<Account, PersistenceError> {
        let connection = self.store.connection()?;
        connection
            .execute(
                r#"
                INSERT INTO accounts (session_name, api_id, api_hash, phone_number, password, health)
                VALUES (?1, ?2, ?3, ?4, ?5, 'active')
                ON CONFLICT(session_name) DO UPDATE SET
                    api_id = excluded.api_id,
                    api_hash = excluded.api_hash,
                    phone_number = excluded.phone_number,
                    password = excluded.password
                "#,
                params![
                    import.session_name.clone(),
                    import.api_id,
                    import.api_hash,
                    import.phone_number,
                    import.password
                ],
            )
            .await?;

        info!(session_name = %import.session_name, "account imported");
        self.get_by_session_name(&import.session_name)
            .await?
            .ok_or(PersistenceError::NotFound)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Account>, PersistenceError> {
        let connection = self.store.connection()?;
        let mut rows = connection.query(SELECT_COLUMNS_BY_ID, params![id]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(map_row(row)?)),
            None => Ok(None),
        }
    }

    pub async fn get_by_session_name(&self, session_name: &str) -> Result<Option<Account>, PersistenceError> {
        let connection = self.store.connection()?;
        let mut rows = connection.query(SELECT_COLUMNS_BY_SESSION, params![session_name]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(map_row(row)?)),
            None => Ok(None),
        }
    }

    pub async fn list_all(&self) -> Result<Vec<Account>, PersistenceError> {
        let connection = self.store.connection()?;
        let mut rows = connection.query(SELECT_COLUMNS_ALL, ()).await?;
        let mut accounts = Vec::new();
        while let Some(row) = rows.next().await? {
            accounts.push(map_row(row)?);
        }
        Ok(accounts)
    }

    /// Accounts the Scheduler may consider for a lease at `now` — health
    /// not `banned`, and not in cooldown. Smart/round-robin/pinned
    /// selection is layered on top of this by the caller.
    pub async fn list_leaseable(&self, now: DateTime<Utc>) -> Result<Vec<Account>, PersistenceError> {
        let connection = self.store.connection()?;
        let mut rows = connection
            .query(
                r#"
                SELECT id, session_name, api_id, api_hash, phone_number, password, proxy_id,
                       usage_counter, last_used_at, cooldown_until, health
                FROM accounts
                WHERE health != 'banned' AND (cooldown_until IS NULL OR cooldown_until <= ?1)
                "#,
                params![now.to_rfc3339()],
            )
            .await?;
        let mut accounts = Vec::new();
        while let Some(row) = rows.next().await? {
            accounts.push(map_row(row)?);
        }
        Ok(accounts)
    }

    /// Records a successful lease acquisition: bumps the usage counter
    /// and stamps `last_used_at`.
    #[instrument(skip(self))]
    pub async fn record_lease(&self, id: i64, now: DateTime<Utc>) -> Result<(), PersistenceError> {
        let connection = self.store.connection()?;
        let affected = connection
            .execute(
                "UPDATE accounts SET usage_counter = usage_counter + 1, last_used_at = ?1 WHERE id = ?2",
                params![now.to_rfc3339(), id],
            )
            .await?;
        if affected == 0 {
            return Err(PersistenceError::NotFound);
        }
        Ok(())
    }

    /// Applies an account health transition. `cooldown_until` is set
    /// only for the `Cooldown` and `FloodWaiting` states; other
    /// transitions clear it.
    #[instrument(skip(self))]
    pub async fn set_health(&self, id: i64, health: AccountHealth, cooldown_until: Option<DateTime<Utc>>) -> Result<(), PersistenceError> {
        let connection = self.store.connection()?;
        let affected = connection
            .execute(
                "UPDATE accounts SET health = ?1, cooldown_until = ?2 WHERE id = ?3",
                params![health.as_str(), cooldown_until.map(|t| t.to_rfc3339()), id],
            )
            .await?;
        if affected == 0 {
            return Err(PersistenceError::NotFound);
        }
        if health == AccountHealth::Banned {
            warn!(account_id = id, "account marked banned");
        }
        Ok(())
    }

    /// Binds (or unbinds, with `None`) the account's proxy.
    #[instrument(skip(self))]
    pub async fn set_proxy(&self, id: i64, proxy_id: Option<i64>) -> Result<(), PersistenceError> {
        let connection = self.store.connection()?;
        let affected = connection.execute("UPDATE accounts SET proxy_id = ?1 WHERE id = ?2", params![proxy_id, id]).await?;
        if affected == 0 {
            return Err(PersistenceError::NotFound);
        }
        Ok(())
    }

    /// Operator-only: clears a terminal `banned` state back to
    /// `active`. Nothing automated may do this — only explicit operator
    /// action.
    #[instrument(skip(self))]
    pub async fn reset(&self, id: i64) -> Result<(), PersistenceError> {
        let connection = self.store.connection()?;
        let affected = connection
            .execute(
                "UPDATE accounts SET health = 'active', cooldown_until = NULL WHERE id = ?1",
                params![id],
            )
            .await?;
        if affected == 0 {
            return Err(PersistenceError::NotFound);
        }
        info!(account_id = id, "account reset by operator");
        Ok(())
    }
}

const SELECT_COLUMNS_ALL: &str = r#"
    SELECT id, session_name, api_id, api_hash, phone_number, password, proxy_id,
           usage_counter, last_used_at, cooldown_until, health
    FROM accounts
    ORDER BY id
"#;

const SELECT_COLUMNS_BY_ID: &str = r#"
    SELECT id, session_name, api_id, api_hash, phone_number, password, proxy_id,
           usage_counter, last_used_at, cooldown_until, health
    FROM accounts WHERE id = ?1
"#;

const SELECT_COLUMNS_BY_SESSION: &str = r#"
    SELECT id, session_name, api_id, api_hash, phone_number, password, proxy_id,
           usage_counter, last_used_at, cooldown_until, health
    FROM accounts WHERE session_name = ?1
"#;

fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value.and_then(|ts| DateTime::parse_from_rfc3339(&ts).ok()).map(|dt| dt.with_timezone(&Utc))
}

fn map_row(row: Row) -> Result<Account, PersistenceError> {
    let health_raw: String = row.get(10).map_err(|e| PersistenceError::Mapping(e.to_string()))?;
    Ok(Account {
        id: row.get(0).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        session_name: row.get(1).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        api_id: row.get(2).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        api_hash: row.get(3).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        phone_number: row.get(4).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        password: row.get(5).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        proxy_id: row.get(6).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        usage_counter: row.get::<i64>(7).map_err(|e| PersistenceError::Mapping(e.to_string()))? as u64,
        last_used_at: parse_timestamp(row.get(8).map_err(|e| PersistenceError::Mapping(e.to_string()))?),
        cooldown_until: parse_timestamp(row.get(9).map_err(|e| PersistenceError::Mapping(e.to_string()))?),
        health: AccountHealth::parse(&health_raw),
    })
}
