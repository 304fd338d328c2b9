// [libs/core/credentials/src/registry.rs]
//! `Registry`: the authoritative account list and in-memory session
//! material. Durable fields (health, cooldown, usage counters) live in
//! `spectra_persistence::AccountRepository`; session bytes never touch
//! that store and are held only as `SecureBytes` in an in-process map,
//! sealed to disk only when a session directory is configured.
//!
//! Leases convey a handle, not ownership: `lease` hands back an
//! `AccountHandle` identifying the account, and callers fetch session
//! bytes separately through `session_bytes`, which never leaves a
//! clone lying around longer than the call needs.

use crate::errors::RegistryError;
use crate::secure_bytes::SecureBytes;
use crate::session_file::{read as read_session_file, write as write_session_file};
use crate::vault::{seal, unseal};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use parking_lot::Mutex;
use spectra_domain_models::{Account, AccountHealth, AccountImport};
use spectra_persistence::AccountRepository;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone)]
pub struct AccountHandle {
    pub account_id: i64,
    pub session_name: String,
}

struct Inner {
    sessions: HashMap<i64, SecureBytes>,
    leased: HashSet<i64>,
}

#[derive(Clone)]
pub struct Registry {
    accounts: AccountRepository,
    inner: Arc<Mutex<Inner>>,
    session_dir: Option<PathBuf>,
    master_passphrase: Option<Arc<String>>,
}

impl Registry {
    pub fn new(accounts: AccountRepository, session_dir: Option<PathBuf>, master_passphrase: Option<String>) -> Self {
        Registry {
            accounts,
            inner: Arc::new(Mutex::new(Inner { sessions: HashMap::new(), leased: HashSet::new() })),
            session_dir,
            master_passphrase: master_passphrase.map(Arc::new),
        }
    }

    /// Imports or updates an account descriptor. A blank
    /// `session_bytes_base64` never overwrites a previously-imported
    /// session: only a non-empty payload replaces the in-memory
    /// material.
    #[instrument(skip(self, import), fields(session_name = %import.session_name))]
    pub async fn import(&self, import: AccountImport) -> Result<Account, RegistryError> {
        let session_bytes = import.session_bytes_base64.clone();
        let account = self
            .accounts
            .import(import)
            .await
            .map_err(|e| RegistryError::Io(e.to_string()))?;

        if let Some(encoded) = session_bytes {
            if !encoded.is_empty() {
                let decoded = BASE64.decode(encoded).map_err(|_| RegistryError::VaultFault)?;
                self.store_session_bytes(account.id, SecureBytes::new(decoded))?;
            }
        }

        info!(account_id = account.id, "account imported");
        Ok(account)
    }

    fn store_session_bytes(&self, account_id: i64, bytes: SecureBytes) -> Result<(), RegistryError> {
        if let (Some(dir), Some(passphrase)) = (&self.session_dir, &self.master_passphrase) {
            let salt: [u8; 16] = {
                let mut s = [0u8; 16];
                s.copy_from_slice(&sha2_first16(account_id));
                s
            };
            let envelope = seal(&bytes, passphrase, &salt)?;
            write_session_file(&dir.join(format!("{account_id}.session.json")), &envelope)?;
        }
        self.inner.lock().sessions.insert(account_id, bytes);
        Ok(())
    }

    /// Loads a sealed session from disk into memory, e.g. at startup
    /// before any lease is issued for that account.
    pub fn hydrate_from_disk(&self, account_id: i64) -> Result<(), RegistryError> {
        let Some(dir) = &self.session_dir else { return Ok(()) };
        let Some(passphrase) = &self.master_passphrase else { return Ok(()) };
        let path = dir.join(format!("{account_id}.session.json"));
        if !path.exists() {
            return Ok(());
        }
        let envelope = read_session_file(&path)?;
        let bytes = unseal(&envelope, passphrase)?;
        self.inner.lock().sessions.insert(account_id, bytes);
        Ok(())
    }

    /// Leases an account for exclusive use by the Scheduler. Fails if
    /// the account is already leased, banned, or unknown.
    #[instrument(skip(self))]
    pub async fn lease(&self, session_name: &str, now: chrono::DateTime<chrono::Utc>) -> Result<AccountHandle, RegistryError> {
        let account = self
            .accounts
            .get_by_session_name(session_name)
            .await
            .map_err(|e| RegistryError::Io(e.to_string()))?
            .ok_or_else(|| RegistryError::UnknownAccount(session_name.to_string()))?;

        if account.health == AccountHealth::Banned {
            return Err(RegistryError::Banned(session_name.to_string()));
        }

        let already_leased = {
            let mut inner = self.inner.lock();
            if inner.leased.contains(&account.id) {
                true
            } else {
                inner.leased.insert(account.id);
                false
            }
        };
        if already_leased {
            return Err(RegistryError::AlreadyLeased(session_name.to_string()));
        }

        self.accounts.record_lease(account.id, now).await.map_err(|e| RegistryError::Io(e.to_string()))?;
        Ok(AccountHandle { account_id: account.id, session_name: account.session_name })
    }

    pub fn release(&self, handle: &AccountHandle) {
        self.inner.lock().leased.remove(&handle.account_id);
    }

    /// Session bytes for a leased account. Returns a clone — the
    /// registry remains the sole owner of the canonical buffer, which
    /// zeroizes independently on its own drop.
    pub fn session_bytes(&self, account_id: i64) -> Option<SecureBytes> {
        self.inner.lock().sessions.get(&account_id).cloned()
    }

    /// Records a health transition driven by the Governor or a pipeline
    /// failure.
    #[instrument(skip(self))]
    pub async fn record_health(&self, account_id: i64, health: AccountHealth, cooldown_until: Option<chrono::DateTime<chrono::Utc>>) -> Result<(), RegistryError> {
        if health == AccountHealth::Banned {
            warn!(account_id, "account demoted to banned");
        }
        self.accounts.set_health(account_id, health, cooldown_until).await.map_err(|e| RegistryError::Io(e.to_string()))
    }

    pub async fn list(&self) -> Result<Vec<Account>, RegistryError> {
        self.accounts.list_all().await.map_err(|e| RegistryError::Io(e.to_string()))
    }

    pub async fn list_leaseable(&self, now: chrono::DateTime<chrono::Utc>) -> Result<Vec<Account>, RegistryError> {
        self.accounts.list_leaseable(now).await.map_err(|e| RegistryError::Io(e.to_string()))
    }
}

/// Deterministic per-account salt derivation — avoids persisting a
/// second secret alongside the envelope purely to pick the salt back out.
fn sha2_first16(account_id: i64) -> [u8; 16] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(account_id.to_le_bytes());
    let digest = hasher.finalize();
    let mut out = [0u8; 16];
    out.copy_from_slice(&digest[..16]);
    out
}
