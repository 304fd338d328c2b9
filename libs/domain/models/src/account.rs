//! Account domain entity.
//!
//! A session name is the natural key; the numeric primary key is an
//! implementation detail of the persistence layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health state machine an account moves through under governor and
/// operator control.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccountHealth {
    Active,
    Cooldown,
    FloodWaiting,
    Banned,
}

impl AccountHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountHealth::Active => "active",
            AccountHealth::Cooldown => "cooldown",
            AccountHealth::FloodWaiting => "flood_waiting",
            AccountHealth::Banned => "banned",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "cooldown" => AccountHealth::Cooldown,
            "flood_waiting" => AccountHealth::FloodWaiting,
            "banned" => AccountHealth::Banned,
            _ => AccountHealth::Active,
        }
    }
}

/// A Telegram account descriptor. `session_name` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub session_name: String,
    pub api_id: i32,
    pub api_hash: String,
    pub phone_number: String,
    pub password: Option<String>,
    pub proxy_id: Option<i64>,
    pub usage_counter: u64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub health: AccountHealth,
}

impl Account {
    /// True when the account can currently accept a lease, ignoring the
    /// Governor's token-bucket state (that is a separate check — see
    /// `spectra-governor`).
    pub fn is_leaseable(&self, now: DateTime<Utc>) -> bool {
        match self.health {
            AccountHealth::Banned => false,
            AccountHealth::Cooldown | AccountHealth::FloodWaiting => {
                self.cooldown_until.map(|until| now >= until).unwrap_or(false)
            }
            AccountHealth::Active => true,
        }
    }
}

/// Inbound descriptor used by `Registry::Import` — distinguishes "no
/// session yet" from "blank session", so an import never overwrites a
/// good session with an empty one.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountImport {
    pub session_name: String,
    pub api_id: i32,
    pub api_hash: String,
    pub phone_number: String,
    pub password: Option<String>,
    pub session_bytes_base64: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(health: AccountHealth, cooldown_until: Option<DateTime<Utc>>) -> Account {
        Account {
            id: 1,
            session_name: "acct-1".into(),
            api_id: 1,
            api_hash: "hash".into(),
            phone_number: "+10000000000".into(),
            password: None,
            proxy_id: None,
            usage_counter: 0,
            last_used_at: None,
            cooldown_until,
            health,
        }
    }

    #[test]
    fn banned_is_never_leaseable() {
        let a = sample(AccountHealth::Banned, None);
        assert!(!a.is_leaseable(Utc::now()));
    }

    #[test]
    fn cooldown_expires() {
        let past = Utc::now() - chrono::Duration::seconds(1);
        let a = sample(AccountHealth::Cooldown, Some(past));
        assert!(a.is_leaseable(Utc::now()));

        let future = Utc::now() + chrono::Duration::seconds(60);
        let b = sample(AccountHealth::Cooldown, Some(future));
        assert!(!b.is_leaseable(Utc::now()));
    }

    #[test]
    fn health_round_trips_through_str() {
        for h in [
            AccountHealth::Active,
            AccountHealth::Cooldown,
            AccountHealth::FloodWaiting,
            AccountHealth::Banned,
        ] {
            assert_eq!(AccountHealth::parse(h.as_str()), h);
        }
    }
}
