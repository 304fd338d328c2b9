//! Entity domain model — a Telegram channel, supergroup or chat.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Channel,
    Supergroup,
    Chat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: i64,
    pub title: String,
    pub kind: EntityKind,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub discovery_depth: u32,
    pub priority_score: f64,
}

/// Per-account access-hash binding. `(account, entity)` uniquely
/// determines the hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityAccessHash {
    pub account_id: i64,
    pub entity_id: i64,
    pub access_hash: i64,
    pub learned_at: DateTime<Utc>,
}
