//! AccessRecord domain entity — used by "total" mode forwarding to
//! pick an account known to have access to a source.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRecord {
    pub account_id: i64,
    pub entity_id: i64,
    pub access_hash: i64,
    pub last_seen_at: DateTime<Utc>,
}
