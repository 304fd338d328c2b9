//! Checkpoint domain entity — enables resumable iteration over one
//! (entity, context) pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub entity_id: i64,
    pub context: String,
    pub last_fetched_message_id: i64,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Context key for the main archive run.
    pub fn archive_context() -> String {
        "archive".to_string()
    }

    /// Context key for a topic thread's independent archive run.
    pub fn topic_context(topic_id: i64) -> String {
        format!("archive:topic:{topic_id}")
    }
}
