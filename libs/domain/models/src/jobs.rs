//! Job domain entities: ForwardJob, ArchiveJob, DiscoveryJob,
//! InvitationTask.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

/// Tagged variant replacing the source's plugin-style dynamic dispatch
/// across forwarder modes — a closed, fixed set of modes, not a
/// plugin registry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ForwardMode {
    Selective,
    Total,
    DiscoverAndForward,
}

/// Shunt grouping strategy: dedup is applied at group granularity
/// instead of per message when set to anything but `None`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "strategy")]
pub enum GroupingStrategy {
    #[default]
    None,
    Filename,
    Time { window_seconds: u32 },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForwardFlags {
    pub enable_deduplication: bool,
    pub copy_into_destination: bool,
    pub prepend_origin_info: bool,
    pub forward_to_all_saved: bool,
    pub secondary_unique_destination: Option<i64>,
    pub grouping: GroupingStrategy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardJob {
    pub id: i64,
    pub source_entity_ids: Vec<i64>,
    pub destination_entity_id: i64,
    pub mode: ForwardMode,
    pub flags: ForwardFlags,
    /// Last successfully processed source message id; the resumption point.
    pub progress_cursor: i64,
    pub status: JobStatus,
    pub attempts: u32,
    pub cause: Option<String>,
    pub pinned_account_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveOptions {
    pub download_media: bool,
    pub download_avatars: bool,
    pub archive_topics: bool,
    pub max_file_size_mb: u64,
    pub media_types: Vec<String>,
    pub batch_size: u32,
    pub sleep_ms: u64,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        ArchiveOptions {
            download_media: true,
            download_avatars: false,
            archive_topics: false,
            max_file_size_mb: 500,
            media_types: Vec::new(),
            batch_size: 200,
            sleep_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveJob {
    pub id: i64,
    pub target_entity_id: i64,
    pub options: ArchiveOptions,
    pub status: JobStatus,
    pub attempts: u32,
    pub cause: Option<String>,
    /// Operator-supplied pinned account for this job only; `None`
    /// defers to the Scheduler's configured mode.
    pub pinned_account_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryOptions {
    pub max_messages: u32,
    pub max_depth: u32,
    /// Caps the number of new candidate references kept *per popped
    /// entity*, not the level's total size — a level's size is bounded
    /// by the product of this cap across the levels above it.
    pub per_level_cap: u32,
    pub include_private: bool,
    pub include_public: bool,
    /// Operator-provided keywords scored against a candidate's title
    /// and description.
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        DiscoveryOptions {
            max_messages: 1000,
            max_depth: 2,
            per_level_cap: 50,
            include_private: false,
            include_public: true,
            keywords: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryJob {
    pub id: i64,
    pub seeds: Vec<i64>,
    pub options: DiscoveryOptions,
    pub status: JobStatus,
    pub attempts: u32,
    pub cause: Option<String>,
    pub pinned_account_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InvitationState {
    Pending,
    Succeeded,
    Failed,
    Skipped,
}

impl InvitationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InvitationState::Succeeded | InvitationState::Failed | InvitationState::Skipped)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitationTask {
    pub destination_entity_id: i64,
    pub invitee_account_id: i64,
    pub attempts: u32,
    pub next_eligible_at: DateTime<Utc>,
    pub state: InvitationState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_flagged() {
        assert!(InvitationState::Succeeded.is_terminal());
        assert!(InvitationState::Failed.is_terminal());
        assert!(InvitationState::Skipped.is_terminal());
        assert!(!InvitationState::Pending.is_terminal());
    }
}
