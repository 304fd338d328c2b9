//! MediaObject domain entity and sidecar metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaObject {
    pub id: i64,
    pub mime_type: String,
    pub size_bytes: u64,
    pub file_path: String,
    pub original_filename: Option<String>,
    pub sha256: String,
    /// 64-bit perceptual hash, present for image media only.
    pub phash: Option<u64>,
    /// Locality-sensitive fuzzy-hash digest, present for text-like media.
    pub fuzzy_hash: Option<String>,
}

/// Sidecar JSON written alongside every downloaded media file.
/// Append-only: new fields may be added, existing fields must keep
/// their meaning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaSidecar {
    pub id: i64,
    pub mime: String,
    pub size: u64,
    pub sha256: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phash: Option<u64>,
    pub source: MediaSidecarSource,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaSidecarSource {
    pub entity: i64,
    pub message: i64,
}

/// Deterministic on-disk layout for a media file: `media/<entity>/<yyyy>/<mm>/<message_id><ext>`.
pub fn media_relative_path(entity_id: i64, date: DateTime<Utc>, message_id: i64, ext: &str) -> String {
    use chrono::Datelike;
    format!(
        "{entity_id}/{year:04}/{month:02}/{message_id}{dot_ext}",
        entity_id = entity_id,
        year = date.year(),
        month = date.month(),
        message_id = message_id,
        dot_ext = if ext.is_empty() { String::new() } else { format!(".{ext}") }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn layout_matches_spec_pattern() {
        let date = Utc.with_ymd_and_hms(2026, 3, 7, 0, 0, 0).unwrap();
        let path = media_relative_path(42, date, 900, "jpg");
        assert_eq!(path, "42/2026/03/900.jpg");
    }

    #[test]
    fn layout_without_extension() {
        let date = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let path = media_relative_path(1, date, 2, "");
        assert_eq!(path, "1/2026/01/2");
    }
}
