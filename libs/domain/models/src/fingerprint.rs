//! ForwardFingerprint domain entity and the canonicalisation rule two
//! copies of the same forwarded message must hash identically under,
//! regardless of which account relayed them or how the client encoded
//! the caption.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardFingerprint {
    pub destination_entity_id: i64,
    pub sha256: String,
    pub perceptual_hash: Option<u64>,
    pub fuzzy_hash: Option<String>,
    pub first_seen_at: DateTime<Utc>,
    pub origin_entity_id: i64,
}

/// A single caption entity (bold span, URL, mention, ...) as carried in
/// the wire protocol. Only `kind`, `offset` and `length` participate in
/// canonicalisation — the human-readable payload is already covered by
/// the message text itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct CaptionEntity {
    pub kind: String,
    pub offset: u32,
    pub length: u32,
}

/// Computes the canonical sha-256 fingerprint: concatenate
/// NFC-normalised, trimmed text, media sha-256 (if any), media mime
/// type, and a sorted list of caption entities. NFC normalisation runs
/// before trimming collapses whitespace, so two captions that differ
/// only in precomposed-vs-decomposed accents (or in surrounding
/// whitespace) fold to the same fingerprint.
pub fn canonical_fingerprint_sha256(
    text: Option<&str>,
    media_sha256: Option<&str>,
    media_mime: Option<&str>,
    caption_entities: &[CaptionEntity],
) -> String {
    let normalised_text: String = text.map(|t| t.nfc().collect::<String>().trim().to_string()).unwrap_or_default();

    let mut sorted_entities: Vec<&CaptionEntity> = caption_entities.iter().collect();
    sorted_entities.sort();

    let mut hasher = Sha256::new();
    hasher.update(normalised_text.as_bytes());
    hasher.update(b"\0");
    hasher.update(media_sha256.unwrap_or("").as_bytes());
    hasher.update(b"\0");
    hasher.update(media_mime.unwrap_or("").as_bytes());
    hasher.update(b"\0");
    for entity in sorted_entities {
        hasher.update(entity.kind.as_bytes());
        hasher.update(entity.offset.to_le_bytes());
        hasher.update(entity.length.to_le_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Hamming distance between two 64-bit perceptual hashes, used for
/// near-duplicate image matching (default threshold: 6 bits).
pub fn phash_hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_inputs_produce_identical_fingerprint() {
        let entities = vec![CaptionEntity { kind: "bold".into(), offset: 0, length: 5 }];
        let a = canonical_fingerprint_sha256(Some("hi"), Some("deadbeef"), Some("image/jpeg"), &entities);
        let b = canonical_fingerprint_sha256(Some("hi"), Some("deadbeef"), Some("image/jpeg"), &entities);
        assert_eq!(a, b);
    }

    #[test]
    fn caption_entity_order_does_not_matter() {
        let e1 = vec![
            CaptionEntity { kind: "bold".into(), offset: 0, length: 5 },
            CaptionEntity { kind: "url".into(), offset: 10, length: 4 },
        ];
        let e2 = vec![
            CaptionEntity { kind: "url".into(), offset: 10, length: 4 },
            CaptionEntity { kind: "bold".into(), offset: 0, length: 5 },
        ];
        let a = canonical_fingerprint_sha256(Some("hi"), None, None, &e1);
        let b = canonical_fingerprint_sha256(Some("hi"), None, None, &e2);
        assert_eq!(a, b);
    }

    #[test]
    fn precomposed_and_decomposed_accents_fold_to_the_same_fingerprint() {
        let precomposed = "caf\u{00e9}";
        let decomposed = "cafe\u{0301}";
        let a = canonical_fingerprint_sha256(Some(precomposed), None, None, &[]);
        let b = canonical_fingerprint_sha256(Some(decomposed), None, None, &[]);
        assert_eq!(a, b);
    }

    #[test]
    fn different_media_hash_changes_fingerprint() {
        let a = canonical_fingerprint_sha256(Some("hi"), Some("aaaa"), None, &[]);
        let b = canonical_fingerprint_sha256(Some("hi"), Some("bbbb"), None, &[]);
        assert_ne!(a, b);
    }

    #[test]
    fn hamming_distance_zero_for_identical_hashes() {
        assert_eq!(phash_hamming_distance(0xFF00, 0xFF00), 0);
    }

    #[test]
    fn hamming_distance_counts_bit_flips() {
        assert_eq!(phash_hamming_distance(0b0000, 0b1111), 4);
    }
}
