// [libs/domain/forwarder/src/dedup.rs]
//! Duplicate detection against a destination's `ForwardFingerprint`
//! set: exact sha-256 match first, then the configured near-duplicate
//! checks.

use crate::errors::ForwarderError;
use spectra_domain_models::NearDuplicateThresholds;
use spectra_persistence::FingerprintRepository;

pub struct CandidateFingerprint<'a> {
    pub sha256: &'a str,
    pub perceptual_hash: Option<u64>,
    pub fuzzy_hash: Option<&'a str>,
}

/// `true` when `candidate` should be skipped as a duplicate of
/// something already forwarded to `destination_entity_id`.
pub async fn is_duplicate(
    fingerprints: &FingerprintRepository,
    destination_entity_id: i64,
    candidate: &CandidateFingerprint<'_>,
    enable_near_duplicates: bool,
    thresholds: NearDuplicateThresholds,
) -> Result<bool, ForwarderError> {
    if fingerprints.exists(destination_entity_id, candidate.sha256).await? {
        return Ok(true);
    }
    if !enable_near_duplicates {
        return Ok(false);
    }

    if let Some(phash) = candidate.perceptual_hash {
        if let Some(distance) = fingerprints.nearest_perceptual_distance(destination_entity_id, phash).await? {
            if distance <= thresholds.perceptual_hash_distance {
                return Ok(true);
            }
        }
    }

    if let Some(fuzzy) = candidate.fuzzy_hash {
        let existing = fingerprints.list_for_destination(destination_entity_id).await?;
        for other in existing.iter().filter_map(|f| f.fuzzy_hash.as_deref()) {
            if spectra_media_fetch::fuzzy_similarity(fuzzy, other) >= thresholds.fuzzy_similarity {
                return Ok(true);
            }
        }
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectra_domain_models::ForwardFingerprint;
    use spectra_persistence::Store;

    async fn repo() -> FingerprintRepository {
        let store = Store::connect(":memory:", None).await.unwrap();
        FingerprintRepository::new(store)
    }

    fn thresholds() -> NearDuplicateThresholds {
        NearDuplicateThresholds { perceptual_hash_distance: 6, fuzzy_similarity: 85 }
    }

    #[tokio::test]
    async fn exact_sha_match_is_a_duplicate() {
        let fingerprints = repo().await;
        fingerprints
            .insert(&ForwardFingerprint { destination_entity_id: 1, sha256: "abc".into(), perceptual_hash: None, fuzzy_hash: None, first_seen_at: chrono::Utc::now(), origin_entity_id: 9 })
            .await
            .unwrap();

        let candidate = CandidateFingerprint { sha256: "abc", perceptual_hash: None, fuzzy_hash: None };
        assert!(is_duplicate(&fingerprints, 1, &candidate, false, thresholds()).await.unwrap());
    }

    #[tokio::test]
    async fn distinct_sha_without_near_dup_is_not_a_duplicate() {
        let fingerprints = repo().await;
        let candidate = CandidateFingerprint { sha256: "xyz", perceptual_hash: None, fuzzy_hash: None };
        assert!(!is_duplicate(&fingerprints, 1, &candidate, false, thresholds()).await.unwrap());
    }

    #[tokio::test]
    async fn near_perceptual_match_is_flagged_as_duplicate() {
        let fingerprints = repo().await;
        fingerprints
            .insert(&ForwardFingerprint { destination_entity_id: 1, sha256: "abc".into(), perceptual_hash: Some(0b1111_0000), fuzzy_hash: None, first_seen_at: chrono::Utc::now(), origin_entity_id: 9 })
            .await
            .unwrap();

        let candidate = CandidateFingerprint { sha256: "different", perceptual_hash: Some(0b1111_0001), fuzzy_hash: None };
        assert!(is_duplicate(&fingerprints, 1, &candidate, true, thresholds()).await.unwrap());
    }
}
