// [libs/domain/discovery/src/scoring.rs]
//! Candidate priority scoring: inbound references, invite-link
//! presence, depth penalty, keyword match.

use std::cmp::Ordering;

#[derive(Debug, Clone)]
pub struct Candidate {
    pub reference: String,
    pub source_entity_id: i64,
    pub depth: u32,
    pub inbound_refs: u32,
    pub has_invite_link: bool,
    pub title_hint: Option<String>,
}

/// Weighted sum: inbound references (0.4), invite-link presence
/// (0.3), depth penalty (-0.2 per level), keyword match on the title
/// hint (0.1).
pub fn score(candidate: &Candidate, keywords: &[String]) -> f64 {
    let inbound = (candidate.inbound_refs as f64).min(10.0) / 10.0;
    let invite = if candidate.has_invite_link { 1.0 } else { 0.0 };
    let depth_penalty = candidate.depth as f64;
    let keyword_match = candidate
        .title_hint
        .as_deref()
        .map(|title| {
            let lowered = title.to_lowercase();
            keywords.iter().any(|k| lowered.contains(&k.to_lowercase()))
        })
        .unwrap_or(false);

    0.4 * inbound + 0.3 * invite - 0.2 * depth_penalty + 0.1 * if keyword_match { 1.0 } else { 0.0 }
}

#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub score: f64,
}

impl ScoredCandidate {
    pub fn new(candidate: Candidate, keywords: &[String]) -> Self {
        let score = score(&candidate, keywords);
        ScoredCandidate { candidate, score }
    }
}

impl PartialEq for ScoredCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score
    }
}
impl Eq for ScoredCandidate {}

impl PartialOrd for ScoredCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score.partial_cmp(&other.score).unwrap_or(Ordering::Equal)
    }
}

/// Keeps only the top `cap` candidates by score, descending — the
/// per-entity fan-out limit, `per_level_cap`.
pub fn top_n(mut candidates: Vec<ScoredCandidate>, cap: u32) -> Vec<ScoredCandidate> {
    candidates.sort_by(|a, b| b.cmp(a));
    candidates.truncate(cap as usize);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(depth: u32, inbound: u32, invite: bool, title: Option<&str>) -> Candidate {
        Candidate { reference: "ref".into(), source_entity_id: 1, depth, inbound_refs: inbound, has_invite_link: invite, title_hint: title.map(String::from) }
    }

    #[test]
    fn invite_link_and_keyword_raise_score() {
        let plain = score(&candidate(1, 0, false, None), &[]);
        let with_invite = score(&candidate(1, 0, true, None), &[]);
        let with_keyword = score(&candidate(1, 0, false, Some("crypto news")), &["crypto".to_string()]);
        assert!(with_invite > plain);
        assert!(with_keyword > plain);
    }

    #[test]
    fn deeper_candidates_score_lower() {
        let shallow = score(&candidate(1, 5, true, None), &[]);
        let deep = score(&candidate(3, 5, true, None), &[]);
        assert!(deep < shallow);
    }

    #[test]
    fn top_n_keeps_highest_scoring_and_respects_cap() {
        let candidates = vec![
            ScoredCandidate::new(candidate(1, 10, true, None), &[]),
            ScoredCandidate::new(candidate(1, 0, false, None), &[]),
            ScoredCandidate::new(candidate(1, 5, false, None), &[]),
        ];
        let kept = top_n(candidates, 2);
        assert_eq!(kept.len(), 2);
        assert!(kept[0].score >= kept[1].score);
    }
}
