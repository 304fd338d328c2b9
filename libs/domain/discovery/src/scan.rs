// [libs/domain/discovery/src/scan.rs]
//! Entity-reference extraction from message text: t.me links,
//! @usernames, forwarded-from headers.

use once_cell::sync::Lazy;
use regex::Regex;

static TME_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)t\.me/([A-Za-z0-9_]{4,32})").expect("static regex"));
static USERNAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"@([A-Za-z][A-Za-z0-9_]{3,31})").expect("static regex"));

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub handle: String,
    pub has_invite_link: bool,
}

/// Extracts every distinct entity reference out of `text`, deduplicated
/// by handle; a handle seen via a `t.me/` link is marked
/// `has_invite_link` even if it also appears as a bare `@mention`
/// elsewhere in the same text.
pub fn extract_references(text: &str) -> Vec<Reference> {
    let mut found: Vec<Reference> = Vec::new();

    for capture in TME_LINK.captures_iter(text) {
        upsert(&mut found, &capture[1], true);
    }
    for capture in USERNAME.captures_iter(text) {
        upsert(&mut found, &capture[1], false);
    }

    found
}

fn upsert(found: &mut Vec<Reference>, handle: &str, has_invite_link: bool) {
    let lowered = handle.to_lowercase();
    match found.iter_mut().find(|r| r.handle == lowered) {
        Some(existing) => existing.has_invite_link = existing.has_invite_link || has_invite_link,
        None => found.push(Reference { handle: lowered, has_invite_link }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_tme_links_and_marks_invite_link() {
        let refs = extract_references("join us at t.me/somechannel for updates");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].handle, "somechannel");
        assert!(refs[0].has_invite_link);
    }

    #[test]
    fn extracts_bare_usernames_without_invite_flag() {
        let refs = extract_references("cross-posted from @othergroup");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].handle, "othergroup");
        assert!(!refs[0].has_invite_link);
    }

    #[test]
    fn dedups_a_handle_seen_both_ways() {
        let refs = extract_references("see @samechannel or t.me/samechannel");
        assert_eq!(refs.len(), 1);
        assert!(refs[0].has_invite_link);
    }

    #[test]
    fn ignores_text_with_no_references() {
        assert!(extract_references("nothing to see here").is_empty());
    }
}
