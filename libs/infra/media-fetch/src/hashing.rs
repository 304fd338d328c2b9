// [libs/infra/media-fetch/src/hashing.rs]
//! Perceptual and fuzzy hashing over raw downloaded bytes.
//!
//! Full image-format decoding is out of scope; rather than pull in a decoder this
//! computes a coarse average-hash directly over fixed-size byte blocks,
//! which is stable against the small trailing-byte differences between
//! re-encodes of the same image but says nothing about visual content.
//! `fuzzy_hash` is a simplified context-triggered piecewise hash (CTPH):
//! block boundaries are picked by a rolling low-byte trigger, each block
//! digested independently, so small edits only perturb neighbouring
//! blocks instead of the whole digest.

const PHASH_BLOCKS: usize = 64;
const CTPH_TRIGGER_MASK: u8 = 0x1F;
const CTPH_MIN_BLOCK: usize = 16;

/// 64-bit average-hash: splits `bytes` into `PHASH_BLOCKS` windows,
/// compares each window's mean byte value against the overall mean, and
/// sets the corresponding bit when the window is brighter than average.
pub fn average_hash(bytes: &[u8]) -> u64 {
    if bytes.is_empty() {
        return 0;
    }
    let overall_mean = bytes.iter().map(|&b| b as u64).sum::<u64>() / bytes.len() as u64;
    let block_size = (bytes.len() / PHASH_BLOCKS).max(1);

    let mut hash = 0u64;
    for i in 0..PHASH_BLOCKS {
        let start = i * block_size;
        if start >= bytes.len() {
            break;
        }
        let end = (start + block_size).min(bytes.len());
        let block = &bytes[start..end];
        let block_mean = block.iter().map(|&b| b as u64).sum::<u64>() / block.len() as u64;
        if block_mean >= overall_mean {
            hash |= 1 << i;
        }
    }
    hash
}

/// Simplified CTPH fuzzy-hash digest: hex-encoded per-block FNV-1a
/// digests joined by `:`, block boundaries chosen by a rolling trigger
/// byte so insertions/deletions only shift nearby block boundaries.
pub fn fuzzy_hash(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return String::new();
    }

    let mut blocks = Vec::new();
    let mut block_start = 0usize;
    for (i, &byte) in bytes.iter().enumerate() {
        let block_len = i - block_start;
        if block_len >= CTPH_MIN_BLOCK && (byte & CTPH_TRIGGER_MASK) == CTPH_TRIGGER_MASK {
            blocks.push(&bytes[block_start..=i]);
            block_start = i + 1;
        }
    }
    if block_start < bytes.len() {
        blocks.push(&bytes[block_start..]);
    }

    blocks.iter().map(|block| format!("{:08x}", fnv1a(block))).collect::<Vec<_>>().join(":")
}

/// Similarity score (0-100) between two `fuzzy_hash` digests: the
/// fraction of blocks the shorter digest shares with the longer one,
/// order-independent. Two empty digests are defined as dissimilar (0)
/// rather than identical, since an empty digest carries no content to
/// compare.
pub fn fuzzy_similarity(a: &str, b: &str) -> u8 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let blocks_a: std::collections::HashSet<&str> = a.split(':').collect();
    let blocks_b: std::collections::HashSet<&str> = b.split(':').collect();
    let shared = blocks_a.intersection(&blocks_b).count();
    let denominator = blocks_a.len().max(blocks_b.len());
    ((shared * 100) / denominator) as u8
}

fn fnv1a(bytes: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    let mut hash = OFFSET_BASIS;
    for &byte in bytes {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_hash_is_deterministic() {
        let data = vec![10u8; 4096];
        assert_eq!(average_hash(&data), average_hash(&data));
    }

    #[test]
    fn average_hash_distinguishes_bright_and_dark_halves() {
        let mut data = vec![0u8; 4096];
        for byte in data.iter_mut().skip(2048) {
            *byte = 255;
        }
        let hash = average_hash(&data);
        assert_ne!(hash, 0);
        assert_ne!(hash, u64::MAX);
    }

    #[test]
    fn fuzzy_hash_is_deterministic_and_nonempty_for_nonempty_input() {
        let data = b"the quick brown fox jumps over the lazy dog, repeated for length, repeated for length";
        let a = fuzzy_hash(data);
        let b = fuzzy_hash(data);
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn fuzzy_hash_changes_on_content_change() {
        let a = fuzzy_hash(b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        let b = fuzzy_hash(b"bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");
        assert_ne!(a, b);
    }

    #[test]
    fn fuzzy_similarity_is_full_for_identical_digests() {
        assert_eq!(fuzzy_similarity("aa:bb:cc", "aa:bb:cc"), 100);
    }

    #[test]
    fn fuzzy_similarity_is_zero_for_disjoint_digests() {
        assert_eq!(fuzzy_similarity("aa:bb", "cc:dd"), 0);
    }

    #[test]
    fn fuzzy_similarity_is_partial_for_overlapping_digests() {
        let score = fuzzy_similarity("aa:bb:cc", "aa:bb:zz");
        assert!(score > 0 && score < 100);
    }
}
