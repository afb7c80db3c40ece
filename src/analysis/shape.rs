//! Normalized body shapes for structural near-duplicate detection.
//!
//! A shape is the pre-order sequence of syntax node kinds in a function
//! body with identifiers and literals collapsed to placeholders. Two bodies
//! that differ only in naming produce the same shape.
//!
//! Fingerprints follow the usual winnowing scheme: hash every k-gram of
//! the token stream, then keep the minimum hash of each sliding window.

use std::collections::BTreeSet;

/// Tokens per shingle.
pub const SHINGLE_SIZE: usize = 5;

/// Shingles per winnowing window.
pub const WINDOW_SIZE: usize = 4;

/// Hex digest of the full token stream.
pub fn shape_hash(tokens: &[String]) -> String {
    let mut hasher = blake3::Hasher::new();
    for token in tokens {
        hasher.update(token.as_bytes());
        hasher.update(b"\x1f");
    }
    hasher.finalize().to_hex()[..16].to_string()
}

/// Winnowed fingerprint of a token stream, sorted and deduplicated.
pub fn fingerprint(tokens: &[String]) -> Vec<u32> {
    if tokens.is_empty() {
        return Vec::new();
    }

    let shingles: Vec<u32> = if tokens.len() <= SHINGLE_SIZE {
        vec![hash_window(tokens)]
    } else {
        tokens.windows(SHINGLE_SIZE).map(hash_window).collect()
    };

    let mut selected = BTreeSet::new();
    if shingles.len() <= WINDOW_SIZE {
        if let Some(min) = shingles.iter().min() {
            selected.insert(*min);
        }
    } else {
        for window in shingles.windows(WINDOW_SIZE) {
            if let Some(min) = window.iter().min() {
                selected.insert(*min);
            }
        }
    }

    selected.into_iter().collect()
}

/// Jaccard similarity of two sorted fingerprints.
pub fn jaccard(a: &[u32], b: &[u32]) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }

    let (mut i, mut j, mut shared) = (0, 0, 0usize);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                shared += 1;
                i += 1;
                j += 1;
            }
        }
    }

    let union = a.len() + b.len() - shared;
    shared as f64 / union as f64
}

fn hash_window(window: &[String]) -> u32 {
    let mut hasher = blake3::Hasher::new();
    for token in window {
        hasher.update(token.as_bytes());
        hasher.update(b"\x1f");
    }
    let bytes = hasher.finalize();
    let b = bytes.as_bytes();
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}
