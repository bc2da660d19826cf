//! Token-set similarity between blocks.

use std::collections::HashMap;

use redline_types::{Block, Token};

/// Pairs scoring at least this much are matched on content alone.
pub const MATCH_SIMILARITY: f64 = 0.7;

/// Blocks sharing type, path and position still need this much in common.
pub const STRUCTURE_SIMILARITY: f64 = 0.4;

/// A pair under a different structural path scoring at least this much is
/// reported as moved rather than rewritten.
pub const MOVE_SIMILARITY: f64 = 0.85;

/// Multiset Jaccard index over normalized tokens.
///
/// Two empty token lists are identical (1.0); one empty side scores 0.0.
pub fn token_similarity(left: &[Token], right: &[Token]) -> f64 {
    if left.is_empty() && right.is_empty() {
        return 1.0;
    }
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for t in left {
        *counts.entry(t.normalized.as_str()).or_insert(0) += 1;
    }
    let mut shared = 0usize;
    for t in right {
        if let Some(n) = counts.get_mut(t.normalized.as_str()) {
            if *n > 0 {
                *n -= 1;
                shared += 1;
            }
        }
    }
    let union = left.len() + right.len() - shared;
    shared as f64 / union as f64
}

pub fn block_similarity(left: &Block, right: &Block) -> f64 {
    token_similarity(left.tokens(), right.tokens())
}
