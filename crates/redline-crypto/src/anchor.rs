//! The block identity contract.
//!
//! ```text
//! clause_hash      = BLAKE3(canonical_text)
//! anchor_signature = BLAKE3(block_type_tag "|" structural_path "|" first_128_chars(canonical_text))
//! ```
//!
//! Any change to these formulas or to the digest algorithm must bump
//! [`HASH_CONTRACT_VERSION`].

use crate::digest::Digest;

/// Version of the pinned hash contract (BLAKE3-256, formulas above).
pub const HASH_CONTRACT_VERSION: &str = "1.0.0";

/// Number of leading canonical-text characters (not bytes) in the anchor.
pub const ANCHOR_PREFIX_CHARS: usize = 128;

/// Stable identity key aligning a block across document versions.
pub type AnchorSignature = Digest;

/// Fingerprint of a block's canonical text.
pub type ClauseHash = Digest;

/// Compute the clause hash of a block's canonical text.
pub fn clause_hash(canonical_text: &str) -> ClauseHash {
    Digest::of(canonical_text.as_bytes())
}

/// Compute the anchor signature from a block's type tag, structural path and
/// canonical text.
pub fn anchor_signature(
    block_type_tag: &str,
    structural_path: &str,
    canonical_text: &str,
) -> AnchorSignature {
    let prefix_end = canonical_text
        .char_indices()
        .nth(ANCHOR_PREFIX_CHARS)
        .map(|(i, _)| i)
        .unwrap_or(canonical_text.len());

    let mut hasher = blake3::Hasher::new();
    hasher.update(block_type_tag.as_bytes());
    hasher.update(b"|");
    hasher.update(structural_path.as_bytes());
    hasher.update(b"|");
    hasher.update(canonical_text[..prefix_end].as_bytes());
    Digest::from_hash(*hasher.finalize().as_bytes())
}
