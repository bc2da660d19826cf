//! Anchor and hash engine for Redline.
//!
//! Every block in a document tree carries two derived keys: an anchor
//! signature that identifies the logical clause across versions, and a clause
//! hash that fingerprints its canonical text. Both are BLAKE3 digests rendered
//! as lowercase hex, pinned by [`HASH_CONTRACT_VERSION`].
//!
//! # Key Types
//!
//! - [`Digest`] -- 256-bit digest with hex wire form
//! - [`ContentHasher`] -- Domain-separated BLAKE3 hasher for derived digests
//! - [`anchor_signature`] / [`clause_hash`] -- The block identity contract

pub mod anchor;
pub mod digest;
pub mod hasher;

pub use anchor::{
    anchor_signature, clause_hash, AnchorSignature, ClauseHash, ANCHOR_PREFIX_CHARS,
    HASH_CONTRACT_VERSION,
};
pub use digest::{Digest, DigestError};
pub use hasher::{ContentHasher, DigestBuilder, HasherError};
