//! Structural diff engine for Redline.
//!
//! Aligns two block forests by anchor identity, then by content, and
//! classifies every block as equal, inserted, deleted or modified. Modified
//! blocks also carry a token-level diff for rendering an inline redline.
//!
//! # Key Types
//!
//! - [`Alignment`] / [`MatchMethod`] -- Pairing of left and right blocks
//! - [`StructuralDiff`] / [`BlockDiff`] / [`DiffKind`] -- Ordered block-level diff
//! - [`TokenChange`] / [`TokenChangeKind`] -- Token-level diff inside a block
//! - [`block_similarity`] -- Token-set score gating content-based pairing

pub mod align;
pub mod block_diff;
pub mod error;
pub mod similarity;
pub mod token_diff;

pub use align::{Alignment, MatchMethod};
pub use block_diff::{diff_documents, diff_forests, BlockDiff, DiffKind, StructuralDiff};
pub use error::{DiffError, DiffResult};
pub use similarity::{block_similarity, token_similarity};
pub use token_diff::{diff_tokens, TokenChange, TokenChangeKind};
