//! Block model for Redline.
//!
//! A legal document is a forest of typed content blocks. Each block carries
//! its canonical text (the only text that is ever hashed), its display text
//! and formatting runs, and two derived identity keys computed by
//! `redline-crypto`. Every other Redline crate depends on `redline-types`.
//!
//! # Key Types
//!
//! - [`Block`] / [`BlockType`] -- A node in a document tree
//! - [`Document`] / [`DocType`] -- Root container with contract versions
//! - [`Run`] / [`FormattingMeta`] / [`TrackedChange`] -- Display-side metadata
//! - [`Token`] / [`TokenKind`] -- Word-level units of canonical text
//! - [`ValidationReport`] / [`Violation`] -- Tree well-formedness check
//! - [`TreeIndex`] -- Arena lookup from block id to parent and location

pub mod block;
pub mod document;
pub mod error;
pub mod normalize;
pub mod token;
pub mod tree;

pub use block::{Block, BlockType, ChangeType, FormattingMeta, Run, RunFormatting, TrackedChange};
pub use document::{DocType, Document, NORMALIZATION_VERSION, SCHEMA_VERSION};
pub use error::{TypeError, TypeResult};
pub use normalize::canonicalize;
pub use token::{tokenize, Token, TokenKind};
pub use tree::{
    flatten, reindex_forest, validate_forest, FlatNode, TreeIndex, ValidationReport, Violation,
    ViolationKind,
};

pub use redline_crypto::{AnchorSignature, ClauseHash, Digest, HASH_CONTRACT_VERSION};
