//! Merge engine for Redline.
//!
//! Merges an incoming block forest into a base forest, optionally informed by
//! a common ancestor. Every aligned slot gets a decision: applied
//! automatically, or surfaced as a [`MergeConflict`] that only an explicit
//! resolution through the [`ResolutionLedger`] can settle.
//!
//! # Key Types
//!
//! - [`MergeEngine`] / [`MergeConfig`] -- Runs a merge under a deletion policy
//! - [`MergeReport`] -- Merged document, per-slot results, conflicts and counts
//! - [`MergeBlockResult`] / [`MergeOutcome`] -- Decision for one aligned slot
//! - [`MergeConflict`] / [`ConflictKind`] / [`Resolution`] -- User-facing conflicts
//! - [`ResolutionLedger`] / [`ResolutionEntry`] -- Applies and records resolutions

pub mod config;
pub mod conflict;
pub mod engine;
pub mod error;
pub mod layout;
pub mod ledger;
pub mod report;

pub use config::MergeConfig;
pub use conflict::{ConflictKind, MergeConflict, Resolution, ResolutionChoice};
pub use engine::MergeEngine;
pub use error::{MergeError, Result};
pub use layout::MergeSlot;
pub use ledger::{ResolutionEntry, ResolutionLedger, ResolveOutcome};
pub use report::{
    ConflictDetail, MergeBlockResult, MergeOutcome, MergeReport, MergeSide, MergeSummary,
};
