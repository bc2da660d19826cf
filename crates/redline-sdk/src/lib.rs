//! High-level SDK for Redline.
//!
//! [`CoreEngine`] is the single entry point for applications embedding the
//! core: it holds ingested documents, caches diffs, keeps merge sessions
//! open until their conflicts are resolved, and gates finalization on an
//! approved review workflow.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;

pub use config::EngineConfig;
pub use engine::{CoreEngine, DocumentCoreEngine};
pub use error::{SdkError, SdkResult};

// Re-export key types
pub use redline_diff::{BlockDiff, DiffKind, StructuralDiff};
pub use redline_merge::{
    MergeConfig, MergeConflict, MergeOutcome, MergeReport, ResolutionChoice, ResolveOutcome,
};
pub use redline_types::{Block, BlockType, DocType, Document};
pub use redline_workflow::{WorkflowConfig, WorkflowEvent, WorkflowState, WorkflowStatus};
