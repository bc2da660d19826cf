use redline_types::TypeError;
use uuid::Uuid;

use crate::conflict::Resolution;

/// Errors from merge and conflict resolution.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("incompatible hash contract: {left} vs {right}")]
    IncompatibleHashContract { left: String, right: String },

    #[error("invalid {side} tree: {source}")]
    InvalidInput {
        side: &'static str,
        #[source]
        source: TypeError,
    },

    #[error("conflict not found: {0}")]
    ConflictNotFound(Uuid),

    #[error("conflict {conflict_id} already resolved as {existing}")]
    AlreadyResolved {
        conflict_id: Uuid,
        existing: Resolution,
    },

    #[error("invalid resolution: {0}")]
    InvalidResolution(String),

    #[error("{0} conflict(s) still unresolved")]
    UnresolvedConflicts(usize),

    /// A merged tree broke a tree invariant. Always a bug in the engine.
    #[error("merge invariant violated: {0}")]
    InvariantViolation(String),
}

pub type Result<T> = std::result::Result<T, MergeError>;
