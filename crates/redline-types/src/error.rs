use thiserror::Error;
use uuid::Uuid;

/// Errors produced by block model operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid tree: {0}")]
    InvalidTree(String),

    #[error("duplicate block id: {0}")]
    DuplicateBlockId(Uuid),

    #[error("incompatible hash contract: {left} vs {right}")]
    IncompatibleHashContract { left: String, right: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias for block model results.
pub type TypeResult<T> = Result<T, TypeError>;
