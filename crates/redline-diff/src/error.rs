//! Error types for the diff crate.

use redline_types::TypeError;

/// Errors that can occur before a diff is computed. Diffing itself is total.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// The two documents were hashed under different contracts.
    #[error("incompatible hash contract: {left} vs {right}")]
    IncompatibleHashContract { left: String, right: String },

    /// One of the input trees is malformed.
    #[error("invalid {side} tree: {source}")]
    InvalidTree {
        side: &'static str,
        #[source]
        source: TypeError,
    },
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
