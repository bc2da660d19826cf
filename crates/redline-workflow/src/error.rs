use thiserror::Error;
use uuid::Uuid;

use crate::status::{WorkflowEvent, WorkflowStatus};

/// Errors produced by workflow operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("event {event} is not legal in status {status}")]
    IllegalTransition {
        status: WorkflowStatus,
        event: WorkflowEvent,
    },

    #[error("actor {actor:?} may not {event}")]
    ActorNotPermitted { actor: String, event: WorkflowEvent },

    #[error("a workflow needs at least one reviewer")]
    NoReviewers,

    #[error("document {document_id} already has active workflow {existing}")]
    DuplicateWorkflow { document_id: Uuid, existing: Uuid },

    #[error("workflow not found: {0}")]
    NotFound(Uuid),

    /// The record moved on since the caller read it; re-read and try again.
    #[error("stale workflow version: expected {expected}, current {actual}")]
    StaleVersion { expected: u64, actual: u64 },

    #[error("invalid event history: {0}")]
    InvalidHistory(String),

    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

pub type Result<T> = std::result::Result<T, WorkflowError>;
