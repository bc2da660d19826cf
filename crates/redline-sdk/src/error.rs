use thiserror::Error;
use uuid::Uuid;

use redline_workflow::WorkflowStatus;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("document not found: {0}")]
    DocumentNotFound(Uuid),

    #[error("document already ingested: {0}")]
    DuplicateDocument(Uuid),

    #[error("merge session not found: {0}")]
    MergeNotFound(Uuid),

    #[error("workflow not found: {0}")]
    WorkflowNotFound(Uuid),

    #[error("workflow {workflow_id} does not cover either side of merge {merge_id}")]
    WorkflowMismatch { workflow_id: Uuid, merge_id: Uuid },

    #[error("workflow {workflow_id} is {status}, merge needs approved")]
    WorkflowNotApproved {
        workflow_id: Uuid,
        status: WorkflowStatus,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("document error: {0}")]
    Types(#[from] redline_types::TypeError),

    #[error("diff error: {0}")]
    Diff(#[from] redline_diff::DiffError),

    #[error("merge error: {0}")]
    Merge(#[from] redline_merge::MergeError),

    #[error("workflow error: {0}")]
    Workflow(#[from] redline_workflow::WorkflowError),

    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

pub type SdkResult<T> = Result<T, SdkError>;
