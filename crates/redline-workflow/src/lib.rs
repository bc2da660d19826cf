//! Review and approval workflow for Redline documents.
//!
//! A finite state machine keyed by document: every event is decided against
//! the current state and either recorded or rejected, never silently
//! dropped. Approval needs the full reviewer quorum. Workflows live in an
//! explicit [`WorkflowStore`] that serializes events per workflow.
//!
//! # Key Types
//!
//! - [`WorkflowStatus`] / [`WorkflowEvent`] -- States, events and the transition table
//! - [`WorkflowState`] -- One workflow with its quorum sets and event history
//! - [`WorkflowEventRecord`] -- Append-only history entry
//! - [`WorkflowStore`] / [`InMemoryWorkflowStore`] -- Registry keyed by workflow id
//! - [`WorkflowConfig`] -- Role enforcement policy

pub mod config;
pub mod error;
pub mod replay;
pub mod state;
pub mod status;
pub mod store;

pub use config::WorkflowConfig;
pub use error::{Result, WorkflowError};
pub use replay::replay;
pub use state::{EventOutcome, WorkflowEventRecord, WorkflowState};
pub use status::{legal_events, WorkflowEvent, WorkflowStatus};
pub use store::{InMemoryWorkflowStore, WorkflowStore};
