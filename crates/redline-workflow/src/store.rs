//! Workflow registry.
//!
//! [`InMemoryWorkflowStore`] keeps each workflow behind its own `Mutex`, so
//! deciding an event and recording it happen under one lock and two
//! concurrent approvals can never both complete the quorum. The registry
//! maps themselves sit behind `RwLock`s and are only held long enough to
//! find a record.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use uuid::Uuid;

use crate::config::WorkflowConfig;
use crate::error::{Result, WorkflowError};
use crate::state::{EventOutcome, WorkflowState};
use crate::status::WorkflowEvent;

/// Storage for workflows keyed by workflow id.
///
/// Implementations must be thread-safe and apply each event atomically
/// against the current stored state.
pub trait WorkflowStore: Send + Sync {
    /// Open a workflow for `document_id`. Fails if the document already has
    /// one that is not archived.
    fn create(
        &self,
        document_id: Uuid,
        initiator_id: &str,
        reviewer_ids: BTreeSet<String>,
    ) -> Result<WorkflowState>;

    fn get(&self, workflow_id: Uuid) -> Result<Option<WorkflowState>>;

    /// The document's workflow that is not yet archived, if any.
    fn active_for_document(&self, document_id: Uuid) -> Result<Option<WorkflowState>>;

    /// Apply an event and return the resulting state.
    fn apply(&self, workflow_id: Uuid, event: WorkflowEvent, actor: &str) -> Result<WorkflowState>;

    /// Like [`apply`](WorkflowStore::apply), but only if the stored version
    /// is still `expected_version`.
    fn apply_if_version(
        &self,
        workflow_id: Uuid,
        expected_version: u64,
        event: WorkflowEvent,
        actor: &str,
    ) -> Result<WorkflowState>;

    fn list(&self) -> Result<Vec<WorkflowState>>;
}

type Record = Arc<Mutex<WorkflowState>>;

/// In-memory [`WorkflowStore`].
#[derive(Debug, Default)]
pub struct InMemoryWorkflowStore {
    config: WorkflowConfig,
    records: RwLock<HashMap<Uuid, Record>>,
    by_document: RwLock<HashMap<Uuid, Vec<Uuid>>>,
}

impl InMemoryWorkflowStore {
    pub fn new(config: WorkflowConfig) -> Self {
        Self {
            config,
            records: RwLock::new(HashMap::new()),
            by_document: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    fn record(&self, workflow_id: Uuid) -> Result<Record> {
        let records = self
            .records
            .read()
            .map_err(|e| WorkflowError::LockPoisoned(format!("workflow registry: {e}")))?;
        records
            .get(&workflow_id)
            .cloned()
            .ok_or(WorkflowError::NotFound(workflow_id))
    }

    fn apply_locked(
        &self,
        workflow_id: Uuid,
        expected_version: Option<u64>,
        event: WorkflowEvent,
        actor: &str,
    ) -> Result<WorkflowState> {
        let record = self.record(workflow_id)?;
        let mut state = record
            .lock()
            .map_err(|e| WorkflowError::LockPoisoned(format!("workflow {workflow_id}: {e}")))?;

        if let Some(expected) = expected_version {
            if state.version != expected {
                return Err(WorkflowError::StaleVersion {
                    expected,
                    actual: state.version,
                });
            }
        }

        match state.apply(event, actor, &self.config) {
            Ok(EventOutcome::Recorded(entry)) => {
                tracing::info!(
                    workflow_id = %workflow_id,
                    event = %event,
                    actor,
                    from = %entry.from_status,
                    to = %entry.to_status,
                    "workflow event recorded"
                );
            }
            Ok(EventOutcome::AlreadyApproved) => {
                tracing::debug!(workflow_id = %workflow_id, actor, "repeat approval ignored");
            }
            Err(e) => {
                tracing::warn!(workflow_id = %workflow_id, event = %event, actor, error = %e, "workflow event rejected");
                return Err(e);
            }
        }
        Ok(state.clone())
    }
}

impl WorkflowStore for InMemoryWorkflowStore {
    fn create(
        &self,
        document_id: Uuid,
        initiator_id: &str,
        reviewer_ids: BTreeSet<String>,
    ) -> Result<WorkflowState> {
        let state = WorkflowState::new(document_id, initiator_id, reviewer_ids)?;

        // Held for the whole check-then-insert so two creations for one
        // document cannot interleave.
        let mut by_document = self
            .by_document
            .write()
            .map_err(|e| WorkflowError::LockPoisoned(format!("document index: {e}")))?;
        let existing_ids = by_document.entry(document_id).or_default();
        for &existing in existing_ids.iter() {
            let record = self.record(existing)?;
            let active = record
                .lock()
                .map_err(|e| WorkflowError::LockPoisoned(format!("workflow {existing}: {e}")))?
                .is_active();
            if active {
                return Err(WorkflowError::DuplicateWorkflow {
                    document_id,
                    existing,
                });
            }
        }

        let mut records = self
            .records
            .write()
            .map_err(|e| WorkflowError::LockPoisoned(format!("workflow registry: {e}")))?;
        records.insert(state.id, Arc::new(Mutex::new(state.clone())));
        existing_ids.push(state.id);

        tracing::info!(
            workflow_id = %state.id,
            document_id = %document_id,
            reviewers = state.reviewer_ids.len(),
            "workflow opened"
        );
        Ok(state)
    }

    fn get(&self, workflow_id: Uuid) -> Result<Option<WorkflowState>> {
        match self.record(workflow_id) {
            Ok(record) => {
                let state = record
                    .lock()
                    .map_err(|e| WorkflowError::LockPoisoned(format!("workflow {workflow_id}: {e}")))?;
                Ok(Some(state.clone()))
            }
            Err(WorkflowError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn active_for_document(&self, document_id: Uuid) -> Result<Option<WorkflowState>> {
        let ids = {
            let by_document = self
                .by_document
                .read()
                .map_err(|e| WorkflowError::LockPoisoned(format!("document index: {e}")))?;
            by_document.get(&document_id).cloned().unwrap_or_default()
        };
        for id in ids.into_iter().rev() {
            if let Some(state) = self.get(id)? {
                if state.is_active() {
                    return Ok(Some(state));
                }
            }
        }
        Ok(None)
    }

    fn apply(&self, workflow_id: Uuid, event: WorkflowEvent, actor: &str) -> Result<WorkflowState> {
        self.apply_locked(workflow_id, None, event, actor)
    }

    fn apply_if_version(
        &self,
        workflow_id: Uuid,
        expected_version: u64,
        event: WorkflowEvent,
        actor: &str,
    ) -> Result<WorkflowState> {
        self.apply_locked(workflow_id, Some(expected_version), event, actor)
    }

    fn list(&self) -> Result<Vec<WorkflowState>> {
        let records: Vec<Record> = {
            let map = self
                .records
                .read()
                .map_err(|e| WorkflowError::LockPoisoned(format!("workflow registry: {e}")))?;
            map.values().cloned().collect()
        };
        let mut states = records
            .iter()
            .map(|r| {
                r.lock()
                    .map(|s| (*s).clone())
                    .map_err(|e| WorkflowError::LockPoisoned(e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        states.sort_by_key(|s| s.id);
        Ok(states)
    }
}
