use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use uuid::Uuid;

use redline_diff::{diff_documents, StructuralDiff};
use redline_merge::{MergeEngine, MergeReport, ResolutionChoice, ResolutionLedger, ResolveOutcome};
use redline_types::{Document, TypeError, HASH_CONTRACT_VERSION};
use redline_workflow::{
    legal_events, InMemoryWorkflowStore, WorkflowEvent, WorkflowState, WorkflowStatus, WorkflowStore,
};

use crate::cache::{DiffCache, DiffKey};
use crate::config::EngineConfig;
use crate::error::{SdkError, SdkResult};

/// Capability interface of the document core.
///
/// Diff and merge never modify stored documents. Each conflict resolution
/// and each workflow event is one mutating call, decided atomically.
pub trait DocumentCoreEngine: Send + Sync {
    /// Validate and store a document. Returns its id.
    fn ingest(&self, document: Document) -> SdkResult<Uuid>;

    fn document(&self, document_id: Uuid) -> SdkResult<Arc<Document>>;

    fn diff(&self, left_id: Uuid, right_id: Uuid) -> SdkResult<Arc<StructuralDiff>>;

    /// Run a merge and open a resolution session for it.
    fn merge(
        &self,
        base_id: Uuid,
        incoming_id: Uuid,
        ancestor_id: Option<Uuid>,
    ) -> SdkResult<MergeReport>;

    fn resolve_conflict(
        &self,
        merge_id: Uuid,
        conflict_id: Uuid,
        choice: ResolutionChoice,
        actor: &str,
    ) -> SdkResult<ResolveOutcome>;

    fn merge_report(&self, merge_id: Uuid) -> SdkResult<MergeReport>;

    fn open_workflow(
        &self,
        document_id: Uuid,
        initiator_id: &str,
        reviewer_ids: BTreeSet<String>,
    ) -> SdkResult<WorkflowState>;

    fn submit_event(
        &self,
        workflow_id: Uuid,
        event: WorkflowEvent,
        actor: &str,
    ) -> SdkResult<WorkflowState>;

    fn workflow(&self, workflow_id: Uuid) -> SdkResult<WorkflowState>;

    fn legal_events(&self, workflow_id: Uuid) -> SdkResult<Vec<WorkflowEvent>>;

    /// Close a merge whose conflicts are all resolved, under an approved
    /// workflow on its base or incoming document. Records the `merge`
    /// event, stores the merged document and returns it.
    fn finalize_merge(&self, merge_id: Uuid, workflow_id: Uuid, actor: &str) -> SdkResult<Document>;
}

/// The production [`DocumentCoreEngine`].
pub struct CoreEngine {
    config: EngineConfig,
    merger: MergeEngine,
    documents: RwLock<HashMap<Uuid, Arc<Document>>>,
    diffs: Mutex<DiffCache>,
    sessions: Mutex<HashMap<Uuid, ResolutionLedger>>,
    workflows: Arc<dyn WorkflowStore>,
}

impl CoreEngine {
    pub fn new(config: EngineConfig) -> Self {
        let workflows = Arc::new(InMemoryWorkflowStore::new(config.workflow.clone()));
        Self::with_workflow_store(config, workflows)
    }

    /// Use an externally owned workflow store.
    pub fn with_workflow_store(config: EngineConfig, workflows: Arc<dyn WorkflowStore>) -> Self {
        Self {
            merger: MergeEngine::new(config.merge.clone()),
            diffs: Mutex::new(DiffCache::new(config.diff_cache_capacity)),
            documents: RwLock::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
            workflows,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of diffs currently cached.
    pub fn cached_diffs(&self) -> SdkResult<usize> {
        Ok(self.lock_diffs()?.len())
    }

    fn lock_diffs(&self) -> SdkResult<std::sync::MutexGuard<'_, DiffCache>> {
        self.diffs
            .lock()
            .map_err(|e| SdkError::LockPoisoned(format!("diff cache: {e}")))
    }

    fn lock_sessions(&self) -> SdkResult<std::sync::MutexGuard<'_, HashMap<Uuid, ResolutionLedger>>> {
        self.sessions
            .lock()
            .map_err(|e| SdkError::LockPoisoned(format!("merge sessions: {e}")))
    }
}

impl Default for CoreEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl DocumentCoreEngine for CoreEngine {
    fn ingest(&self, document: Document) -> SdkResult<Uuid> {
        if document.hash_contract_version != HASH_CONTRACT_VERSION {
            return Err(TypeError::IncompatibleHashContract {
                left: document.hash_contract_version.clone(),
                right: HASH_CONTRACT_VERSION.to_string(),
            }
            .into());
        }
        document.ensure_valid()?;

        let id = document.id;
        let mut documents = self
            .documents
            .write()
            .map_err(|e| SdkError::LockPoisoned(format!("documents: {e}")))?;
        if documents.contains_key(&id) {
            return Err(SdkError::DuplicateDocument(id));
        }
        tracing::info!(document_id = %id, blocks = document.block_count(), "document ingested");
        documents.insert(id, Arc::new(document));
        Ok(id)
    }

    fn document(&self, document_id: Uuid) -> SdkResult<Arc<Document>> {
        let documents = self
            .documents
            .read()
            .map_err(|e| SdkError::LockPoisoned(format!("documents: {e}")))?;
        documents
            .get(&document_id)
            .cloned()
            .ok_or(SdkError::DocumentNotFound(document_id))
    }

    fn diff(&self, left_id: Uuid, right_id: Uuid) -> SdkResult<Arc<StructuralDiff>> {
        let left = self.document(left_id)?;
        let right = self.document(right_id)?;
        let key = DiffKey {
            left_id,
            right_id,
            left_digest: left.content_digest()?,
            right_digest: right.content_digest()?,
        };

        if let Some(hit) = self.lock_diffs()?.get(&key) {
            tracing::debug!(left = %left_id, right = %right_id, "diff cache hit");
            return Ok(hit);
        }
        let diff = Arc::new(diff_documents(&left, &right)?);
        self.lock_diffs()?.insert(key, Arc::clone(&diff));
        Ok(diff)
    }

    fn merge(
        &self,
        base_id: Uuid,
        incoming_id: Uuid,
        ancestor_id: Option<Uuid>,
    ) -> SdkResult<MergeReport> {
        let base = self.document(base_id)?;
        let incoming = self.document(incoming_id)?;
        let ancestor = ancestor_id.map(|id| self.document(id)).transpose()?;

        let report = self.merger.merge(&base, &incoming, ancestor.as_deref())?;
        self.lock_sessions()?
            .insert(report.merge_id, ResolutionLedger::new(report.clone()));
        Ok(report)
    }

    fn resolve_conflict(
        &self,
        merge_id: Uuid,
        conflict_id: Uuid,
        choice: ResolutionChoice,
        actor: &str,
    ) -> SdkResult<ResolveOutcome> {
        let mut sessions = self.lock_sessions()?;
        let ledger = sessions
            .get_mut(&merge_id)
            .ok_or(SdkError::MergeNotFound(merge_id))?;
        Ok(ledger.resolve(conflict_id, choice, actor)?)
    }

    fn merge_report(&self, merge_id: Uuid) -> SdkResult<MergeReport> {
        let sessions = self.lock_sessions()?;
        sessions
            .get(&merge_id)
            .map(|l| l.report().clone())
            .ok_or(SdkError::MergeNotFound(merge_id))
    }

    fn open_workflow(
        &self,
        document_id: Uuid,
        initiator_id: &str,
        reviewer_ids: BTreeSet<String>,
    ) -> SdkResult<WorkflowState> {
        self.document(document_id)?;
        Ok(self.workflows.create(document_id, initiator_id, reviewer_ids)?)
    }

    fn submit_event(
        &self,
        workflow_id: Uuid,
        event: WorkflowEvent,
        actor: &str,
    ) -> SdkResult<WorkflowState> {
        Ok(self.workflows.apply(workflow_id, event, actor)?)
    }

    fn workflow(&self, workflow_id: Uuid) -> SdkResult<WorkflowState> {
        self.workflows
            .get(workflow_id)?
            .ok_or(SdkError::WorkflowNotFound(workflow_id))
    }

    fn legal_events(&self, workflow_id: Uuid) -> SdkResult<Vec<WorkflowEvent>> {
        Ok(legal_events(self.workflow(workflow_id)?.status))
    }

    fn finalize_merge(&self, merge_id: Uuid, workflow_id: Uuid, actor: &str) -> SdkResult<Document> {
        let workflow = self.workflow(workflow_id)?;
        let merged = {
            let sessions = self.lock_sessions()?;
            let ledger = sessions
                .get(&merge_id)
                .ok_or(SdkError::MergeNotFound(merge_id))?;
            let report = ledger.report();
            if workflow.document_id != report.base_document_id
                && workflow.document_id != report.incoming_document_id
            {
                return Err(SdkError::WorkflowMismatch {
                    workflow_id,
                    merge_id,
                });
            }
            if workflow.status != WorkflowStatus::Approved {
                return Err(SdkError::WorkflowNotApproved {
                    workflow_id,
                    status: workflow.status,
                });
            }
            ledger.finalize()?
        };

        // Fails with `StaleVersion` if the workflow moved since it was read.
        self.workflows
            .apply_if_version(workflow_id, workflow.version, WorkflowEvent::Merge, actor)?;
        self.ingest(merged.clone())?;
        tracing::info!(
            merge_id = %merge_id,
            workflow_id = %workflow_id,
            merged_document_id = %merged.id,
            "merge finalized"
        );
        Ok(merged)
    }
}
