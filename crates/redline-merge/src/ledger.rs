//! Conflict resolution ledger.
//!
//! Owns a [`MergeReport`] and is the only way to settle its conflicts. Each
//! applied resolution is appended to an audit log and the merged tree is
//! reassembled from scratch, so the tree depends only on which resolutions
//! were chosen, never on the order they arrived in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use redline_types::Document;

use crate::conflict::{Resolution, ResolutionChoice};
use crate::error::{MergeError, Result};
use crate::report::MergeReport;

/// Whether a call to [`ResolutionLedger::resolve`] changed anything.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolveOutcome {
    Applied,
    /// The same resolution was already recorded.
    Unchanged,
}

/// One applied resolution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionEntry {
    pub conflict_id: Uuid,
    pub resolution: Resolution,
    pub resolved_text: Option<String>,
    pub actor: String,
    pub resolved_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct ResolutionLedger {
    report: MergeReport,
    entries: Vec<ResolutionEntry>,
}

impl ResolutionLedger {
    pub fn new(report: MergeReport) -> Self {
        Self {
            report,
            entries: Vec::new(),
        }
    }

    pub fn report(&self) -> &MergeReport {
        &self.report
    }

    /// Applied resolutions, oldest first.
    pub fn entries(&self) -> &[ResolutionEntry] {
        &self.entries
    }

    pub fn merge_id(&self) -> Uuid {
        self.report.merge_id
    }

    /// Settle one conflict.
    ///
    /// Repeating the recorded resolution is a no-op; asking for a different
    /// one fails with [`MergeError::AlreadyResolved`]. On any error the
    /// ledger is left as it was.
    pub fn resolve(
        &mut self,
        conflict_id: Uuid,
        choice: ResolutionChoice,
        actor: &str,
    ) -> Result<ResolveOutcome> {
        if let Some(text) = choice.manual_text() {
            if text.trim().is_empty() {
                return Err(MergeError::InvalidResolution(
                    "manual resolution text is empty".into(),
                ));
            }
        }

        let index = self
            .report
            .conflicts
            .iter()
            .position(|c| c.id == conflict_id)
            .ok_or(MergeError::ConflictNotFound(conflict_id))?;

        let conflict = &self.report.conflicts[index];
        if let Some(existing) = conflict.resolution {
            if conflict.matches(&choice) {
                tracing::debug!(conflict_id = %conflict_id, "resolution already recorded");
                return Ok(ResolveOutcome::Unchanged);
            }
            return Err(MergeError::AlreadyResolved {
                conflict_id,
                existing,
            });
        }

        let previous = self.report.clone();
        let conflict = &mut self.report.conflicts[index];
        conflict.resolution = Some(choice.resolution());
        conflict.resolved_text = choice.manual_text().map(str::to_string);
        if let Err(e) = self.report.reassemble() {
            self.report = previous;
            return Err(e);
        }

        self.entries.push(ResolutionEntry {
            conflict_id,
            resolution: choice.resolution(),
            resolved_text: choice.manual_text().map(str::to_string),
            actor: actor.to_string(),
            resolved_at: Utc::now(),
        });
        tracing::info!(
            merge_id = %self.report.merge_id,
            conflict_id = %conflict_id,
            resolution = %choice.resolution(),
            actor,
            outstanding = self.report.summary.outstanding_conflicts,
            "conflict resolved"
        );
        Ok(ResolveOutcome::Applied)
    }

    /// The merged document, once every conflict is resolved.
    pub fn finalize(&self) -> Result<Document> {
        let outstanding = self.report.summary.outstanding_conflicts;
        if outstanding > 0 {
            return Err(MergeError::UnresolvedConflicts(outstanding));
        }
        Ok(self.report.merged.clone())
    }

    pub fn into_report(self) -> MergeReport {
        self.report
    }
}
