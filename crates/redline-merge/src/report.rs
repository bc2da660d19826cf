use serde::{Deserialize, Serialize};
use uuid::Uuid;

use redline_diff::DiffKind;
use redline_types::{AnchorSignature, Block, Document};

use crate::conflict::{ConflictKind, MergeConflict};
use crate::error::{MergeError, Result};
use crate::layout::{assemble, MergeSlot};

/// What the merge did with one slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeOutcome {
    /// Three-way: only the base side changed, base kept.
    AcceptedBase,
    /// Three-way: only the incoming side changed, incoming taken.
    AcceptedIncoming,
    /// Applied without needing the ancestor.
    AutoMerged,
    Conflict,
}

/// Which input a merged block was taken from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeSide {
    Base,
    Incoming,
}

/// Pointer from a conflicting result to its conflict record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictDetail {
    pub conflict_id: Uuid,
    pub kind: ConflictKind,
}

/// Decision for one slot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MergeBlockResult {
    pub slot: usize,
    pub anchor_signature: AnchorSignature,
    pub change: DiffKind,
    pub outcome: MergeOutcome,
    /// Side the decision keeps; `None` for deletions and conflicts.
    pub taken_from: Option<MergeSide>,
    /// The block placed in the merged tree; `None` when the slot is absent
    /// from it, including blocks left inside a table that is itself absent.
    pub block: Option<Block>,
    pub conflict_detail: Option<ConflictDetail>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSummary {
    pub total_decisions: usize,
    pub unchanged_count: usize,
    pub auto_merged_count: usize,
    pub conflict_count: usize,
    pub outstanding_conflicts: usize,
    pub resolved_conflicts: usize,
}

impl MergeSummary {
    pub(crate) fn tally(results: &[MergeBlockResult], conflicts: &[MergeConflict]) -> Self {
        let unchanged_count = results.iter().filter(|r| r.change == DiffKind::Equal).count();
        let conflict_count = results
            .iter()
            .filter(|r| r.outcome == MergeOutcome::Conflict)
            .count();
        let resolved_conflicts = conflicts.iter().filter(|c| c.is_resolved()).count();
        Self {
            total_decisions: results.len(),
            unchanged_count,
            auto_merged_count: results.len() - unchanged_count - conflict_count,
            conflict_count,
            outstanding_conflicts: conflicts.len() - resolved_conflicts,
            resolved_conflicts,
        }
    }
}

/// Full result of a merge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MergeReport {
    pub merge_id: Uuid,
    pub base_document_id: Uuid,
    pub incoming_document_id: Uuid,
    pub ancestor_document_id: Option<Uuid>,
    pub slots: Vec<MergeSlot>,
    pub results: Vec<MergeBlockResult>,
    pub conflicts: Vec<MergeConflict>,
    pub summary: MergeSummary,
    /// Merged document; pending conflicts are left out of its tree.
    pub merged: Document,
}

impl MergeReport {
    pub fn has_outstanding_conflicts(&self) -> bool {
        self.summary.outstanding_conflicts > 0
    }

    pub fn conflict(&self, conflict_id: Uuid) -> Option<&MergeConflict> {
        self.conflicts.iter().find(|c| c.id == conflict_id)
    }

    pub fn outstanding(&self) -> impl Iterator<Item = &MergeConflict> {
        self.conflicts.iter().filter(|c| !c.is_resolved())
    }

    /// Block each slot contributes given the current resolutions.
    fn chosen_blocks(&self) -> Vec<Option<Block>> {
        let mut chosen: Vec<Option<Block>> = vec![None; self.slots.len()];
        for result in &self.results {
            if result.outcome != MergeOutcome::Conflict {
                chosen[result.slot] = result
                    .taken_from
                    .and_then(|side| self.slots[result.slot].side(side))
                    .cloned();
            }
        }
        for conflict in &self.conflicts {
            chosen[conflict.slot] = conflict.resolved_block(&self.slots[conflict.slot]);
        }
        chosen
    }

    /// Rebuild the merged tree and the counts from the slots, decisions and
    /// resolutions. Deterministic for a given set of resolutions.
    pub(crate) fn reassemble(&mut self) -> Result<()> {
        let chosen = self.chosen_blocks();
        let (forest, emitted) = assemble(&self.slots, &chosen, self.merge_id, self.merged.id);
        self.merged.blocks = forest;
        if let Err(e) = self.merged.ensure_valid() {
            tracing::error!(merge_id = %self.merge_id, error = %e, "merged tree failed validation");
            return Err(MergeError::InvariantViolation(e.to_string()));
        }

        for result in &mut self.results {
            result.block = if emitted[result.slot] {
                chosen[result.slot].clone()
            } else {
                None
            };
        }
        self.summary = MergeSummary::tally(&self.results, &self.conflicts);
        Ok(())
    }
}
