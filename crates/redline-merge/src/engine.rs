use serde_json::json;
use uuid::Uuid;

use redline_diff::DiffKind;
use redline_types::{DocType, Document, TypeError};

use crate::config::MergeConfig;
use crate::conflict::{ConflictKind, MergeConflict};
use crate::error::{MergeError, Result};
use crate::layout::{build_layout, MergeSlot};
use crate::report::{
    ConflictDetail, MergeBlockResult, MergeOutcome, MergeReport, MergeSide, MergeSummary,
};

/// Runs block-level merges under a [`MergeConfig`].
#[derive(Clone, Debug, Default)]
pub struct MergeEngine {
    config: MergeConfig,
}

struct Decision {
    change: DiffKind,
    outcome: MergeOutcome,
    taken_from: Option<MergeSide>,
    conflict: Option<ConflictKind>,
}

impl Decision {
    fn applied(change: DiffKind, outcome: MergeOutcome, taken_from: Option<MergeSide>) -> Self {
        Self {
            change,
            outcome,
            taken_from,
            conflict: None,
        }
    }

    fn conflict(change: DiffKind, kind: ConflictKind) -> Self {
        Self {
            change,
            outcome: MergeOutcome::Conflict,
            taken_from: None,
            conflict: Some(kind),
        }
    }
}

impl MergeEngine {
    pub fn new(config: MergeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Merge `incoming` into `base`, using `ancestor` (if given) to tell
    /// which side changed a block.
    ///
    /// Inputs are never modified. Conflicting slots are left out of the
    /// merged tree until resolved through a
    /// [`ResolutionLedger`](crate::ResolutionLedger).
    pub fn merge(
        &self,
        base: &Document,
        incoming: &Document,
        ancestor: Option<&Document>,
    ) -> Result<MergeReport> {
        check_compatible(base, incoming)?;
        if let Some(a) = ancestor {
            check_compatible(base, a)?;
        }
        validate_input("base", base)?;
        validate_input("incoming", incoming)?;
        if let Some(a) = ancestor {
            validate_input("ancestor", a)?;
        }

        let merge_id = Uuid::now_v7();
        let slots = build_layout(&base.blocks, &incoming.blocks, ancestor.map(|a| a.blocks.as_slice()));

        let mut results = Vec::with_capacity(slots.len());
        let mut conflicts = Vec::new();
        for (index, slot) in slots.iter().enumerate() {
            let representative = slot.representative().ok_or_else(|| {
                MergeError::InvariantViolation(format!("merge slot {index} holds no block"))
            })?;
            let decision = self.decide(index, slot, ancestor.is_some())?;
            let conflict_detail = decision.conflict.map(|kind| {
                let conflict = MergeConflict::new(Uuid::now_v7(), index, slot, representative, kind);
                let detail = ConflictDetail {
                    conflict_id: conflict.id,
                    kind,
                };
                conflicts.push(conflict);
                detail
            });
            results.push(MergeBlockResult {
                slot: index,
                anchor_signature: representative.anchor_signature(),
                change: decision.change,
                outcome: decision.outcome,
                taken_from: decision.taken_from,
                block: None,
                conflict_detail,
            });
        }

        let mut merged = Document::new(format!("{} (merged)", base.name), DocType::Merged);
        merged.metadata = Some(json!({
            "merge_id": merge_id,
            "base_document_id": base.id,
            "incoming_document_id": incoming.id,
            "ancestor_document_id": ancestor.map(|a| a.id),
        }));

        let mut report = MergeReport {
            merge_id,
            base_document_id: base.id,
            incoming_document_id: incoming.id,
            ancestor_document_id: ancestor.map(|a| a.id),
            slots,
            results,
            conflicts,
            summary: MergeSummary::default(),
            merged,
        };
        report.reassemble()?;

        tracing::info!(
            merge_id = %merge_id,
            base = %base.id,
            incoming = %incoming.id,
            three_way = ancestor.is_some(),
            decisions = report.summary.total_decisions,
            auto_merged = report.summary.auto_merged_count,
            conflicts = report.summary.conflict_count,
            "merge complete"
        );
        Ok(report)
    }

    fn decide(&self, index: usize, slot: &MergeSlot, ancestor_supplied: bool) -> Result<Decision> {
        let decision = match (&slot.base, &slot.incoming) {
            (Some(b), Some(i)) => {
                if b.clause_hash() == i.clause_hash() {
                    // A renumbered block follows the side that renumbered it.
                    let base_numbering = b.structural_path() == i.structural_path()
                        || slot
                            .ancestor
                            .as_ref()
                            .is_some_and(|a| a.structural_path() == i.structural_path());
                    let side = if base_numbering { MergeSide::Base } else { MergeSide::Incoming };
                    return Ok(Decision::applied(DiffKind::Equal, MergeOutcome::AutoMerged, Some(side)));
                }
                match &slot.ancestor {
                    Some(a) if a.clause_hash() == b.clause_hash() => Decision::applied(
                        DiffKind::Modified,
                        MergeOutcome::AcceptedIncoming,
                        Some(MergeSide::Incoming),
                    ),
                    Some(a) if a.clause_hash() == i.clause_hash() => Decision::applied(
                        DiffKind::Modified,
                        MergeOutcome::AcceptedBase,
                        Some(MergeSide::Base),
                    ),
                    _ => Decision::conflict(DiffKind::Modified, ConflictKind::Content),
                }
            }
            (Some(only), None) | (None, Some(only)) => {
                let side = if slot.base.is_some() { MergeSide::Base } else { MergeSide::Incoming };
                match &slot.ancestor {
                    Some(a) if a.clause_hash() != only.clause_hash() => {
                        Decision::conflict(DiffKind::Deleted, ConflictKind::DeleteModify)
                    }
                    Some(_) => self.deletion(),
                    // Present on the base side but unknown to the ancestor: the
                    // base inserted it. Without an ancestor there is no telling,
                    // and the incoming side is taken as having removed it.
                    None if side == MergeSide::Base && !ancestor_supplied => self.deletion(),
                    None => Decision::applied(DiffKind::Inserted, MergeOutcome::AutoMerged, Some(side)),
                }
            }
            (None, None) => {
                return Err(MergeError::InvariantViolation(format!(
                    "merge slot {index} has neither a base nor an incoming block"
                )))
            }
        };
        Ok(decision)
    }

    fn deletion(&self) -> Decision {
        if self.config.preserve_deletions {
            Decision::conflict(DiffKind::Deleted, ConflictKind::Deletion)
        } else {
            Decision::applied(DiffKind::Deleted, MergeOutcome::AutoMerged, None)
        }
    }
}

fn check_compatible(left: &Document, right: &Document) -> Result<()> {
    left.check_compatible(right).map_err(|e| match e {
        TypeError::IncompatibleHashContract { left, right } => {
            MergeError::IncompatibleHashContract { left, right }
        }
        other => MergeError::InvalidInput {
            side: "incoming",
            source: other,
        },
    })
}

fn validate_input(side: &'static str, document: &Document) -> Result<()> {
    document
        .ensure_valid()
        .map_err(|source| MergeError::InvalidInput { side, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use redline_types::{flatten, Block, BlockType};

    fn clause(doc: &Document, path: &str, text: &str) -> Block {
        Block::new(doc.id, BlockType::Clause, path, text)
    }

    fn document(name: &str, clauses: &[(&str, &str)]) -> Document {
        let mut doc = Document::new(name, DocType::Original);
        for (path, text) in clauses {
            let block = clause(&doc, path, text);
            doc.push_root(block);
        }
        doc
    }

    fn merged_texts(report: &MergeReport) -> Vec<String> {
        flatten(&report.merged.blocks)
            .iter()
            .map(|n| n.block.canonical_text().to_string())
            .collect()
    }

    const TERM_12: &str = "Term. Twelve (12) months.";
    const TERM_24: &str = "Term. Twenty-four (24) months.";
    const PARTIES: &str = "Parties. This Agreement is made between Lender and Borrower.";

    #[test]
    fn two_way_term_edit_is_a_conflict() {
        let base = document("lease", &[("1", PARTIES), ("2", TERM_12)]);
        let incoming = document("lease v2", &[("1", PARTIES), ("2", TERM_24)]);
        let report = MergeEngine::default().merge(&base, &incoming, None).unwrap();

        assert_eq!(report.summary.total_decisions, 2);
        assert_eq!(report.summary.unchanged_count, 1);
        assert_eq!(report.summary.auto_merged_count, 0);
        assert_eq!(report.summary.conflict_count, 1);
        assert_eq!(report.summary.outstanding_conflicts, 1);

        let conflict = &report.conflicts[0];
        assert_eq!(conflict.kind, ConflictKind::Content);
        assert_eq!(conflict.base_text.as_deref(), Some(TERM_12));
        assert_eq!(conflict.incoming_text.as_deref(), Some(TERM_24));
        assert_eq!(conflict.structural_path, "2");

        let result = &report.results[1];
        assert_eq!(result.outcome, MergeOutcome::Conflict);
        assert_eq!(result.change, DiffKind::Modified);
        assert!(result.block.is_none());
        assert_eq!(result.conflict_detail.map(|d| d.conflict_id), Some(conflict.id));

        assert_eq!(merged_texts(&report), vec![PARTIES]);
    }

    #[test]
    fn three_way_takes_the_only_changed_side() {
        let ancestor = document("lease", &[("1", PARTIES), ("2", TERM_12)]);
        let base = document("lease", &[("1", PARTIES), ("2", TERM_12)]);
        let incoming = document("lease v2", &[("1", PARTIES), ("2", TERM_24)]);

        let report = MergeEngine::default()
            .merge(&base, &incoming, Some(&ancestor))
            .unwrap();
        assert_eq!(report.summary.conflict_count, 0);
        assert_eq!(report.summary.auto_merged_count, 1);
        assert_eq!(report.results[1].outcome, MergeOutcome::AcceptedIncoming);
        assert_eq!(merged_texts(&report), vec![PARTIES, TERM_24]);

        let report = MergeEngine::default()
            .merge(&incoming, &base, Some(&ancestor))
            .unwrap();
        assert_eq!(report.results[1].outcome, MergeOutcome::AcceptedBase);
        assert_eq!(merged_texts(&report), vec![PARTIES, TERM_24]);
    }

    #[test]
    fn three_way_both_changed_is_a_conflict() {
        let ancestor = document("lease", &[("2", TERM_12)]);
        let base = document("lease", &[("2", "Term. Eighteen (18) months.")]);
        let incoming = document("lease v2", &[("2", TERM_24)]);
        let report = MergeEngine::default()
            .merge(&base, &incoming, Some(&ancestor))
            .unwrap();
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].ancestor_text.as_deref(), Some(TERM_12));
    }

    #[test]
    fn insert_only_merges_without_conflict() {
        let base = document("nda", &[("1", "One."), ("2", "Two.")]);
        let incoming = document("nda", &[("1", "One."), ("1A", "Inserted."), ("2", "Two.")]);
        let report = MergeEngine::default().merge(&base, &incoming, None).unwrap();
        assert_eq!(report.summary.conflict_count, 0);
        assert_eq!(report.summary.auto_merged_count, 1);
        assert_eq!(report.summary.unchanged_count, 2);
        assert_eq!(merged_texts(&report), vec!["One.", "Inserted.", "Two."]);
    }

    #[test]
    fn deletion_applies_silently_by_default() {
        let base = document("nda", &[("1", "One."), ("2", "Two."), ("3", "Three.")]);
        let incoming = document("nda", &[("1", "One."), ("3", "Three.")]);
        let report = MergeEngine::default().merge(&base, &incoming, None).unwrap();
        assert_eq!(report.summary.conflict_count, 0);
        assert_eq!(report.results[1].change, DiffKind::Deleted);
        assert_eq!(report.results[1].outcome, MergeOutcome::AutoMerged);
        assert!(report.results[1].block.is_none());
        assert_eq!(merged_texts(&report), vec!["One.", "Three."]);
    }

    #[test]
    fn preserve_deletions_surfaces_a_conflict() {
        let base = document("nda", &[("1", "One."), ("2", "Two.")]);
        let incoming = document("nda", &[("1", "One.")]);
        let engine = MergeEngine::new(MergeConfig::preserving_deletions());
        let report = engine.merge(&base, &incoming, None).unwrap();
        assert_eq!(report.summary.conflict_count, 1);
        assert_eq!(report.conflicts[0].kind, ConflictKind::Deletion);
        assert!(report.conflicts[0].incoming_text.is_none());
    }

    #[test]
    fn delete_versus_modify_is_a_conflict() {
        let ancestor = document("loan", &[("1", "Kept."), ("2", "Payment. Borrower pays monthly.")]);
        let base = document("loan", &[("1", "Kept."), ("2", "Payment. Borrower pays weekly.")]);
        let incoming = document("loan", &[("1", "Kept.")]);
        let report = MergeEngine::default()
            .merge(&base, &incoming, Some(&ancestor))
            .unwrap();
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].kind, ConflictKind::DeleteModify);
        assert_eq!(report.results[1].change, DiffKind::Deleted);
    }

    #[test]
    fn unchanged_deletion_with_ancestor_is_applied() {
        let ancestor = document("loan", &[("1", "Kept."), ("2", "Obsolete.")]);
        let base = ancestor.clone();
        let incoming = document("loan", &[("1", "Kept.")]);
        let report = MergeEngine::default()
            .merge(&base, &incoming, Some(&ancestor))
            .unwrap();
        assert_eq!(report.summary.conflict_count, 0);
        assert_eq!(merged_texts(&report), vec!["Kept."]);
    }

    #[test]
    fn base_insertion_survives_three_way() {
        let ancestor = document("loan", &[("1", "Kept.")]);
        let base = document("loan", &[("1", "Kept."), ("2", "Added by base.")]);
        let incoming = ancestor.clone();
        let report = MergeEngine::default()
            .merge(&base, &incoming, Some(&ancestor))
            .unwrap();
        assert_eq!(report.results[1].change, DiffKind::Inserted);
        assert_eq!(merged_texts(&report), vec!["Kept.", "Added by base."]);
    }

    #[test]
    fn merged_document_is_well_formed() {
        let base = document("msa", &[("1", PARTIES), ("2", TERM_12)]);
        let incoming = document("msa", &[("1", PARTIES), ("2", TERM_12), ("3", "Notices.")]);
        let report = MergeEngine::default().merge(&base, &incoming, None).unwrap();
        let merged = &report.merged;
        assert_eq!(merged.doc_type, DocType::Merged);
        assert!(merged.validate().is_valid());
        assert_eq!(merged.blocks[0].id(), base.blocks[0].id());
        assert_eq!(merged.blocks[2].id(), incoming.blocks[2].id());
        assert!(merged.blocks.iter().all(|b| b.document_id == merged.id));
    }

    #[test]
    fn inputs_are_not_modified() {
        let base = document("msa", &[("1", PARTIES), ("2", TERM_12)]);
        let incoming = document("msa", &[("2", TERM_24)]);
        let (base_before, incoming_before) = (base.clone(), incoming.clone());
        MergeEngine::default().merge(&base, &incoming, None).unwrap();
        assert_eq!(base, base_before);
        assert_eq!(incoming, incoming_before);
    }

    #[test]
    fn incompatible_contract_is_rejected() {
        let base = document("a", &[("1", "One.")]);
        let mut incoming = document("b", &[("1", "One.")]);
        incoming.hash_contract_version = "0.9.0".into();
        let err = MergeEngine::default().merge(&base, &incoming, None).unwrap_err();
        assert!(matches!(err, MergeError::IncompatibleHashContract { .. }));
    }

    #[test]
    fn malformed_input_names_its_side() {
        let base = document("a", &[("1", "One.")]);
        let mut incoming = document("b", &[("1", "One.")]);
        incoming.blocks[0].position_index = 7;
        let err = MergeEngine::default().merge(&base, &incoming, None).unwrap_err();
        assert!(matches!(err, MergeError::InvalidInput { side: "incoming", .. }));
    }

    #[test]
    fn insertion_with_renumbering_keeps_unchanged_clause() {
        let confidentiality = "Confidentiality. Each party shall keep the other party's information secret.";
        let notices = "Notices. All notices shall be in writing.";
        let base = document("nda", &[("1.1", "Definitions."), ("1.2", confidentiality)]);
        let incoming = document(
            "nda v2",
            &[("1.1", "Definitions."), ("1.2", notices), ("1.3", confidentiality)],
        );
        let report = MergeEngine::default().merge(&base, &incoming, None).unwrap();

        assert_eq!(report.summary.conflict_count, 0);
        assert_eq!(report.summary.unchanged_count, 2);
        assert_eq!(report.summary.auto_merged_count, 1);
        assert_eq!(merged_texts(&report), vec!["Definitions.", notices, confidentiality]);

        let paths: Vec<String> = flatten(&report.merged.blocks)
            .iter()
            .map(|n| n.block.structural_path().to_string())
            .collect();
        assert_eq!(paths, vec!["1.1", "1.2", "1.3"]);
        assert_eq!(report.results[2].taken_from, Some(MergeSide::Incoming));
    }

    #[test]
    fn three_way_keeps_base_renumbering() {
        let ancestor = document("msa", &[("1", "Scope."), ("2", "Fees are payable monthly.")]);
        let base = document(
            "msa",
            &[("1", "Scope."), ("2", "Audit rights."), ("3", "Fees are payable monthly.")],
        );
        let incoming = ancestor.clone();
        let report = MergeEngine::default()
            .merge(&base, &incoming, Some(&ancestor))
            .unwrap();
        assert_eq!(report.summary.conflict_count, 0);
        let paths: Vec<String> = flatten(&report.merged.blocks)
            .iter()
            .map(|n| n.block.structural_path().to_string())
            .collect();
        assert_eq!(paths, vec!["1", "2", "3"]);
    }

    fn fee_table(doc: &Document, caption: &str) -> Block {
        let mut table = Block::new(doc.id, BlockType::Table, "1", caption);
        let mut row = Block::new(doc.id, BlockType::TableRow, "", "");
        row.push_child(Block::new(doc.id, BlockType::TableCell, "", "$10"));
        table.push_child(row);
        table
    }

    #[test]
    fn cells_of_a_conflicting_table_report_no_block() {
        let mut base = document("fees", &[("0", "Intro.")]);
        let table = fee_table(&base, "Fees payable");
        base.push_root(table);
        let mut incoming = document("fees", &[("0", "Intro.")]);
        let table = fee_table(&incoming, "Fees payable monthly");
        incoming.push_root(table);

        let report = MergeEngine::default().merge(&base, &incoming, None).unwrap();
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.results[1].outcome, MergeOutcome::Conflict);
        assert_eq!(report.results[2].change, DiffKind::Equal);
        assert!(report.results[2].block.is_none());
        assert!(report.results[3].block.is_none());

        let placed = report.results.iter().filter(|r| r.block.is_some()).count();
        assert_eq!(placed, report.merged.block_count());

        let mut ledger = crate::ResolutionLedger::new(report.clone());
        ledger
            .resolve(
                report.conflicts[0].id,
                crate::ResolutionChoice::AcceptedIncoming,
                "alice",
            )
            .unwrap();
        let resolved = ledger.report();
        assert!(resolved.results.iter().all(|r| r.block.is_some()));
        assert_eq!(resolved.merged.block_count(), 4);
    }

    #[test]
    fn slot_without_either_side_is_an_invariant_violation() {
        let doc = document("a", &[("1", "One.")]);
        let slot = MergeSlot {
            parent: None,
            base: None,
            incoming: None,
            ancestor: Some(doc.blocks[0].clone()),
        };
        assert!(matches!(
            MergeEngine::default().decide(0, &slot, true),
            Err(MergeError::InvariantViolation(_))
        ));
    }

    proptest! {
        #[test]
        fn self_merge_changes_nothing(n in 1usize..8) {
            let clauses: Vec<(String, String)> = (0..n)
                .map(|i| (format!("{}", i + 1), format!("Clause {i} governs item {i}.")))
                .collect();
            let refs: Vec<(&str, &str)> = clauses.iter().map(|(p, t)| (p.as_str(), t.as_str())).collect();
            let doc = document("self", &refs);
            let report = MergeEngine::default().merge(&doc, &doc, None).unwrap();
            prop_assert_eq!(report.summary.conflict_count, 0);
            prop_assert_eq!(report.summary.unchanged_count, n);
        }

        #[test]
        fn pure_insertions_are_all_auto_merged(
            n in 1usize..6,
            inserts in prop::collection::vec(0usize..6, 0..4),
        ) {
            let base_clauses: Vec<(String, String)> = (0..n)
                .map(|i| (format!("{}", i + 1), format!("Original clause number {i}.")))
                .collect();
            let mut incoming_clauses = base_clauses.clone();
            for (k, at) in inserts.iter().enumerate() {
                let at = (*at).min(incoming_clauses.len());
                incoming_clauses.insert(at, (format!("new-{k}"), format!("Inserted clause {k}.")));
            }
            let as_refs = |v: &[(String, String)]| -> Document {
                let refs: Vec<(&str, &str)> = v.iter().map(|(p, t)| (p.as_str(), t.as_str())).collect();
                document("doc", &refs)
            };
            let base = as_refs(&base_clauses);
            let incoming = as_refs(&incoming_clauses);
            let report = MergeEngine::default().merge(&base, &incoming, None).unwrap();
            prop_assert_eq!(report.summary.conflict_count, 0);
            prop_assert_eq!(report.summary.auto_merged_count, inserts.len());
            prop_assert_eq!(report.merged.block_count(), n + inserts.len());
        }
    }
}
