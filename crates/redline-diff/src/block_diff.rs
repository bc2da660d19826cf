//! Block-level structural diff.
//!
//! Every block of either forest appears in exactly one [`BlockDiff`]. Entries
//! follow left document order; each insertion is placed right after the
//! entry of its nearest preceding paired block in right order, so the
//! sequence reads as a redline. Pairs whose path changed are flagged
//! `moved` but keep their equal/modified kind.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use redline_types::{AnchorSignature, Block, Document};

use crate::align::Alignment;
use crate::error::{DiffError, DiffResult};
use crate::token_diff::{diff_tokens, TokenChange};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    Equal,
    Inserted,
    Deleted,
    Modified,
}

/// The alignment of one left block with zero or one right block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockDiff {
    pub kind: DiffKind,
    /// Absent iff `kind` is inserted. Shallow copy, no children.
    pub left_block: Option<Block>,
    /// Absent iff `kind` is deleted. Shallow copy, no children.
    pub right_block: Option<Block>,
    /// The left block's anchor, for equal and modified pairs.
    pub anchor_signature: Option<AnchorSignature>,
    /// Token-level changes, populated for modified pairs.
    pub token_changes: Vec<TokenChange>,
    /// Equal or modified pair whose structural path changed while the text
    /// stayed recognisably the same: renumbered or moved.
    #[serde(default)]
    pub moved: bool,
}

/// Ordered result of comparing two forests.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuralDiff {
    pub left_document_id: Option<Uuid>,
    pub right_document_id: Option<Uuid>,
    pub diffs: Vec<BlockDiff>,
    pub equal_count: usize,
    pub inserted_count: usize,
    pub deleted_count: usize,
    pub modified_count: usize,
    /// inserted + deleted + modified.
    pub changed_count: usize,
    /// Entries flagged `moved`; they also count under their kind.
    #[serde(default)]
    pub moved_count: usize,
}

impl StructuralDiff {
    /// Returns `true` if nothing changed.
    pub fn is_identical(&self) -> bool {
        self.changed_count == 0
    }

    pub fn len(&self) -> usize {
        self.diffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diffs.is_empty()
    }

    /// Entries of one kind, in diff order.
    pub fn of_kind(&self, kind: DiffKind) -> impl Iterator<Item = &BlockDiff> {
        self.diffs.iter().filter(move |d| d.kind == kind)
    }

    fn push(&mut self, diff: BlockDiff) {
        match diff.kind {
            DiffKind::Equal => self.equal_count += 1,
            DiffKind::Inserted => self.inserted_count += 1,
            DiffKind::Deleted => self.deleted_count += 1,
            DiffKind::Modified => self.modified_count += 1,
        }
        if diff.moved {
            self.moved_count += 1;
        }
        self.changed_count = self.inserted_count + self.deleted_count + self.modified_count;
        self.diffs.push(diff);
    }
}

/// Compare two documents.
///
/// Rejects documents hashed under different contracts and malformed trees
/// before any alignment happens.
pub fn diff_documents(left: &Document, right: &Document) -> DiffResult<StructuralDiff> {
    if left.hash_contract_version != right.hash_contract_version {
        return Err(DiffError::IncompatibleHashContract {
            left: left.hash_contract_version.clone(),
            right: right.hash_contract_version.clone(),
        });
    }
    left.ensure_valid()
        .map_err(|source| DiffError::InvalidTree { side: "left", source })?;
    right
        .ensure_valid()
        .map_err(|source| DiffError::InvalidTree { side: "right", source })?;

    let mut diff = diff_forests(&left.blocks, &right.blocks);
    diff.left_document_id = Some(left.id);
    diff.right_document_id = Some(right.id);
    tracing::info!(
        left = %left.id,
        right = %right.id,
        changed = diff.changed_count,
        equal = diff.equal_count,
        "diff complete"
    );
    Ok(diff)
}

/// Compare two already-validated forests.
pub fn diff_forests(left: &[Block], right: &[Block]) -> StructuralDiff {
    let alignment = Alignment::align(left, right);

    // Right-only blocks grouped under the left index of their nearest
    // preceding paired block; those with none lead the sequence.
    let mut leading: Vec<usize> = Vec::new();
    let mut trailing: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut last_paired: Option<usize> = None;
    for j in 0..alignment.right().len() {
        match alignment.left_of(j) {
            Some(i) => last_paired = Some(i),
            None => match last_paired {
                Some(i) => trailing.entry(i).or_default().push(j),
                None => leading.push(j),
            },
        }
    }

    let mut diff = StructuralDiff::default();
    let inserted = |j: usize| BlockDiff {
        kind: DiffKind::Inserted,
        left_block: None,
        right_block: Some(alignment.right()[j].block.shallow_clone()),
        anchor_signature: None,
        token_changes: Vec::new(),
        moved: false,
    };

    for j in leading {
        diff.push(inserted(j));
    }
    for (i, node) in alignment.left().iter().enumerate() {
        let left_block = node.block;
        let entry = match alignment.right_of(i) {
            Some(j) => {
                let right_block = alignment.right()[j].block;
                let same = left_block.clause_hash() == right_block.clause_hash();
                let moved = alignment.is_move(i);
                tracing::debug!(
                    anchor = %left_block.anchor_signature().short_hex(),
                    method = ?alignment.method(i),
                    same,
                    moved,
                    "paired block"
                );
                BlockDiff {
                    kind: if same { DiffKind::Equal } else { DiffKind::Modified },
                    left_block: Some(left_block.shallow_clone()),
                    right_block: Some(right_block.shallow_clone()),
                    anchor_signature: Some(left_block.anchor_signature()),
                    token_changes: if same {
                        Vec::new()
                    } else {
                        diff_tokens(left_block.tokens(), right_block.tokens())
                    },
                    moved,
                }
            }
            None => BlockDiff {
                kind: DiffKind::Deleted,
                left_block: Some(left_block.shallow_clone()),
                right_block: None,
                anchor_signature: None,
                token_changes: Vec::new(),
                moved: false,
            },
        };
        diff.push(entry);
        if let Some(js) = trailing.get(&i) {
            for &j in js {
                diff.push(inserted(j));
            }
        }
    }

    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use redline_types::{BlockType, DocType};

    fn doc_with(blocks: Vec<Block>) -> Document {
        let mut doc = Document::new("test", DocType::Original);
        for b in blocks {
            doc.push_root(b);
        }
        doc
    }

    fn clause(path: &str, text: &str) -> Block {
        Block::new(Uuid::nil(), BlockType::Clause, path, text)
    }

    fn section(path: &str, text: &str, children: Vec<Block>) -> Block {
        Block::new(Uuid::nil(), BlockType::Section, path, text).with_children(children)
    }

    fn kinds(diff: &StructuralDiff) -> Vec<DiffKind> {
        diff.diffs.iter().map(|d| d.kind).collect()
    }

    fn sample() -> Document {
        doc_with(vec![
            section(
                "1",
                "Definitions",
                vec![
                    clause("1.1", "\"Agreement\" means this agreement."),
                    clause("1.2", "\"Business Day\" means a day banks are open."),
                ],
            ),
            section("2", "Term", vec![clause("2.1", "Term. Twelve (12) months.")]),
        ])
    }

    #[test]
    fn identical_documents_are_all_equal() {
        let doc = sample();
        let diff = diff_documents(&doc, &doc).unwrap();
        assert!(diff.is_identical());
        assert_eq!(diff.equal_count, 5);
        assert!(diff.diffs.iter().all(|d| d.kind == DiffKind::Equal));
        assert!(diff.diffs.iter().all(|d| d.anchor_signature.is_some()));
    }

    #[test]
    fn term_scenario_is_modified() {
        let base = sample();
        let mut incoming = base.clone();
        incoming.blocks[1].children[0].patch("Term. Twenty-four (24) months.", "Term. Twenty-four (24) months.");

        let diff = diff_documents(&base, &incoming).unwrap();
        assert_eq!(diff.modified_count, 1);
        assert_eq!(diff.changed_count, 1);
        let modified = diff.of_kind(DiffKind::Modified).next().unwrap();
        let left = modified.left_block.as_ref().unwrap();
        let right = modified.right_block.as_ref().unwrap();
        assert_eq!(left.structural_path(), "2.1");
        assert_ne!(left.clause_hash(), right.clause_hash());
        assert_eq!(modified.anchor_signature, Some(left.anchor_signature()));
        assert!(!modified.token_changes.is_empty());
    }

    #[test]
    fn tail_edit_of_long_clause_keeps_anchor() {
        let head = "The Borrower shall indemnify each Finance Party against any cost, loss or liability incurred by it as a result of the occurrence of any Event of Default";
        let base = doc_with(vec![clause("9", &format!("{head}."))]);
        let mut incoming = base.clone();
        incoming.blocks[0].patch(format!("{head} or Default."), format!("{head} or Default."));
        assert_eq!(
            base.blocks[0].anchor_signature(),
            incoming.blocks[0].anchor_signature()
        );
        let diff = diff_documents(&base, &incoming).unwrap();
        assert_eq!(kinds(&diff), vec![DiffKind::Modified]);
    }

    #[test]
    fn insertion_is_placed_after_preceding_pair() {
        let base = doc_with(vec![section(
            "1",
            "Definitions",
            vec![clause("1.1", "first"), clause("1.2", "second"), clause("1.4", "fourth")],
        )]);
        let mut incoming = base.clone();
        let new_clause = clause("1.3", "third, newly added");
        incoming.blocks[0].children.insert(2, new_clause);
        let blocks = incoming.blocks.clone();
        incoming.set_blocks(blocks);

        let diff = diff_forests(&base.blocks, &incoming.blocks);
        assert_eq!(
            kinds(&diff),
            vec![
                DiffKind::Equal,
                DiffKind::Equal,
                DiffKind::Equal,
                DiffKind::Inserted,
                DiffKind::Equal,
            ]
        );
        let inserted = &diff.diffs[3];
        assert_eq!(inserted.right_block.as_ref().unwrap().structural_path(), "1.3");
        assert!(inserted.left_block.is_none());
        assert!(inserted.anchor_signature.is_none());
        assert_eq!(diff.inserted_count, 1);
    }

    #[test]
    fn leading_insertion_precedes_everything() {
        let base = doc_with(vec![clause("1", "one")]);
        let mut incoming = base.clone();
        let mut blocks = vec![clause("0", "preamble")];
        blocks.extend(incoming.blocks.clone());
        incoming.set_blocks(blocks);
        let diff = diff_forests(&base.blocks, &incoming.blocks);
        assert_eq!(kinds(&diff), vec![DiffKind::Inserted, DiffKind::Equal]);
    }

    #[test]
    fn deletion_and_empty_sides() {
        let doc = sample();
        let empty = Document::new("empty", DocType::Redline);

        let removed = diff_documents(&doc, &empty).unwrap();
        assert_eq!(removed.deleted_count, 5);
        assert!(removed.diffs.iter().all(|d| d.right_block.is_none()));

        let added = diff_documents(&empty, &doc).unwrap();
        assert_eq!(added.inserted_count, 5);
        assert_eq!(added.changed_count, 5);
        let paths: Vec<&str> = added
            .diffs
            .iter()
            .map(|d| d.right_block.as_ref().unwrap().structural_path())
            .collect();
        assert_eq!(paths, vec!["1", "1.1", "1.2", "2", "2.1"]);
    }

    #[test]
    fn incompatible_contract_is_rejected() {
        let doc = sample();
        let mut other = doc.clone();
        other.hash_contract_version = "0.1.0".into();
        assert!(matches!(
            diff_documents(&doc, &other),
            Err(DiffError::IncompatibleHashContract { .. })
        ));
    }

    #[test]
    fn malformed_tree_is_rejected() {
        let doc = sample();
        let mut bad = doc.clone();
        bad.blocks[0].children[1].position_index = 7;
        assert!(matches!(
            diff_documents(&doc, &bad),
            Err(DiffError::InvalidTree { side: "right", .. })
        ));
    }

    #[test]
    fn diff_blocks_are_shallow() {
        let doc = sample();
        let diff = diff_forests(&doc.blocks, &doc.blocks);
        assert!(diff
            .diffs
            .iter()
            .all(|d| d.left_block.as_ref().unwrap().children.is_empty()));
    }

    #[test]
    fn diff_serializes_with_snake_case_kinds() {
        let base = sample();
        let empty = Document::new("empty", DocType::Redline);
        let diff = diff_documents(&base, &empty).unwrap();
        let value = serde_json::to_value(&diff).unwrap();
        assert_eq!(value["diffs"][0]["kind"], "deleted");
        assert!(value["diffs"][0]["right_block"].is_null());
        assert_eq!(value["changed_count"], 5);
    }

    #[test]
    fn renumbering_insertion_keeps_unchanged_clause_equal() {
        let confidentiality = "Confidentiality. Each party shall keep the other party's information secret.";
        let base = doc_with(vec![clause("1.1", "Definitions."), clause("1.2", confidentiality)]);
        let incoming = doc_with(vec![
            clause("1.1", "Definitions."),
            clause("1.2", "Notices. All notices shall be in writing."),
            clause("1.3", confidentiality),
        ]);

        let diff = diff_documents(&base, &incoming).unwrap();
        assert_eq!(
            kinds(&diff),
            vec![DiffKind::Equal, DiffKind::Inserted, DiffKind::Equal]
        );
        assert_eq!(diff.changed_count, 1);
        assert_eq!(diff.moved_count, 1);

        let inserted = diff.of_kind(DiffKind::Inserted).next().unwrap();
        assert_eq!(
            inserted.right_block.as_ref().unwrap().canonical_text(),
            "Notices. All notices shall be in writing."
        );
        let moved = &diff.diffs[2];
        assert!(moved.moved);
        assert_eq!(moved.left_block.as_ref().unwrap().structural_path(), "1.2");
        assert_eq!(moved.right_block.as_ref().unwrap().structural_path(), "1.3");
        assert!(!diff.diffs[0].moved);
    }

    #[test]
    fn rewritten_clause_at_same_path_is_delete_plus_insert() {
        let base = doc_with(vec![clause("3", "Governing law. England and Wales.")]);
        let incoming = doc_with(vec![clause("3", "Notices. All notices shall be in writing.")]);
        let diff = diff_documents(&base, &incoming).unwrap();
        // No pair precedes the new clause, so it leads the sequence.
        assert_eq!(kinds(&diff), vec![DiffKind::Inserted, DiffKind::Deleted]);
        assert_eq!(diff.modified_count, 0);
    }

    fn arb_texts() -> impl Strategy<Value = Vec<String>> {
        proptest::collection::vec("[A-Za-z ,.]{1,40}", 1..12)
    }

    fn doc_from_texts(texts: &[String]) -> Document {
        doc_with(
            texts
                .iter()
                .enumerate()
                .map(|(i, t)| clause(&(i + 1).to_string(), t))
                .collect(),
        )
    }

    proptest! {
        #[test]
        fn self_diff_is_all_equal(texts in arb_texts()) {
            let doc = doc_from_texts(&texts);
            let diff = diff_forests(&doc.blocks, &doc.blocks);
            prop_assert_eq!(diff.changed_count, 0);
            prop_assert_eq!(diff.equal_count, texts.len());
        }

        #[test]
        fn single_edit_is_single_modification(
            texts in arb_texts(),
            pick in any::<proptest::sample::Index>(),
        ) {
            let base = doc_from_texts(&texts);
            let i = pick.index(texts.len());
            prop_assume!(!base.blocks[i].tokens().is_empty());
            let amended = format!("{} amended", base.blocks[i].canonical_text());

            let mut incoming = base.clone();
            incoming.blocks[i].patch(amended.clone(), amended);

            let diff = diff_forests(&base.blocks, &incoming.blocks);
            prop_assert_eq!(diff.modified_count, 1);
            prop_assert_eq!(diff.changed_count, 1);
            prop_assert_eq!(diff.equal_count, texts.len() - 1);
        }

        #[test]
        fn identity_survives_wire_roundtrip(texts in arb_texts()) {
            let doc = doc_from_texts(&texts);
            let json = serde_json::to_string(&doc).unwrap();
            let back: Document = serde_json::from_str(&json).unwrap();
            prop_assert!(back.validate().is_valid());
            for (a, b) in doc.blocks.iter().zip(&back.blocks) {
                prop_assert_eq!(a.anchor_signature(), b.anchor_signature());
                prop_assert_eq!(a.clause_hash(), b.clause_hash());
            }
            let diff = diff_forests(&doc.blocks, &back.blocks);
            prop_assert!(diff.is_identical());
        }
    }
}
