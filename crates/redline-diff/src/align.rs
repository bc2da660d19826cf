//! Block alignment between two forests.
//!
//! Pairs blocks in five passes, each only considering blocks the earlier
//! passes left unpaired:
//!
//! 1. **Anchor** -- anchors that are unique within each forest pair directly.
//! 2. **Position** -- an anchor repeated inside one forest is keyed by
//!    `(anchor, position_index, occurrence)`, so verbatim boilerplate
//!    degrades to a positional match.
//! 3. **Content** -- a clause hash unique among the unpaired blocks of each
//!    side pairs blocks of the same type whose path changed (renumbered or
//!    moved).
//! 4. **Similarity** -- same-type blocks whose token similarity reaches
//!    [`MATCH_SIMILARITY`], best score first.
//! 5. **Structure** -- same block type, structural path and position under
//!    parents that are themselves paired (or both roots), provided the texts
//!    still reach [`STRUCTURE_SIMILARITY`]. Short clauses, whose anchor
//!    covers their whole text, are re-paired here after an edit.
//!
//! Every pass walks the left forest in document order and breaks ties by
//! index, so the result is deterministic.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use redline_types::{flatten, AnchorSignature, Block, BlockType, ClauseHash, FlatNode};

use crate::similarity::{block_similarity, MATCH_SIMILARITY, MOVE_SIMILARITY, STRUCTURE_SIMILARITY};

/// How a pair of blocks was matched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    Anchor,
    Position,
    Content,
    Similarity,
    Structure,
}

/// Pairing between the flattened left and right forests.
#[derive(Debug)]
pub struct Alignment<'a> {
    left: Vec<FlatNode<'a>>,
    right: Vec<FlatNode<'a>>,
    left_to_right: Vec<Option<usize>>,
    right_to_left: Vec<Option<usize>>,
    methods: Vec<Option<MatchMethod>>,
}

type PositionKey = (AnchorSignature, u32, usize);
type StructureKey<'s> = (BlockType, &'s str, u32, Option<usize>);

impl<'a> Alignment<'a> {
    /// Align two forests.
    pub fn align(left: &'a [Block], right: &'a [Block]) -> Self {
        let left = flatten(left);
        let right = flatten(right);
        let mut alignment = Self {
            left_to_right: vec![None; left.len()],
            right_to_left: vec![None; right.len()],
            methods: vec![None; left.len()],
            left,
            right,
        };

        let repeated = repeated_anchors(&alignment.left, &alignment.right);
        alignment.pair_unique_anchors(&repeated);
        alignment.pair_repeated_anchors(&repeated);
        alignment.pair_by_content();
        alignment.pair_by_similarity();
        alignment.pair_by_structure();
        alignment
    }

    /// Left blocks in document order.
    pub fn left(&self) -> &[FlatNode<'a>] {
        &self.left
    }

    /// Right blocks in document order.
    pub fn right(&self) -> &[FlatNode<'a>] {
        &self.right
    }

    /// Right partner of the left block at flat index `i`.
    pub fn right_of(&self, i: usize) -> Option<usize> {
        self.left_to_right.get(i).copied().flatten()
    }

    /// Left partner of the right block at flat index `j`.
    pub fn left_of(&self, j: usize) -> Option<usize> {
        self.right_to_left.get(j).copied().flatten()
    }

    /// How the left block at `i` was paired, if it was.
    pub fn method(&self, i: usize) -> Option<MatchMethod> {
        self.methods.get(i).copied().flatten()
    }

    /// Whether the left block at `i` kept its identity under a different
    /// structural path: renumbered or moved, with its text at least
    /// [`MOVE_SIMILARITY`] alike.
    pub fn is_move(&self, i: usize) -> bool {
        let Some(j) = self.right_of(i) else {
            return false;
        };
        let (left, right) = (self.left[i].block, self.right[j].block);
        left.structural_path() != right.structural_path()
            && (left.clause_hash() == right.clause_hash()
                || block_similarity(left, right) >= MOVE_SIMILARITY)
    }

    /// Number of paired blocks.
    pub fn pair_count(&self) -> usize {
        self.left_to_right.iter().filter(|p| p.is_some()).count()
    }

    fn pair(&mut self, i: usize, j: usize, method: MatchMethod) {
        self.left_to_right[i] = Some(j);
        self.right_to_left[j] = Some(i);
        self.methods[i] = Some(method);
    }

    fn pair_unique_anchors(&mut self, repeated: &HashSet<AnchorSignature>) {
        let by_anchor: HashMap<AnchorSignature, usize> = self
            .right
            .iter()
            .enumerate()
            .filter(|(_, n)| !repeated.contains(&n.block.anchor_signature()))
            .map(|(j, n)| (n.block.anchor_signature(), j))
            .collect();

        for i in 0..self.left.len() {
            let anchor = self.left[i].block.anchor_signature();
            if repeated.contains(&anchor) {
                continue;
            }
            if let Some(&j) = by_anchor.get(&anchor) {
                self.pair(i, j, MatchMethod::Anchor);
            }
        }
    }

    fn pair_repeated_anchors(&mut self, repeated: &HashSet<AnchorSignature>) {
        if repeated.is_empty() {
            return;
        }
        let right_keys = position_keys(&self.right, repeated);
        let by_key: HashMap<PositionKey, usize> = right_keys
            .into_iter()
            .enumerate()
            .filter_map(|(j, k)| k.map(|k| (k, j)))
            .collect();

        let left_keys = position_keys(&self.left, repeated);
        for (i, key) in left_keys.into_iter().enumerate() {
            let Some(key) = key else { continue };
            if let Some(&j) = by_key.get(&key) {
                self.pair(i, j, MatchMethod::Position);
            }
        }
    }

    fn pair_by_content(&mut self) {
        let right = unique_unpaired_hashes(&self.right, &self.right_to_left);
        if right.is_empty() {
            return;
        }
        let left = unique_unpaired_hashes(&self.left, &self.left_to_right);
        for i in 0..self.left.len() {
            let block = self.left[i].block;
            if left.get(&(block.block_type(), block.clause_hash())) != Some(&i) {
                continue;
            }
            if let Some(&j) = right.get(&(block.block_type(), block.clause_hash())) {
                self.pair(i, j, MatchMethod::Content);
            }
        }
    }

    fn pair_by_similarity(&mut self) {
        let right_open: Vec<usize> = (0..self.right.len())
            .filter(|&j| self.right_to_left[j].is_none() && !self.right[j].block.tokens().is_empty())
            .collect();
        if right_open.is_empty() {
            return;
        }

        let mut scored: Vec<(f64, usize, usize)> = Vec::new();
        for i in 0..self.left.len() {
            let left = self.left[i].block;
            if self.left_to_right[i].is_some() || left.tokens().is_empty() {
                continue;
            }
            for &j in &right_open {
                let right = self.right[j].block;
                if right.block_type() != left.block_type() {
                    continue;
                }
                let score = block_similarity(left, right);
                if score >= MATCH_SIMILARITY {
                    scored.push((score, i, j));
                }
            }
        }
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

        for (_, i, j) in scored {
            if self.left_to_right[i].is_none() && self.right_to_left[j].is_none() {
                self.pair(i, j, MatchMethod::Similarity);
            }
        }
    }

    fn pair_by_structure(&mut self) {
        let mut candidates: HashMap<StructureKey<'a>, Vec<usize>> = HashMap::new();
        for (j, node) in self.right.iter().enumerate() {
            if self.right_to_left[j].is_some() {
                continue;
            }
            let block: &'a Block = node.block;
            candidates
                .entry(structure_key(block, node.parent))
                .or_default()
                .push(j);
        }
        if candidates.is_empty() {
            return;
        }

        for i in 0..self.left.len() {
            if self.left_to_right[i].is_some() {
                continue;
            }
            let node = self.left[i];
            let right_parent = match node.parent {
                None => None,
                Some(p) => match self.left_to_right[p] {
                    Some(rp) => Some(rp),
                    None => continue,
                },
            };
            let key = structure_key(node.block, right_parent);
            let Some(list) = candidates.get_mut(&key) else {
                continue;
            };
            let right = &self.right;
            let found = list.iter().position(|&j| {
                block_similarity(node.block, right[j].block) >= STRUCTURE_SIMILARITY
            });
            if let Some(pos) = found {
                let j = list.remove(pos);
                self.pair(i, j, MatchMethod::Structure);
            }
        }
    }
}

fn structure_key(block: &Block, parent: Option<usize>) -> StructureKey<'_> {
    (
        block.block_type(),
        block.structural_path(),
        block.position_index,
        parent,
    )
}

/// `(type, clause hash)` keys held by exactly one unpaired, non-empty block.
fn unique_unpaired_hashes(
    nodes: &[FlatNode<'_>],
    partners: &[Option<usize>],
) -> HashMap<(BlockType, ClauseHash), usize> {
    let mut seen: HashMap<(BlockType, ClauseHash), Option<usize>> = HashMap::new();
    for (index, node) in nodes.iter().enumerate() {
        if partners[index].is_some() || node.block.canonical_text().is_empty() {
            continue;
        }
        seen.entry((node.block.block_type(), node.block.clause_hash()))
            .and_modify(|slot| *slot = None)
            .or_insert(Some(index));
    }
    seen.into_iter()
        .filter_map(|(key, index)| index.map(|i| (key, i)))
        .collect()
}

/// Anchors occurring more than once inside either forest.
fn repeated_anchors(left: &[FlatNode<'_>], right: &[FlatNode<'_>]) -> HashSet<AnchorSignature> {
    let mut repeated = HashSet::new();
    for side in [left, right] {
        let mut seen = HashSet::new();
        for node in side {
            let anchor = node.block.anchor_signature();
            if !seen.insert(anchor) {
                repeated.insert(anchor);
            }
        }
    }
    repeated
}

/// Composite keys for blocks whose anchor is repeated; `None` otherwise.
fn position_keys(
    nodes: &[FlatNode<'_>],
    repeated: &HashSet<AnchorSignature>,
) -> Vec<Option<PositionKey>> {
    let mut occurrences: HashMap<(AnchorSignature, u32), usize> = HashMap::new();
    nodes
        .iter()
        .map(|node| {
            let anchor = node.block.anchor_signature();
            if !repeated.contains(&anchor) {
                return None;
            }
            let slot = occurrences
                .entry((anchor, node.block.position_index))
                .or_insert(0);
            let key = (anchor, node.block.position_index, *slot);
            *slot += 1;
            Some(key)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use redline_types::reindex_forest;
    use uuid::Uuid;

    fn clause(doc: Uuid, path: &str, text: &str) -> Block {
        Block::new(doc, BlockType::Clause, path, text)
    }

    fn forest(doc: Uuid, mut blocks: Vec<Block>) -> Vec<Block> {
        reindex_forest(&mut blocks, doc);
        blocks
    }

    #[test]
    fn identical_forests_pair_by_anchor() {
        let d = Uuid::now_v7();
        let f = forest(d, vec![clause(d, "1", "One."), clause(d, "2", "Two.")]);
        let a = Alignment::align(&f, &f);
        assert_eq!(a.pair_count(), 2);
        assert_eq!(a.right_of(0), Some(0));
        assert_eq!(a.method(1), Some(MatchMethod::Anchor));
    }

    #[test]
    fn short_edit_pairs_by_structure() {
        let d = Uuid::now_v7();
        let left = forest(d, vec![clause(d, "2", "Term. Twelve (12) months.")]);
        let right = forest(d, vec![clause(d, "2", "Term. Twenty-four (24) months.")]);
        let a = Alignment::align(&left, &right);
        assert_eq!(a.right_of(0), Some(0));
        assert_eq!(a.method(0), Some(MatchMethod::Structure));
    }

    #[test]
    fn structure_pass_requires_paired_parents() {
        let d = Uuid::now_v7();
        let left = forest(
            d,
            vec![Block::new(d, BlockType::Section, "1", "Old heading")
                .with_children(vec![clause(d, "1.1", "alpha")])],
        );
        let right = forest(
            d,
            vec![Block::new(d, BlockType::Section, "9", "Unrelated")
                .with_children(vec![clause(d, "1.1", "beta")])],
        );
        let a = Alignment::align(&left, &right);
        assert_eq!(a.pair_count(), 0);
    }

    #[test]
    fn repeated_boilerplate_pairs_positionally() {
        let d = Uuid::now_v7();
        let boiler = "Intentionally left blank.";
        let left = forest(
            d,
            vec![
                Block::new(d, BlockType::Paragraph, "", boiler),
                Block::new(d, BlockType::Paragraph, "", "Middle."),
                Block::new(d, BlockType::Paragraph, "", boiler),
            ],
        );
        let right = left.clone();
        let a = Alignment::align(&left, &right);
        assert_eq!(a.right_of(0), Some(0));
        assert_eq!(a.right_of(2), Some(2));
        assert_eq!(a.method(0), Some(MatchMethod::Position));
        assert_eq!(a.method(1), Some(MatchMethod::Anchor));
    }

    #[test]
    fn repeated_anchor_in_same_position_uses_occurrence() {
        let d = Uuid::now_v7();
        let make_table = || {
            let mut table = Block::new(d, BlockType::Table, "1", "Fees");
            for _ in 0..2 {
                let mut row = Block::new(d, BlockType::TableRow, "", "");
                row.push_child(Block::new(d, BlockType::TableCell, "", "Yes"));
                table.push_child(row);
            }
            table
        };
        let left = forest(d, vec![make_table()]);
        let right = forest(d, vec![make_table()]);
        let a = Alignment::align(&left, &right);
        // Both cells share anchor and position 0; occurrence separates them.
        assert_eq!(a.pair_count(), 5);
        assert_eq!(a.right_of(2), Some(2));
        assert_eq!(a.right_of(4), Some(4));
    }

    #[test]
    fn unmatched_blocks_stay_unpaired() {
        let d = Uuid::now_v7();
        let left = forest(d, vec![clause(d, "1", "Kept."), clause(d, "2", "Removed.")]);
        let right = forest(d, vec![clause(d, "1", "Kept."), clause(d, "3", "Added.")]);
        let a = Alignment::align(&left, &right);
        assert_eq!(a.right_of(1), None);
        assert_eq!(a.left_of(1), None);
    }

    #[test]
    fn insertion_before_unchanged_clause_is_not_a_rewrite() {
        let d = Uuid::now_v7();
        let confidentiality = "Confidentiality. Each party shall keep the other party's information secret.";
        let left = forest(
            d,
            vec![clause(d, "1.1", "Definitions."), clause(d, "1.2", confidentiality)],
        );
        let right = forest(
            d,
            vec![
                clause(d, "1.1", "Definitions."),
                clause(d, "1.2", "Notices. All notices shall be in writing."),
                clause(d, "1.3", confidentiality),
            ],
        );
        let a = Alignment::align(&left, &right);
        assert_eq!(a.right_of(1), Some(2));
        assert_eq!(a.method(1), Some(MatchMethod::Content));
        assert_eq!(a.left_of(1), None);
        assert!(a.is_move(1));
        assert!(!a.is_move(0));
    }

    #[test]
    fn renumbered_and_edited_clause_pairs_by_similarity() {
        let d = Uuid::now_v7();
        let left = forest(
            d,
            vec![clause(d, "4", "The Borrower shall repay the Loan in full on the Termination Date.")],
        );
        let right = forest(
            d,
            vec![
                clause(d, "4", "Interest accrues daily."),
                clause(d, "5", "The Borrower shall repay the Loan in full on the Final Repayment Date."),
            ],
        );
        let a = Alignment::align(&left, &right);
        assert_eq!(a.right_of(0), Some(1));
        assert_eq!(a.method(0), Some(MatchMethod::Similarity));
        assert_eq!(a.left_of(0), None);
    }

    #[test]
    fn structure_pass_rejects_unrelated_text() {
        let d = Uuid::now_v7();
        let left = forest(d, vec![clause(d, "3", "Governing law. England and Wales.")]);
        let right = forest(d, vec![clause(d, "3", "Notices. All notices shall be in writing.")]);
        let a = Alignment::align(&left, &right);
        assert_eq!(a.pair_count(), 0);
    }

    #[test]
    fn repeated_text_pairs_in_document_order() {
        let d = Uuid::now_v7();
        let left = forest(d, vec![clause(d, "1", "Reserved."), clause(d, "2", "Reserved.")]);
        let right = forest(d, vec![clause(d, "7", "Reserved."), clause(d, "8", "Reserved.")]);
        let a = Alignment::align(&left, &right);
        // Duplicate hashes are skipped by the content pass.
        assert_eq!(a.method(0), Some(MatchMethod::Similarity));
        assert_eq!(a.right_of(0), Some(0));
        assert_eq!(a.right_of(1), Some(1));
    }
}
