//! Tree-level operations: flattening, placement, validation and indexing.
//!
//! Blocks own their children; there are no back-pointers. Parent lookup goes
//! through a [`TreeIndex`] built on demand, and validation is a pure function
//! over a forest so it can be used directly as a property check.

use std::collections::{HashMap, HashSet};
use std::fmt;

use uuid::Uuid;

use crate::block::{Block, BlockType};
use crate::error::{TypeError, TypeResult};

// ---------------------------------------------------------------------------
// Flattening
// ---------------------------------------------------------------------------

/// A block in pre-order position with its parent's flat index.
#[derive(Clone, Copy, Debug)]
pub struct FlatNode<'a> {
    pub block: &'a Block,
    /// Index of the parent in the flattened sequence.
    pub parent: Option<usize>,
    pub depth: usize,
}

/// Flatten a forest in document (pre-)order.
pub fn flatten(forest: &[Block]) -> Vec<FlatNode<'_>> {
    let mut out = Vec::new();
    let mut stack: Vec<(&Block, Option<usize>, usize)> =
        forest.iter().rev().map(|b| (b, None, 0)).collect();

    while let Some((block, parent, depth)) = stack.pop() {
        let index = out.len();
        out.push(FlatNode { block, parent, depth });
        for child in block.children.iter().rev() {
            stack.push((child, Some(index), depth + 1));
        }
    }
    out
}

/// Recompute `parent_id`, `position_index`, `level` and `document_id` for an
/// entire forest from its ownership structure.
pub fn reindex_forest(forest: &mut [Block], document_id: Uuid) {
    for (i, root) in forest.iter_mut().enumerate() {
        root.parent_id = None;
        root.position_index = i as u32;
        root.place_subtree(document_id, 0);
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Result of validating a block forest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationReport {
    pub block_count: usize,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    /// Returns `true` if all checks passed.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// A specific well-formedness violation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub block_id: Option<Uuid>,
    pub kind: ViolationKind,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    DuplicateId,
    ParentMismatch,
    PositionMismatch,
    LevelMismatch,
    DocumentMismatch,
    StaleIdentity,
    StaleTokens,
    RunTextMismatch,
    NumberedTableComponent,
    MisplacedTableComponent,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::DuplicateId => "duplicate id",
            Self::ParentMismatch => "parent mismatch",
            Self::PositionMismatch => "position mismatch",
            Self::LevelMismatch => "level mismatch",
            Self::DocumentMismatch => "document mismatch",
            Self::StaleIdentity => "stale identity",
            Self::StaleTokens => "stale tokens",
            Self::RunTextMismatch => "run text mismatch",
            Self::NumberedTableComponent => "numbered table component",
            Self::MisplacedTableComponent => "misplaced table component",
        };
        f.write_str(s)
    }
}

/// Check every structural invariant of a forest.
///
/// - each child's `parent_id` names the block whose `children` holds it,
///   roots have none
/// - sibling `position_index` values equal their order, `0..n`
/// - ids are unique across the forest
/// - `level` equals depth
/// - anchor signature, clause hash and tokens match their recomputation
/// - runs, when present, concatenate to the display text
/// - table rows sit in tables, cells in rows, and neither is numbered
pub fn validate_forest(forest: &[Block]) -> ValidationReport {
    let nodes = flatten(forest);
    let mut violations = Vec::new();
    let mut seen = HashSet::with_capacity(nodes.len());

    for (i, root) in forest.iter().enumerate() {
        check_position(root, i, &mut violations);
    }

    for node in &nodes {
        let block = node.block;
        let id = block.id();
        let mut push = |kind: ViolationKind, description: String| {
            violations.push(Violation {
                block_id: Some(id),
                kind,
                description,
            });
        };

        if !seen.insert(id) {
            push(ViolationKind::DuplicateId, format!("id {id} appears more than once"));
        }

        let parent = node.parent.map(|p| nodes[p].block);
        let expected_parent = parent.map(Block::id);
        if block.parent_id != expected_parent {
            push(
                ViolationKind::ParentMismatch,
                format!("parent_id {:?}, owned by {:?}", block.parent_id, expected_parent),
            );
        }

        if block.level as usize != node.depth {
            push(
                ViolationKind::LevelMismatch,
                format!("level {} at depth {}", block.level, node.depth),
            );
        }

        if !block.identity_is_current() {
            push(
                ViolationKind::StaleIdentity,
                "anchor signature or clause hash does not match recomputation".into(),
            );
        }
        if !block.tokens_are_current() {
            push(ViolationKind::StaleTokens, "tokens do not match canonical text".into());
        }

        if !block.runs.is_empty() {
            let joined: String = block.runs.iter().map(|r| r.text.as_str()).collect();
            if joined != block.display_text {
                push(
                    ViolationKind::RunTextMismatch,
                    "runs do not concatenate to display text".into(),
                );
            }
        }

        let block_type = block.block_type();
        if !block_type.is_numbered() && !block.structural_path().is_empty() {
            push(
                ViolationKind::NumberedTableComponent,
                format!("{block_type} carries structural path {:?}", block.structural_path()),
            );
        }
        let required_parent = match block_type {
            BlockType::TableRow => Some(BlockType::Table),
            BlockType::TableCell => Some(BlockType::TableRow),
            _ => None,
        };
        if let Some(required) = required_parent {
            if parent.map(Block::block_type) != Some(required) {
                push(
                    ViolationKind::MisplacedTableComponent,
                    format!("{block_type} must be a child of {required}"),
                );
            }
        }

        for (i, child) in block.children.iter().enumerate() {
            check_position(child, i, &mut violations);
        }
    }

    ValidationReport {
        block_count: nodes.len(),
        violations,
    }
}

fn check_position(block: &Block, expected: usize, violations: &mut Vec<Violation>) {
    if block.position_index as usize != expected {
        violations.push(Violation {
            block_id: Some(block.id()),
            kind: ViolationKind::PositionMismatch,
            description: format!(
                "position_index {} at sibling slot {expected}",
                block.position_index
            ),
        });
    }
}

// ---------------------------------------------------------------------------
// Arena index
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
struct IndexEntry {
    parent: Option<Uuid>,
    /// Child indices from the forest root down to the block.
    path: Vec<usize>,
}

/// Id-keyed lookup over a forest: O(1) parent lookup and direct block access
/// without back-pointers.
#[derive(Clone, Debug, Default)]
pub struct TreeIndex {
    entries: HashMap<Uuid, IndexEntry>,
}

impl TreeIndex {
    /// Index a forest, rejecting duplicate ids.
    pub fn build(forest: &[Block]) -> TypeResult<Self> {
        let mut entries = HashMap::new();
        let mut stack: Vec<(&Block, Option<Uuid>, Vec<usize>)> = forest
            .iter()
            .enumerate()
            .map(|(i, b)| (b, None, vec![i]))
            .collect();

        while let Some((block, parent, path)) = stack.pop() {
            for (i, child) in block.children.iter().enumerate() {
                let mut child_path = path.clone();
                child_path.push(i);
                stack.push((child, Some(block.id()), child_path));
            }
            if entries
                .insert(block.id(), IndexEntry { parent, path })
                .is_some()
            {
                return Err(TypeError::DuplicateBlockId(block.id()));
            }
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.entries.contains_key(&id)
    }

    /// Parent id of a block; `None` for roots and unknown ids.
    pub fn parent_of(&self, id: Uuid) -> Option<Uuid> {
        self.entries.get(&id).and_then(|e| e.parent)
    }

    /// Ids from the root down to (excluding) the block.
    pub fn ancestors_of(&self, id: Uuid) -> Vec<Uuid> {
        let mut chain = Vec::new();
        let mut current = self.parent_of(id);
        while let Some(p) = current {
            chain.push(p);
            current = self.parent_of(p);
        }
        chain.reverse();
        chain
    }

    /// Resolve a block in the forest this index was built from.
    pub fn get<'a>(&self, forest: &'a [Block], id: Uuid) -> Option<&'a Block> {
        let entry = self.entries.get(&id)?;
        let (first, rest) = entry.path.split_first()?;
        let mut block = forest.get(*first)?;
        for i in rest {
            block = block.children.get(*i)?;
        }
        Some(block)
    }
}
