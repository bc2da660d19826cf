use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use redline_crypto::{ContentHasher, Digest, HASH_CONTRACT_VERSION};

use crate::block::Block;
use crate::error::{TypeError, TypeResult};
use crate::tree::{flatten, reindex_forest, validate_forest, TreeIndex, ValidationReport, Violation, ViolationKind};

/// Version of the block-model wire schema.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Version of the text normalization algorithm ([`crate::canonicalize`]).
pub const NORMALIZATION_VERSION: &str = "1.0.0";

/// Lifecycle flag of a document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    Original,
    Redline,
    Merged,
    Snapshot,
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Original => "original",
            Self::Redline => "redline",
            Self::Merged => "merged",
            Self::Snapshot => "snapshot",
        };
        f.write_str(s)
    }
}

/// Root container of a block forest.
///
/// Carries the three independently versioned contracts. Two documents may
/// only be compared when their `hash_contract_version`s agree; otherwise one
/// of them has to be [`rehash`](Document::rehash)ed first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub name: String,
    pub source_path: Option<String>,
    pub doc_type: DocType,
    pub schema_version: String,
    pub normalization_version: String,
    pub hash_contract_version: String,
    pub ingested_at: DateTime<Utc>,
    pub metadata: Option<serde_json::Value>,
    pub blocks: Vec<Block>,
}

impl Document {
    /// Create an empty document stamped with the current contract versions.
    pub fn new(name: impl Into<String>, doc_type: DocType) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            source_path: None,
            doc_type,
            schema_version: SCHEMA_VERSION.to_string(),
            normalization_version: NORMALIZATION_VERSION.to_string(),
            hash_contract_version: HASH_CONTRACT_VERSION.to_string(),
            ingested_at: Utc::now(),
            metadata: None,
            blocks: Vec::new(),
        }
    }

    /// Append a root block, adopting it and its subtree into this document.
    pub fn push_root(&mut self, mut block: Block) {
        block.parent_id = None;
        block.position_index = self.blocks.len() as u32;
        block.place_subtree(self.id, 0);
        self.blocks.push(block);
    }

    /// Replace the whole forest and fix up placement fields.
    pub fn set_blocks(&mut self, blocks: Vec<Block>) {
        self.blocks = blocks;
        reindex_forest(&mut self.blocks, self.id);
    }

    /// Total number of blocks in the forest.
    pub fn block_count(&self) -> usize {
        self.blocks.iter().map(Block::subtree_len).sum()
    }

    /// Check tree well-formedness, including that every block belongs to
    /// this document.
    pub fn validate(&self) -> ValidationReport {
        let mut report = validate_forest(&self.blocks);
        for node in flatten(&self.blocks) {
            if node.block.document_id != self.id {
                report.violations.push(Violation {
                    block_id: Some(node.block.id()),
                    kind: ViolationKind::DocumentMismatch,
                    description: format!(
                        "block belongs to document {}, expected {}",
                        node.block.document_id, self.id
                    ),
                });
            }
        }
        report
    }

    /// Validate and turn the first violation into an error.
    pub fn ensure_valid(&self) -> TypeResult<()> {
        let report = self.validate();
        match report.violations.into_iter().next() {
            None => Ok(()),
            Some(v) if v.kind == ViolationKind::DuplicateId => match v.block_id {
                Some(id) => Err(TypeError::DuplicateBlockId(id)),
                None => Err(TypeError::InvalidTree(v.description)),
            },
            Some(v) => Err(TypeError::InvalidTree(format!("{}: {}", v.kind, v.description))),
        }
    }

    /// Reject comparison against a document hashed under another contract.
    pub fn check_compatible(&self, other: &Document) -> TypeResult<()> {
        if self.hash_contract_version != other.hash_contract_version {
            return Err(TypeError::IncompatibleHashContract {
                left: self.hash_contract_version.clone(),
                right: other.hash_contract_version.clone(),
            });
        }
        Ok(())
    }

    /// Recompute every block's derived fields under the current hash
    /// contract and stamp its version.
    pub fn rehash(&mut self) {
        fn walk(blocks: &mut [Block]) {
            for block in blocks {
                block.rehash();
                walk(&mut block.children);
            }
        }
        walk(&mut self.blocks);
        self.hash_contract_version = HASH_CONTRACT_VERSION.to_string();
    }

    /// Digest of the serialized forest, usable as a cache key for pure
    /// computations over this document's blocks.
    pub fn content_digest(&self) -> TypeResult<Digest> {
        ContentHasher::FOREST
            .hash_json(&self.blocks)
            .map_err(|e| TypeError::Serialization(e.to_string()))
    }

    /// Build an id index over the forest.
    pub fn index(&self) -> TypeResult<TreeIndex> {
        TreeIndex::build(&self.blocks)
    }

    /// Find a block by id anywhere in the forest.
    pub fn find(&self, id: Uuid) -> Option<&Block> {
        flatten(&self.blocks)
            .into_iter()
            .find(|n| n.block.id() == id)
            .map(|n| n.block)
    }
}
