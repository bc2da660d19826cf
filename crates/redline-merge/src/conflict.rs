use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use redline_types::{canonicalize, AnchorSignature, Block};

use crate::layout::MergeSlot;

/// Why a slot could not be merged automatically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Both sides changed the text (or changed it with no ancestor to tell
    /// which side moved).
    Content,
    /// One side deleted the block, the other changed it.
    DeleteModify,
    /// A deletion held back for confirmation by `preserve_deletions`.
    Deletion,
}

/// How a conflict was settled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    AcceptedBase,
    AcceptedIncoming,
    Manual,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AcceptedBase => "accepted_base",
            Self::AcceptedIncoming => "accepted_incoming",
            Self::Manual => "manual",
        };
        f.write_str(s)
    }
}

/// A resolution as supplied by a caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "resolution", rename_all = "snake_case")]
pub enum ResolutionChoice {
    AcceptedBase,
    AcceptedIncoming,
    Manual { text: String },
}

impl ResolutionChoice {
    pub fn resolution(&self) -> Resolution {
        match self {
            Self::AcceptedBase => Resolution::AcceptedBase,
            Self::AcceptedIncoming => Resolution::AcceptedIncoming,
            Self::Manual { .. } => Resolution::Manual,
        }
    }

    pub fn manual_text(&self) -> Option<&str> {
        match self {
            Self::Manual { text } => Some(text.as_str()),
            _ => None,
        }
    }
}

/// An unresolved (or resolved) decision surfaced to the user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeConflict {
    pub id: Uuid,
    /// Index of the slot in the merge layout.
    pub slot: usize,
    pub anchor_signature: AnchorSignature,
    pub kind: ConflictKind,
    pub structural_path: String,
    pub base_block_id: Option<Uuid>,
    pub incoming_block_id: Option<Uuid>,
    pub base_text: Option<String>,
    pub incoming_text: Option<String>,
    pub ancestor_text: Option<String>,
    pub resolution: Option<Resolution>,
    /// Caller-supplied text of a manual resolution.
    pub resolved_text: Option<String>,
}

impl MergeConflict {
    pub(crate) fn new(
        id: Uuid,
        slot_index: usize,
        slot: &MergeSlot,
        representative: &Block,
        kind: ConflictKind,
    ) -> Self {
        Self {
            id,
            slot: slot_index,
            anchor_signature: representative.anchor_signature(),
            kind,
            structural_path: representative.structural_path().to_string(),
            base_block_id: slot.base.as_ref().map(Block::id),
            incoming_block_id: slot.incoming.as_ref().map(Block::id),
            base_text: slot.base.as_ref().map(|b| b.display_text.clone()),
            incoming_text: slot.incoming.as_ref().map(|b| b.display_text.clone()),
            ancestor_text: slot.ancestor.as_ref().map(|b| b.display_text.clone()),
            resolution: None,
            resolved_text: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }

    /// Whether `choice` is exactly the resolution already recorded.
    pub fn matches(&self, choice: &ResolutionChoice) -> bool {
        self.resolution == Some(choice.resolution())
            && self.resolved_text.as_deref() == choice.manual_text()
    }

    /// The block this conflict contributes to the merged tree, if any.
    ///
    /// Pending conflicts contribute nothing. `accepted_base` and
    /// `accepted_incoming` take that side's block, which is absent when that
    /// side deleted it. `manual` patches the caller's text into the
    /// base-side block (or whichever side still has one).
    pub fn resolved_block(&self, slot: &MergeSlot) -> Option<Block> {
        match self.resolution? {
            Resolution::AcceptedBase => slot.base.clone(),
            Resolution::AcceptedIncoming => slot.incoming.clone(),
            Resolution::Manual => {
                let text = self.resolved_text.as_deref().unwrap_or_default();
                let mut block = slot.representative()?.clone();
                block.patch(canonicalize(text), text);
                Some(block)
            }
        }
    }
}
