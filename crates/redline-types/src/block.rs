use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use redline_crypto::{anchor_signature, clause_hash, AnchorSignature, ClauseHash};

use crate::normalize::canonicalize;
use crate::token::{tokenize, Token};

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// The closed set of structural block types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    Section,
    Clause,
    Subclause,
    Paragraph,
    Table,
    TableRow,
    TableCell,
}

impl BlockType {
    /// The tag used on the wire and in the anchor payload.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Section => "section",
            Self::Clause => "clause",
            Self::Subclause => "subclause",
            Self::Paragraph => "paragraph",
            Self::Table => "table",
            Self::TableRow => "table_row",
            Self::TableCell => "table_cell",
        }
    }

    /// Whether blocks of this type take part in structural-path numbering.
    /// Table rows and cells never do.
    pub fn is_numbered(&self) -> bool {
        !matches!(self, Self::TableRow | Self::TableCell)
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Display-side metadata
// ---------------------------------------------------------------------------

/// Character formatting of a run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunFormatting {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    /// Point size, when set explicitly.
    pub font_size: Option<f32>,
    /// Hex colour such as `"FF0000"`.
    pub color: Option<String>,
}

/// A span of display text with uniform formatting.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub text: String,
    pub formatting: RunFormatting,
}

impl Run {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            formatting: RunFormatting::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Insert,
    Delete,
    FormatChange,
}

/// A tracked change carried over from the source document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedChange {
    pub author: String,
    pub date: DateTime<Utc>,
    pub change_type: ChangeType,
    /// Text before the change, when the source recorded it.
    pub original: Option<String>,
}

/// Paragraph-level formatting and numbering metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattingMeta {
    pub style_name: Option<String>,
    pub numbering_id: Option<i32>,
    pub numbering_level: Option<i32>,
    pub is_redline: bool,
    pub tracked_change: Option<TrackedChange>,
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// A node in a document's structural tree.
///
/// `id`, `block_type`, `structural_path` and `canonical_text` are fixed at
/// construction; the anchor signature, clause hash and tokens are derived
/// from them and only ever change through [`Block::patch`] or
/// [`Block::renumber`], which recompute all three.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    id: Uuid,
    pub document_id: Uuid,
    pub parent_id: Option<Uuid>,
    block_type: BlockType,
    /// Nesting depth; roots are 0.
    pub level: u32,
    structural_path: String,
    anchor_signature: AnchorSignature,
    clause_hash: ClauseHash,
    canonical_text: String,
    pub display_text: String,
    pub formatting_meta: FormattingMeta,
    /// 0-based order among siblings.
    pub position_index: u32,
    tokens: Vec<Token>,
    pub runs: Vec<Run>,
    pub children: Vec<Block>,
}

impl Block {
    /// Create a detached block from its canonical text.
    ///
    /// Display text defaults to the canonical text. Tree placement
    /// (`parent_id`, `position_index`, `level`) is assigned when the block is
    /// attached with [`Block::push_child`] or [`crate::reindex_forest`].
    pub fn new(
        document_id: Uuid,
        block_type: BlockType,
        structural_path: impl Into<String>,
        canonical_text: impl Into<String>,
    ) -> Self {
        let structural_path = structural_path.into();
        let canonical_text = canonical_text.into();
        let mut block = Self {
            id: Uuid::now_v7(),
            document_id,
            parent_id: None,
            block_type,
            level: 0,
            structural_path,
            anchor_signature: AnchorSignature::from_hash([0; 32]),
            clause_hash: ClauseHash::from_hash([0; 32]),
            display_text: canonical_text.clone(),
            canonical_text,
            formatting_meta: FormattingMeta::default(),
            position_index: 0,
            tokens: Vec::new(),
            runs: Vec::new(),
            children: Vec::new(),
        };
        block.rehash();
        block
    }

    /// Create a block from display text, deriving canonical text with
    /// [`canonicalize`].
    pub fn from_display(
        document_id: Uuid,
        block_type: BlockType,
        structural_path: impl Into<String>,
        display_text: impl Into<String>,
    ) -> Self {
        let display_text = display_text.into();
        let mut block = Self::new(
            document_id,
            block_type,
            structural_path,
            canonicalize(&display_text),
        );
        block.display_text = display_text;
        block
    }

    /// Use a producer-assigned identifier instead of a fresh one.
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_display_text(mut self, display_text: impl Into<String>) -> Self {
        self.display_text = display_text.into();
        self
    }

    /// Set formatting runs; display text becomes their concatenation.
    pub fn with_runs(mut self, runs: Vec<Run>) -> Self {
        self.display_text = runs.iter().map(|r| r.text.as_str()).collect();
        self.runs = runs;
        self
    }

    pub fn with_formatting(mut self, formatting_meta: FormattingMeta) -> Self {
        self.formatting_meta = formatting_meta;
        self
    }

    pub fn with_children(mut self, children: Vec<Block>) -> Self {
        for child in children {
            self.push_child(child);
        }
        self
    }

    // -- accessors ----------------------------------------------------------

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn block_type(&self) -> BlockType {
        self.block_type
    }

    pub fn structural_path(&self) -> &str {
        &self.structural_path
    }

    pub fn canonical_text(&self) -> &str {
        &self.canonical_text
    }

    pub fn anchor_signature(&self) -> AnchorSignature {
        self.anchor_signature
    }

    pub fn clause_hash(&self) -> ClauseHash {
        self.clause_hash
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    // -- mutation -----------------------------------------------------------

    /// Replace the block's text in place.
    ///
    /// Regenerates anchor signature, clause hash and tokens. Runs collapse to
    /// a single run carrying the formatting of the previous first run. The
    /// block keeps its id and its place in the tree.
    pub fn patch(&mut self, canonical_text: impl Into<String>, display_text: impl Into<String>) {
        self.canonical_text = canonical_text.into();
        self.display_text = display_text.into();
        if !self.runs.is_empty() {
            let formatting = self.runs[0].formatting.clone();
            self.runs = vec![Run {
                text: self.display_text.clone(),
                formatting,
            }];
        }
        self.rehash();
    }

    /// Move the block to a new structural path (renumbering).
    pub fn renumber(&mut self, structural_path: impl Into<String>) {
        self.structural_path = structural_path.into();
        self.rehash();
    }

    /// Recompute every derived field from type, path and canonical text.
    pub fn rehash(&mut self) {
        self.anchor_signature = anchor_signature(
            self.block_type.as_str(),
            &self.structural_path,
            &self.canonical_text,
        );
        self.clause_hash = clause_hash(&self.canonical_text);
        self.tokens = tokenize(&self.canonical_text);
    }

    /// Append a child, fixing up its placement and that of its subtree.
    pub fn push_child(&mut self, mut child: Block) {
        child.parent_id = Some(self.id);
        child.position_index = self.children.len() as u32;
        child.place_subtree(self.document_id, self.level + 1);
        self.children.push(child);
    }

    /// Set `document_id` and `level` for this block and parent/position/level
    /// for every descendant.
    pub(crate) fn place_subtree(&mut self, document_id: Uuid, level: u32) {
        self.document_id = document_id;
        self.level = level;
        let id = self.id;
        for (i, child) in self.children.iter_mut().enumerate() {
            child.parent_id = Some(id);
            child.position_index = i as u32;
            child.place_subtree(document_id, level + 1);
        }
    }

    // -- inspection ---------------------------------------------------------

    /// Copy of this block without its children.
    pub fn shallow_clone(&self) -> Block {
        Block {
            id: self.id,
            document_id: self.document_id,
            parent_id: self.parent_id,
            block_type: self.block_type,
            level: self.level,
            structural_path: self.structural_path.clone(),
            anchor_signature: self.anchor_signature,
            clause_hash: self.clause_hash,
            canonical_text: self.canonical_text.clone(),
            display_text: self.display_text.clone(),
            formatting_meta: self.formatting_meta.clone(),
            position_index: self.position_index,
            tokens: self.tokens.clone(),
            runs: self.runs.clone(),
            children: Vec::new(),
        }
    }

    /// Whether the stored anchor and clause hash match their recomputation.
    pub fn identity_is_current(&self) -> bool {
        self.anchor_signature
            == anchor_signature(self.block_type.as_str(), &self.structural_path, &self.canonical_text)
            && self.clause_hash == clause_hash(&self.canonical_text)
    }

    /// Whether the stored tokens match the tokenization of the canonical text.
    pub fn tokens_are_current(&self) -> bool {
        self.tokens == tokenize(&self.canonical_text)
    }

    /// Number of blocks in this subtree, including this one.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(Block::subtree_len).sum::<usize>()
    }
}
