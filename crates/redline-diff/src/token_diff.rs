//! Token-level diff inside a modified block.
//!
//! Uses the `similar` crate (Myers) over normalized token text, so case and
//! diacritic differences alone do not show up as changes. Adjacent deletions
//! and insertions are reported as one substitution.

use serde::{Deserialize, Serialize};
use similar::{capture_diff_slices, Algorithm, DiffTag};

use redline_types::Token;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenChangeKind {
    Equal,
    Inserted,
    Deleted,
    Substituted,
}

/// A run of tokens sharing one change kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenChange {
    pub kind: TokenChangeKind,
    /// Display text of the left tokens in this run.
    pub left_tokens: Vec<String>,
    /// Display text of the right tokens in this run.
    pub right_tokens: Vec<String>,
    /// Byte offset of the first left token in the left canonical text.
    pub left_offset: Option<usize>,
    /// Byte offset of the first right token in the right canonical text.
    pub right_offset: Option<usize>,
}

/// Diff two token sequences.
pub fn diff_tokens(left: &[Token], right: &[Token]) -> Vec<TokenChange> {
    let left_norm: Vec<&str> = left.iter().map(|t| t.normalized.as_str()).collect();
    let right_norm: Vec<&str> = right.iter().map(|t| t.normalized.as_str()).collect();

    let mut changes: Vec<TokenChange> = Vec::new();
    for op in capture_diff_slices(Algorithm::Myers, &left_norm, &right_norm) {
        let (tag, old, new) = op.as_tag_tuple();
        if old.is_empty() && new.is_empty() {
            continue;
        }
        let kind = match tag {
            DiffTag::Equal => TokenChangeKind::Equal,
            DiffTag::Delete => TokenChangeKind::Deleted,
            DiffTag::Insert => TokenChangeKind::Inserted,
            DiffTag::Replace => TokenChangeKind::Substituted,
        };
        let change = TokenChange {
            kind,
            left_tokens: left[old.clone()].iter().map(|t| t.text.clone()).collect(),
            right_tokens: right[new.clone()].iter().map(|t| t.text.clone()).collect(),
            left_offset: left.get(old.start).filter(|_| !old.is_empty()).map(|t| t.offset),
            right_offset: right.get(new.start).filter(|_| !new.is_empty()).map(|t| t.offset),
        };
        push_coalesced(&mut changes, change);
    }
    changes
}

/// Fold a deletion directly followed by an insertion (or vice versa) into a
/// substitution.
fn push_coalesced(changes: &mut Vec<TokenChange>, next: TokenChange) {
    if let Some(prev) = changes.last_mut() {
        let pair = (prev.kind, next.kind);
        if matches!(
            pair,
            (TokenChangeKind::Deleted, TokenChangeKind::Inserted)
                | (TokenChangeKind::Inserted, TokenChangeKind::Deleted)
        ) {
            prev.kind = TokenChangeKind::Substituted;
            prev.left_tokens.extend(next.left_tokens);
            prev.right_tokens.extend(next.right_tokens);
            prev.left_offset = prev.left_offset.or(next.left_offset);
            prev.right_offset = prev.right_offset.or(next.right_offset);
            return;
        }
    }
    changes.push(next);
}
