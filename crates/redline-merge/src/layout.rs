//! Merge layout: the tree of slots a merge decides over.
//!
//! The incoming forest is the skeleton. Every incoming block gets a slot,
//! shared with its aligned base block if there is one. Base blocks with no
//! incoming partner are spliced in under their base parent's slot, right
//! after the nearest preceding base sibling already present there. Slots are
//! stored in pre-order with their parent's index, so assembly is a plain
//! recursive walk.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use redline_crypto::ContentHasher;
use redline_diff::Alignment;
use redline_types::{reindex_forest, Block, BlockType};

use crate::report::MergeSide;

/// One aligned position in the merge.
///
/// Blocks are stored without children; the tree shape lives in `parent`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MergeSlot {
    /// Index of the parent slot.
    pub parent: Option<usize>,
    pub base: Option<Block>,
    pub incoming: Option<Block>,
    pub ancestor: Option<Block>,
}

impl MergeSlot {
    pub fn side(&self, side: MergeSide) -> Option<&Block> {
        match side {
            MergeSide::Base => self.base.as_ref(),
            MergeSide::Incoming => self.incoming.as_ref(),
        }
    }

    /// The block that describes this slot: base, else incoming, else ancestor.
    pub fn representative(&self) -> Option<&Block> {
        self.base
            .as_ref()
            .or(self.incoming.as_ref())
            .or(self.ancestor.as_ref())
    }
}

#[derive(Default)]
struct LayoutNode {
    base: Option<usize>,
    incoming: Option<usize>,
    children: Vec<usize>,
}

/// Build the slot layout for a merge.
pub(crate) fn build_layout(
    base: &[Block],
    incoming: &[Block],
    ancestor: Option<&[Block]>,
) -> Vec<MergeSlot> {
    let alignment = Alignment::align(base, incoming);
    let base_flat = alignment.left();
    let incoming_flat = alignment.right();

    let mut arena: Vec<LayoutNode> = Vec::new();
    let mut roots: Vec<usize> = Vec::new();
    let mut base_node: Vec<Option<usize>> = vec![None; base_flat.len()];
    let mut incoming_node: Vec<Option<usize>> = vec![None; incoming_flat.len()];

    // Skeleton from the incoming forest.
    for (j, node) in incoming_flat.iter().enumerate() {
        let id = arena.len();
        let paired = alignment.left_of(j);
        arena.push(LayoutNode {
            base: paired,
            incoming: Some(j),
            children: Vec::new(),
        });
        incoming_node[j] = Some(id);
        if let Some(i) = paired {
            base_node[i] = Some(id);
        }
        match node.parent.and_then(|p| incoming_node[p]) {
            Some(parent) => arena[parent].children.push(id),
            None => roots.push(id),
        }
    }

    // Sibling lists of the base forest, in order.
    let mut base_siblings: HashMap<Option<usize>, Vec<usize>> = HashMap::new();
    for (i, node) in base_flat.iter().enumerate() {
        base_siblings.entry(node.parent).or_default().push(i);
    }

    // Splice in base-only blocks. Pre-order guarantees the base parent and
    // every preceding sibling already have a node.
    for (i, node) in base_flat.iter().enumerate() {
        if base_node[i].is_some() {
            continue;
        }
        let id = arena.len();
        arena.push(LayoutNode {
            base: Some(i),
            ..LayoutNode::default()
        });
        base_node[i] = Some(id);

        let parent = node.parent.and_then(|p| base_node[p]);
        let siblings = match parent {
            Some(p) => &mut arena[p].children,
            None => &mut roots,
        };
        let earlier = base_siblings
            .get(&node.parent)
            .map(|list| list.iter().take_while(|&&s| s != i).copied().collect::<Vec<_>>())
            .unwrap_or_default();
        let at = earlier
            .iter()
            .rev()
            .filter_map(|&s| base_node[s])
            .find_map(|n| siblings.iter().position(|&c| c == n))
            .map(|pos| pos + 1)
            .unwrap_or(0);
        siblings.insert(at, id);
    }

    let ancestor_of_base = ancestor.map(|a| Alignment::align(base, a));
    let ancestor_of_incoming = ancestor.map(|a| Alignment::align(incoming, a));

    let mut slots = Vec::with_capacity(arena.len());
    let mut stack: Vec<(usize, Option<usize>)> = roots.iter().rev().map(|&n| (n, None)).collect();
    while let Some((n, parent)) = stack.pop() {
        let index = slots.len();
        let node = &arena[n];
        let from_base = match (node.base, &ancestor_of_base) {
            (Some(i), Some(aligned)) => aligned
                .right_of(i)
                .map(|k| aligned.right()[k].block.shallow_clone()),
            _ => None,
        };
        let from_incoming = match (node.incoming, &ancestor_of_incoming) {
            (Some(j), Some(aligned)) => aligned
                .right_of(j)
                .map(|k| aligned.right()[k].block.shallow_clone()),
            _ => None,
        };
        slots.push(MergeSlot {
            parent,
            base: node.base.map(|i| base_flat[i].block.shallow_clone()),
            incoming: node.incoming.map(|j| incoming_flat[j].block.shallow_clone()),
            ancestor: from_base.or(from_incoming),
        });
        for &child in node.children.iter().rev() {
            stack.push((child, Some(index)));
        }
    }
    slots
}

/// Assemble the merged forest from the layout and the block chosen for each
/// slot (`None` where the slot contributes nothing).
///
/// An absent slot hoists its present children into its own position, except
/// for table containers, whose cells are meaningless outside them. Block ids
/// are kept; a repeated id is replaced by one derived from the merge id and
/// the slot index.
///
/// Returns the forest and, per slot, whether its block made it into the tree.
pub(crate) fn assemble(
    slots: &[MergeSlot],
    chosen: &[Option<Block>],
    merge_id: Uuid,
    document_id: Uuid,
) -> (Vec<Block>, Vec<bool>) {
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); slots.len()];
    let mut roots = Vec::new();
    for (index, slot) in slots.iter().enumerate() {
        match slot.parent {
            Some(p) => children[p].push(index),
            None => roots.push(index),
        }
    }

    let mut assembler = Assembler {
        slots,
        chosen,
        children: &children,
        seen: HashSet::new(),
        emitted: vec![false; slots.len()],
        merge_id,
    };
    let mut forest: Vec<Block> = roots.iter().flat_map(|&r| assembler.build(r)).collect();
    reindex_forest(&mut forest, document_id);
    (forest, assembler.emitted)
}

struct Assembler<'a> {
    slots: &'a [MergeSlot],
    chosen: &'a [Option<Block>],
    children: &'a [Vec<usize>],
    seen: HashSet<Uuid>,
    emitted: Vec<bool>,
    merge_id: Uuid,
}

impl Assembler<'_> {
    fn build(&mut self, index: usize) -> Vec<Block> {
        let own = self.chosen.get(index).cloned().flatten().map(|mut block| {
            block.children.clear();
            if !self.seen.insert(block.id()) {
                let id = derive_id(self.merge_id, index);
                self.seen.insert(id);
                block = block.with_id(id);
            }
            block
        });

        let is_table_container = own.is_none()
            && self.slots[index]
                .representative()
                .is_some_and(|b| matches!(b.block_type(), BlockType::Table | BlockType::TableRow));
        if is_table_container {
            return Vec::new();
        }
        self.emitted[index] = own.is_some();

        let children = self.children;
        let kids: Vec<Block> = children[index]
            .iter()
            .flat_map(|&c| self.build(c))
            .collect();
        match own {
            Some(mut block) => {
                block.children = kids;
                vec![block]
            }
            None => kids,
        }
    }
}

/// Deterministic block id for `slot` within merge `merge_id`.
pub(crate) fn derive_id(merge_id: Uuid, slot: usize) -> Uuid {
    let digest = ContentHasher::IDENTITY
        .builder()
        .field(merge_id.as_bytes())
        .field(&(slot as u64).to_le_bytes())
        .finish();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest.as_bytes()[..16]);
    uuid::Builder::from_random_bytes(bytes).into_uuid()
}

#[cfg(test)]
mod tests {
    use super::*;
    use redline_types::validate_forest;

    fn forest(doc: Uuid, mut blocks: Vec<Block>) -> Vec<Block> {
        reindex_forest(&mut blocks, doc);
        blocks
    }

    fn clause(doc: Uuid, path: &str, text: &str) -> Block {
        Block::new(doc, BlockType::Clause, path, text)
    }

    fn texts(forest: &[Block]) -> Vec<String> {
        redline_types::flatten(forest)
            .iter()
            .map(|n| n.block.canonical_text().to_string())
            .collect()
    }

    fn chosen_base_else_incoming(slots: &[MergeSlot]) -> Vec<Option<Block>> {
        slots
            .iter()
            .map(|s| s.base.clone().or_else(|| s.incoming.clone()))
            .collect()
    }

    #[test]
    fn identical_forests_share_every_slot() {
        let d = Uuid::now_v7();
        let f = forest(d, vec![clause(d, "1", "One."), clause(d, "2", "Two.")]);
        let slots = build_layout(&f, &f, None);
        assert_eq!(slots.len(), 2);
        assert!(slots.iter().all(|s| s.base.is_some() && s.incoming.is_some()));
        assert!(slots.iter().all(|s| s.ancestor.is_none()));
    }

    #[test]
    fn base_only_block_follows_preceding_sibling() {
        let d = Uuid::now_v7();
        let base = forest(
            d,
            vec![clause(d, "1", "One."), clause(d, "2", "Two."), clause(d, "3", "Three.")],
        );
        let incoming = forest(d, vec![clause(d, "1", "One."), clause(d, "3", "Three.")]);
        let slots = build_layout(&base, &incoming, None);

        let order: Vec<&str> = slots
            .iter()
            .map(|s| s.representative().map(Block::canonical_text).unwrap_or(""))
            .collect();
        assert_eq!(order, vec!["One.", "Two.", "Three."]);
        assert!(slots[1].incoming.is_none());
    }

    #[test]
    fn base_only_first_child_goes_to_front() {
        let d = Uuid::now_v7();
        let section = |kids: Vec<Block>| {
            Block::new(d, BlockType::Section, "1", "Definitions").with_children(kids)
        };
        let base = forest(
            d,
            vec![section(vec![clause(d, "1.1", "First."), clause(d, "1.2", "Second.")])],
        );
        let incoming = forest(d, vec![section(vec![clause(d, "1.2", "Second.")])]);
        let slots = build_layout(&base, &incoming, None);
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[1].parent, Some(0));
        assert_eq!(slots[1].base.as_ref().map(Block::canonical_text), Some("First."));
        assert_eq!(slots[2].parent, Some(0));
    }

    #[test]
    fn ancestor_found_through_either_side() {
        let d = Uuid::now_v7();
        let ancestor = forest(d, vec![clause(d, "1", "Kept."), clause(d, "2", "Dropped by base.")]);
        let base = forest(d, vec![clause(d, "1", "Kept.")]);
        let incoming = ancestor.clone();
        let slots = build_layout(&base, &incoming, Some(&ancestor));
        assert_eq!(slots.len(), 2);
        assert!(slots.iter().all(|s| s.ancestor.is_some()));
        assert!(slots[1].base.is_none());
    }

    #[test]
    fn assembly_reproduces_forest_and_validates() {
        let d = Uuid::now_v7();
        let f = forest(
            d,
            vec![Block::new(d, BlockType::Section, "1", "Heading")
                .with_children(vec![clause(d, "1.1", "a."), clause(d, "1.2", "b.")])],
        );
        let slots = build_layout(&f, &f, None);
        let merged_doc = Uuid::now_v7();
        let (out, emitted) = assemble(&slots, &chosen_base_else_incoming(&slots), Uuid::now_v7(), merged_doc);
        assert!(emitted.iter().all(|&e| e));
        assert_eq!(texts(&out), texts(&f));
        assert!(validate_forest(&out).is_valid());
        assert!(redline_types::flatten(&out)
            .iter()
            .all(|n| n.block.document_id == merged_doc));
        assert_eq!(out[0].id(), f[0].id());
    }

    #[test]
    fn absent_slot_hoists_children() {
        let d = Uuid::now_v7();
        let f = forest(
            d,
            vec![Block::new(d, BlockType::Section, "1", "Heading")
                .with_children(vec![clause(d, "1.1", "a."), clause(d, "1.2", "b.")])],
        );
        let slots = build_layout(&f, &f, None);
        let mut chosen = chosen_base_else_incoming(&slots);
        chosen[0] = None;
        let (out, emitted) = assemble(&slots, &chosen, Uuid::now_v7(), d);
        assert_eq!(emitted, vec![false, true, true]);
        assert_eq!(out.len(), 2);
        assert_eq!(texts(&out), vec!["a.", "b."]);
        assert!(validate_forest(&out).is_valid());
    }

    #[test]
    fn absent_table_drops_its_cells() {
        let d = Uuid::now_v7();
        let mut table = Block::new(d, BlockType::Table, "1", "Fees");
        let mut row = Block::new(d, BlockType::TableRow, "", "");
        row.push_child(Block::new(d, BlockType::TableCell, "", "$10"));
        table.push_child(row);
        let f = forest(d, vec![clause(d, "0", "Intro."), table]);
        let slots = build_layout(&f, &f, None);
        let mut chosen = chosen_base_else_incoming(&slots);
        chosen[1] = None;
        let (out, emitted) = assemble(&slots, &chosen, Uuid::now_v7(), d);
        assert_eq!(texts(&out), vec!["Intro."]);
        // Row and cell were chosen but have nowhere to go.
        assert_eq!(emitted, vec![true, false, false, false]);
    }

    #[test]
    fn colliding_ids_are_replaced_deterministically() {
        let d = Uuid::now_v7();
        let shared = Uuid::now_v7();
        let base = forest(d, vec![clause(d, "1", "Alpha clause text.").with_id(shared)]);
        let incoming = forest(d, vec![clause(d, "7", "Entirely different words.").with_id(shared)]);
        let slots = build_layout(&base, &incoming, None);
        assert_eq!(slots.len(), 2);

        let merge_id = Uuid::now_v7();
        let chosen = chosen_base_else_incoming(&slots);
        let (first, _) = assemble(&slots, &chosen, merge_id, d);
        let (second, _) = assemble(&slots, &chosen, merge_id, d);
        assert_eq!(first, second);
        assert_eq!(first[0].id(), shared);
        assert_eq!(first[1].id(), derive_id(merge_id, 1));
        assert!(validate_forest(&first).is_valid());
    }

    #[test]
    fn derived_ids_differ_by_slot_and_merge() {
        let m = Uuid::now_v7();
        assert_eq!(derive_id(m, 3), derive_id(m, 3));
        assert_ne!(derive_id(m, 3), derive_id(m, 4));
        assert_ne!(derive_id(m, 3), derive_id(Uuid::now_v7(), 3));
    }
}
