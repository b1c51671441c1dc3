//! This module contains function layout information including block order and
//! instruction order.
//!
//! Blocks and instructions only ever get appended: the builder positions at
//! the end of a block and nothing is removed once inserted.
use cranelift_entity::SecondaryMap;

use super::{BlockId, InstId};

#[derive(Debug, Clone, Default)]
pub struct Layout {
    blocks: SecondaryMap<BlockId, BlockNode>,
    insts: SecondaryMap<InstId, InstNode>,
    entry_block: Option<BlockId>,
    last_block: Option<BlockId>,
}

impl Layout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry_block(&self) -> Option<BlockId> {
        self.entry_block
    }

    pub fn last_block(&self) -> Option<BlockId> {
        self.last_block
    }

    pub fn is_entry_block(&self, block: BlockId) -> bool {
        self.entry_block == Some(block)
    }

    pub fn is_block_empty(&self, block: BlockId) -> bool {
        self.first_inst_of(block).is_none()
    }

    pub fn next_block_of(&self, block: BlockId) -> Option<BlockId> {
        debug_assert!(self.is_block_inserted(block));
        self.blocks[block].next
    }

    pub fn is_block_inserted(&self, block: BlockId) -> bool {
        Some(block) == self.entry_block || self.blocks[block] != BlockNode::default()
    }

    pub fn first_inst_of(&self, block: BlockId) -> Option<InstId> {
        debug_assert!(self.is_block_inserted(block));
        self.blocks[block].first_inst
    }

    pub fn last_inst_of(&self, block: BlockId) -> Option<InstId> {
        debug_assert!(self.is_block_inserted(block));
        self.blocks[block].last_inst
    }

    pub fn next_inst_of(&self, inst: InstId) -> Option<InstId> {
        debug_assert!(self.is_inst_inserted(inst));
        self.insts[inst].next
    }

    pub fn prev_inst_of(&self, inst: InstId) -> Option<InstId> {
        debug_assert!(self.is_inst_inserted(inst));
        self.insts[inst].prev
    }

    /// Returns the block `inst` was appended to, if any.
    pub fn inst_block(&self, inst: InstId) -> Option<BlockId> {
        self.insts[inst].block
    }

    pub fn is_inst_inserted(&self, inst: InstId) -> bool {
        self.insts[inst] != InstNode::default()
    }

    pub fn iter_block(&self) -> impl Iterator<Item = BlockId> + '_ {
        BlockIter {
            next: self.entry_block,
            blocks: &self.blocks,
        }
    }

    pub fn iter_inst(&self, block: BlockId) -> impl Iterator<Item = InstId> + '_ {
        debug_assert!(self.is_block_inserted(block));
        InstIter {
            next: self.blocks[block].first_inst,
            insts: &self.insts,
        }
    }

    pub fn append_block(&mut self, block: BlockId) {
        debug_assert!(!self.is_block_inserted(block));

        let mut block_node = BlockNode::default();

        if let Some(last_block) = self.last_block {
            self.blocks[last_block].next = Some(block);
            block_node.prev = Some(last_block);
        } else {
            self.entry_block = Some(block);
        }

        self.blocks[block] = block_node;
        self.last_block = Some(block);
    }

    pub fn append_inst(&mut self, inst: InstId, block: BlockId) {
        debug_assert!(self.is_block_inserted(block));
        debug_assert!(!self.is_inst_inserted(inst));

        let block_node = &mut self.blocks[block];
        let mut inst_node = InstNode::with_block(block);

        if let Some(last_inst) = block_node.last_inst {
            inst_node.prev = Some(last_inst);
            self.insts[last_inst].next = Some(inst);
        } else {
            block_node.first_inst = Some(inst);
        }

        block_node.last_inst = Some(inst);
        self.insts[inst] = inst_node;
    }
}

struct BlockIter<'a> {
    next: Option<BlockId>,
    blocks: &'a SecondaryMap<BlockId, BlockNode>,
}

impl Iterator for BlockIter<'_> {
    type Item = BlockId;

    fn next(&mut self) -> Option<BlockId> {
        let next = self.next?;
        self.next = self.blocks[next].next;
        Some(next)
    }
}

struct InstIter<'a> {
    next: Option<InstId>,
    insts: &'a SecondaryMap<InstId, InstNode>,
}

impl Iterator for InstIter<'_> {
    type Item = InstId;

    fn next(&mut self) -> Option<InstId> {
        let next = self.next?;
        self.next = self.insts[next].next;
        Some(next)
    }
}

#[derive(Default, Debug, Clone, PartialEq, Eq)]
struct BlockNode {
    prev: Option<BlockId>,
    next: Option<BlockId>,
    first_inst: Option<InstId>,
    last_inst: Option<InstId>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq)]
struct InstNode {
    /// An block in which the inst exists.
    block: Option<BlockId>,
    prev: Option<InstId>,
    next: Option<InstId>,
}

impl InstNode {
    fn with_block(block: BlockId) -> Self {
        Self {
            block: Some(block),
            prev: None,
            next: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use cranelift_entity::EntityRef;

    use super::*;

    #[test]
    fn block_and_inst_order() {
        let mut layout = Layout::new();
        let b0 = BlockId::new(0);
        let b1 = BlockId::new(1);
        assert_eq!(layout.entry_block(), None);

        layout.append_block(b0);
        layout.append_block(b1);
        assert_eq!(layout.entry_block(), Some(b0));
        assert_eq!(layout.last_block(), Some(b1));
        assert_eq!(layout.next_block_of(b0), Some(b1));
        assert!(layout.is_block_empty(b1));

        let i0 = InstId::new(0);
        let i1 = InstId::new(1);
        let i2 = InstId::new(2);
        layout.append_inst(i0, b1);
        layout.append_inst(i1, b0);
        layout.append_inst(i2, b1);

        assert_eq!(layout.iter_block().collect::<Vec<_>>(), vec![b0, b1]);
        assert_eq!(layout.iter_inst(b1).collect::<Vec<_>>(), vec![i0, i2]);
        assert_eq!(layout.inst_block(i1), Some(b0));
        assert_eq!(layout.prev_inst_of(i2), Some(i0));
        assert_eq!(layout.last_inst_of(b1), Some(i2));
        assert_eq!(layout.inst_block(InstId::new(7)), None);
    }
}
