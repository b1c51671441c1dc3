use std::collections::BTreeSet;

use cranelift_entity::{packed_option::PackedOption, SecondaryMap};

use crate::{BlockId, Function, InstId};

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct ControlFlowGraph {
    entry: PackedOption<BlockId>,
    blocks: SecondaryMap<BlockId, BlockNode>,
    pub exits: smallvec::SmallVec<[BlockId; 8]>,
}

impl ControlFlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compute(&mut self, func: &Function) {
        self.clear();

        self.entry = func.layout.entry_block().into();

        for block in func.layout.iter_block() {
            if let Some(term) = func.terminator_of(block) {
                self.analyze_inst(func, block, term);
            }
        }
    }

    pub fn preds_of(&self, block: BlockId) -> impl Iterator<Item = &BlockId> {
        self.blocks[block].preds.iter()
    }

    pub fn succs_of(&self, block: BlockId) -> impl Iterator<Item = &BlockId> {
        self.blocks[block].succs.iter()
    }

    pub fn is_pred_of(&self, pred: BlockId, block: BlockId) -> bool {
        self.blocks[block].preds.contains(&pred)
    }

    pub fn pred_num_of(&self, block: BlockId) -> usize {
        self.blocks[block].preds.len()
    }

    pub fn succ_num_of(&self, block: BlockId) -> usize {
        self.blocks[block].succs.len()
    }

    pub fn entry(&self) -> Option<BlockId> {
        self.entry.expand()
    }

    pub fn post_order(&self) -> CfgPostOrder<'_> {
        CfgPostOrder::new(self)
    }

    pub fn add_edge(&mut self, from: BlockId, to: BlockId) {
        self.blocks[to].preds.insert(from);
        self.blocks[from].succs.insert(to);
    }

    pub fn clear(&mut self) {
        self.entry = None.into();
        self.blocks.clear();
        self.exits.clear();
    }

    fn analyze_inst(&mut self, func: &Function, block: BlockId, inst: InstId) {
        let data = func.dfg.inst(inst);
        let dests = data.branch_dests();
        if dests.is_empty() {
            self.exits.push(block);
        }

        for dest in dests {
            self.add_edge(block, dest);
        }
    }
}

#[derive(Default, Clone, Debug, PartialEq, Eq)]
struct BlockNode {
    preds: BTreeSet<BlockId>,
    succs: BTreeSet<BlockId>,
}

pub struct CfgPostOrder<'a> {
    cfg: &'a ControlFlowGraph,
    node_state: SecondaryMap<BlockId, NodeState>,
    stack: Vec<BlockId>,
}

impl<'a> CfgPostOrder<'a> {
    fn new(cfg: &'a ControlFlowGraph) -> Self {
        let mut stack = Vec::new();

        if let Some(entry) = cfg.entry() {
            stack.push(entry);
        }

        Self {
            cfg,
            node_state: SecondaryMap::default(),
            stack,
        }
    }
}

impl Iterator for CfgPostOrder<'_> {
    type Item = BlockId;

    fn next(&mut self) -> Option<BlockId> {
        while let Some(&block) = self.stack.last() {
            if self.node_state[block].is_unvisited() {
                self.node_state[block].set_visited();
                for &succ in self.cfg.succs_of(block) {
                    if self.node_state[succ].is_unvisited() {
                        self.stack.push(succ);
                    }
                }
            } else {
                self.stack.pop();
                if !self.node_state[block].has_finished() {
                    self.node_state[block].set_finished();
                    return Some(block);
                }
            }
        }

        None
    }
}

#[derive(Default, Debug, Clone, Copy)]
struct NodeState(u8);

impl NodeState {
    fn is_unvisited(self) -> bool {
        self.0 == 0
    }

    fn has_finished(self) -> bool {
        self.0 == 2
    }

    fn set_visited(&mut self) {
        self.0 = 1;
    }

    fn set_finished(&mut self) {
        self.0 = 2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Context, InstData, Linkage, Signature, Type};

    #[test]
    fn diamond() {
        let ctx = Context::new();
        let sig = ctx.with_ty_store_mut(|s| {
            let func_ty = s.make_func(&[Type::I1], Type::Void, false);
            Signature::from_func_type("f", Linkage::External, func_ty, s).unwrap()
        });
        let mut func = Function::new(&ctx, sig);
        let cond = func.arg_values[0];
        let b0 = func.append_block("entry");
        let b1 = func.append_block("then");
        let b2 = func.append_block("else");
        let b3 = func.append_block("merge");

        let cond_br = InstData::CondBr {
            cond,
            then_dest: b1,
            else_dest: b2,
        };
        func.append_inst(b0, cond_br, Type::Void, "");
        func.append_inst(b1, InstData::Br { dest: b3 }, Type::Void, "");
        func.append_inst(b2, InstData::Br { dest: b3 }, Type::Void, "");
        func.append_inst(b3, InstData::Ret { arg: None }, Type::Void, "");

        let mut cfg = ControlFlowGraph::new();
        cfg.compute(&func);
        assert_eq!(cfg.entry(), Some(b0));
        assert_eq!(cfg.pred_num_of(b3), 2);
        assert!(cfg.is_pred_of(b1, b3));
        assert!(!cfg.is_pred_of(b0, b3));
        assert_eq!(cfg.exits.as_slice(), &[b3]);

        let po: Vec<_> = cfg.post_order().collect();
        assert_eq!(po.len(), 4);
        assert_eq!(po.first(), Some(&b3));
        assert_eq!(po.last(), Some(&b0));
    }
}
