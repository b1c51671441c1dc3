//! This module contains Quill IR data flow graph.
use cranelift_entity::{entity_impl, packed_option::PackedOption, PrimaryMap, SecondaryMap};
use rustc_hash::FxHashMap;

use crate::{
    constant::{ConstData, ConstId},
    inst::{InstData, InstId},
    Context, Type, Value, ValueId,
};

pub struct DataFlowGraph {
    pub ctx: Context,
    #[doc(hidden)]
    pub blocks: PrimaryMap<BlockId, Block>,
    #[doc(hidden)]
    pub values: PrimaryMap<ValueId, Value>,
    insts: PrimaryMap<InstId, InstData>,
    inst_results: SecondaryMap<InstId, PackedOption<ValueId>>,
    consts: FxHashMap<ConstId, ValueId>,
    value_names: SecondaryMap<ValueId, Option<String>>,
}

impl DataFlowGraph {
    pub fn new(ctx: Context) -> Self {
        Self {
            ctx,
            blocks: PrimaryMap::default(),
            values: PrimaryMap::default(),
            insts: PrimaryMap::default(),
            inst_results: SecondaryMap::default(),
            consts: FxHashMap::default(),
            value_names: SecondaryMap::default(),
        }
    }

    pub fn make_block(&mut self) -> BlockId {
        self.blocks.push(Block::default())
    }

    pub fn make_value(&mut self, value: Value) -> ValueId {
        self.values.push(value)
    }

    pub fn make_inst(&mut self, inst: InstData) -> InstId {
        self.insts.push(inst)
    }

    /// Returns the local value standing for a context constant, creating it on
    /// first use.
    pub fn make_const_value(&mut self, cst: ConstId) -> ValueId {
        if let Some(&value) = self.consts.get(&cst) {
            return value;
        }

        let ty = self.ctx.const_data(cst).ty();
        let value = self.make_value(Value::Const { cst, ty });
        self.consts.insert(cst, value);
        value
    }

    pub fn make_imm_value(&mut self, data: ConstData) -> ValueId {
        let cst = self.ctx.make_const(data);
        self.make_const_value(cst)
    }

    pub fn attach_result(&mut self, inst_id: InstId, value_id: ValueId) {
        debug_assert!(self.inst_results[inst_id].is_none());
        self.inst_results[inst_id] = value_id.into();
    }

    pub fn inst(&self, inst_id: InstId) -> &InstData {
        &self.insts[inst_id]
    }

    pub fn inst_mut(&mut self, inst_id: InstId) -> &mut InstData {
        &mut self.insts[inst_id]
    }

    pub fn num_insts(&self) -> usize {
        self.insts.len()
    }

    pub fn has_inst(&self, inst_id: InstId) -> bool {
        self.insts.is_valid(inst_id)
    }

    pub fn has_block(&self, block: BlockId) -> bool {
        self.blocks.is_valid(block)
    }

    pub fn value(&self, value_id: ValueId) -> &Value {
        &self.values[value_id]
    }

    pub fn value_ty(&self, value_id: ValueId) -> Type {
        self.values[value_id].ty()
    }

    pub fn inst_result(&self, inst_id: InstId) -> Option<ValueId> {
        self.inst_results[inst_id].expand()
    }

    pub fn value_inst(&self, value_id: ValueId) -> Option<InstId> {
        match self.value(value_id) {
            Value::Inst { inst, .. } => Some(*inst),
            _ => None,
        }
    }

    pub fn value_const(&self, value_id: ValueId) -> Option<ConstId> {
        match self.value(value_id) {
            Value::Const { cst, .. } => Some(*cst),
            _ => None,
        }
    }

    pub fn is_terminator(&self, inst_id: InstId) -> bool {
        self.inst(inst_id).is_terminator()
    }

    pub fn is_phi(&self, inst_id: InstId) -> bool {
        self.inst(inst_id).is_phi()
    }

    pub fn append_phi_arg(&mut self, inst_id: InstId, value: ValueId, block: BlockId) -> bool {
        self.insts[inst_id].append_phi_arg(value, block)
    }

    pub fn value_name(&self, value_id: ValueId) -> Option<&str> {
        self.value_names[value_id].as_deref()
    }

    pub(crate) fn set_value_name(&mut self, value_id: ValueId, name: Option<String>) {
        self.value_names[value_id] = name;
    }

    pub fn block_name(&self, block: BlockId) -> Option<&str> {
        self.blocks[block].name.as_deref()
    }

    pub(crate) fn set_block_name(&mut self, block: BlockId, name: Option<String>) {
        self.blocks[block].name = name;
    }
}

/// An opaque reference to [`Block`]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BlockId(pub u32);
entity_impl!(BlockId, "block");

/// A block data definition.
/// A Block data doesn't hold any information for layout of a program. It is
/// managed by [`super::layout::Layout`].
#[derive(Debug, Clone, Default)]
pub struct Block {
    name: Option<String>,
}
