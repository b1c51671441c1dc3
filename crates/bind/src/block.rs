use quill_ir::{module::FuncRef, BlockId, ValueRef};

use crate::{
    context::ModuleLink,
    dispatch::{self, NativeValue},
    value::{AsValue, Instruction},
    Context, Error, Function, Result, Value,
};

/// A basic block of a function.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct BasicBlock {
    link: ModuleLink,
    func: FuncRef,
    block: BlockId,
}

impl BasicBlock {
    pub(crate) fn new(link: ModuleLink, func: FuncRef, block: BlockId) -> Self {
        Self { link, func, block }
    }

    /// Appends a new empty block named `name` to `function`.
    pub fn create(context: &Context, name: &str, function: &Function) -> Result<BasicBlock> {
        if !function.link().belongs_to(context.inner()) {
            return Err(Error::ForeignContext);
        }
        function.create_basic_block(name)
    }

    pub(crate) fn link(&self) -> &ModuleLink {
        &self.link
    }

    pub(crate) fn func_ref(&self) -> FuncRef {
        self.func
    }

    pub(crate) fn id(&self) -> BlockId {
        self.block
    }

    pub(crate) fn native(&self) -> NativeValue {
        NativeValue::new(self.link.key(), ValueRef::Block(self.func, self.block))
    }

    pub fn name(&self) -> Result<String> {
        dispatch::name_of(&self.link.context()?, self.native())
    }

    /// Renames the block. Returns the name actually assigned.
    pub fn set_name(&self, name: &str) -> Result<String> {
        self.link.with_module_mut(|m| {
            m.funcs[self.func]
                .set_block_name(self.block, name)
                .unwrap_or_default()
        })
    }

    pub fn parent(&self) -> Function {
        Function::new(self.link.clone(), self.func)
    }

    pub fn instructions(&self) -> Result<Vec<Instruction>> {
        let insts: Vec<_> = self
            .link
            .with_module(|m| m.funcs[self.func].layout.iter_inst(self.block).collect())?;
        Ok(insts
            .into_iter()
            .map(|inst| Instruction::new(self.link.clone(), self.func, inst))
            .collect())
    }

    /// Returns the last instruction if it is a terminator.
    pub fn terminator(&self) -> Result<Option<Instruction>> {
        let term = self
            .link
            .with_module(|m| m.funcs[self.func].terminator_of(self.block))?;
        Ok(term.map(|inst| Instruction::new(self.link.clone(), self.func, inst)))
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.link
            .with_module(|m| m.funcs[self.func].layout.is_block_empty(self.block))
    }

    pub fn dump(&self) -> Result<String> {
        dispatch::dump_of(&self.link.context()?, self.native())
    }
}

impl AsValue for BasicBlock {
    fn as_value(&self) -> Value {
        Value::BasicBlock(self.clone())
    }
}
