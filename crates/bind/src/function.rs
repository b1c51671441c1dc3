use quill_ir::{self as ir, module::FuncRef, FuncWriter, Linkage, ValueRef};
use quill_verifier::verify_function;
use tracing::debug;

use crate::{
    context::ModuleLink,
    dispatch::{self, NativeValue},
    module::Verification,
    types::FunctionType,
    value::{AsValue, Constant},
    BasicBlock, Error, Result, Type, Value,
};

/// A function of a module.
///
/// The module owns the function; the handle only refers to it.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Function {
    link: ModuleLink,
    func: FuncRef,
}

impl Function {
    pub(crate) fn new(link: ModuleLink, func: FuncRef) -> Self {
        Self { link, func }
    }

    pub(crate) fn link(&self) -> &ModuleLink {
        &self.link
    }

    pub(crate) fn func_ref(&self) -> FuncRef {
        self.func
    }

    pub(crate) fn native(&self) -> NativeValue {
        NativeValue::new(self.link.key(), ValueRef::Func(self.func))
    }

    fn with_func<R>(&self, f: impl FnOnce(&ir::Function) -> R) -> Result<R> {
        self.link.with_module(|m| f(&m.funcs[self.func]))
    }

    fn with_func_mut<R>(&self, f: impl FnOnce(&mut ir::Function) -> R) -> Result<R> {
        self.link.with_module_mut(|m| f(&mut m.funcs[self.func]))
    }

    pub fn name(&self) -> Result<String> {
        self.with_func(|func| func.sig.name().to_string())
    }

    /// Renames the function. A name already used by another function of the
    /// module gets a numeric suffix; the assigned name is returned.
    pub fn set_name(&self, name: &str) -> Result<String> {
        let (old, new) = self.link.with_module_mut(|m| {
            let old = m.funcs[self.func].sig.name().to_string();
            (old, m.rename_function(self.func, name))
        })?;
        if new != name {
            debug!(requested = name, assigned = %new, "renamed function to avoid a clash");
        } else if old != new {
            debug!(old = %old, new = %new, "renamed function");
        }
        Ok(new)
    }

    pub fn linkage(&self) -> Result<Linkage> {
        self.with_func(|func| func.sig.linkage())
    }

    pub fn set_linkage(&self, linkage: Linkage) -> Result<()> {
        self.with_func_mut(|func| func.sig.update_linkage(linkage))
    }

    pub fn function_type(&self) -> Result<FunctionType> {
        let ty = self.with_func(|func| func.sig.func_ty())?;
        Type::new(self.link.context()?, ty).try_into()
    }

    pub fn return_type(&self) -> Result<Type> {
        let ty = self.with_func(|func| func.sig.ret_ty())?;
        Ok(Type::new(self.link.context()?, ty))
    }

    pub fn argument_count(&self) -> Result<usize> {
        self.with_func(|func| func.arg_values.len())
    }

    pub fn argument(&self, idx: usize) -> Result<Argument> {
        let count = self.argument_count()?;
        if idx >= count {
            return Err(Error::OutOfRange {
                entity: "argument",
                index: idx,
                count,
            });
        }
        Ok(Argument::new(self.link.clone(), self.func, idx as u32))
    }

    pub fn arguments(&self) -> Result<Vec<Argument>> {
        let count = self.argument_count()?;
        Ok((0..count as u32)
            .map(|idx| Argument::new(self.link.clone(), self.func, idx))
            .collect())
    }

    /// Appends an empty block. An empty name leaves the block unnamed.
    pub fn create_basic_block(&self, name: &str) -> Result<BasicBlock> {
        let block = self.with_func_mut(|func| func.append_block(name))?;
        Ok(BasicBlock::new(self.link.clone(), self.func, block))
    }

    /// Returns the blocks in layout order.
    pub fn basic_blocks(&self) -> Result<Vec<BasicBlock>> {
        let blocks: Vec<_> = self.with_func(|func| func.layout.iter_block().collect())?;
        Ok(blocks
            .into_iter()
            .map(|block| BasicBlock::new(self.link.clone(), self.func, block))
            .collect())
    }

    pub fn entry_block(&self) -> Result<Option<BasicBlock>> {
        let entry = self.with_func(|func| func.layout.entry_block())?;
        Ok(entry.map(|block| BasicBlock::new(self.link.clone(), self.func, block)))
    }

    /// A function without blocks is a declaration.
    pub fn is_declaration(&self) -> Result<bool> {
        self.with_func(ir::Function::is_declaration)
    }

    pub fn as_constant(&self) -> Constant {
        Constant::function(self.clone())
    }

    pub fn dump(&self) -> Result<String> {
        self.link
            .with_module(|m| FuncWriter::new(m, self.func).to_string())
    }

    /// Verifies this function alone, with the configuration of its context.
    pub fn verify(&self) -> Result<Verification> {
        let ctx = self.link.context()?;
        let report = self
            .link
            .with_module(|m| verify_function(m, self.func, &ctx.config.verification))?;
        Ok(Verification::from_report(&report))
    }
}

impl AsValue for Function {
    fn as_value(&self) -> Value {
        Value::Constant(self.as_constant())
    }
}

/// An argument of a function, identified by its position.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Argument {
    link: ModuleLink,
    func: FuncRef,
    idx: u32,
}

impl Argument {
    pub(crate) fn new(link: ModuleLink, func: FuncRef, idx: u32) -> Self {
        Self { link, func, idx }
    }

    pub(crate) fn link(&self) -> &ModuleLink {
        &self.link
    }

    pub(crate) fn native(&self) -> NativeValue {
        NativeValue::new(self.link.key(), ValueRef::Arg(self.func, self.idx))
    }

    pub fn name(&self) -> Result<String> {
        dispatch::name_of(&self.link.context()?, self.native())
    }

    /// Names the argument. Returns the name actually assigned.
    pub fn set_name(&self, name: &str) -> Result<String> {
        self.link.with_module_mut(|m| {
            let func = &mut m.funcs[self.func];
            let value = func.arg_values[self.idx as usize];
            func.set_value_name(value, name).unwrap_or_default()
        })
    }

    pub fn ty(&self) -> Result<Type> {
        dispatch::type_of(&self.link.context()?, self.native())
    }

    pub fn parent(&self) -> Function {
        Function::new(self.link.clone(), self.func)
    }

    pub fn arg_no(&self) -> u32 {
        self.idx
    }

    pub fn dump(&self) -> Result<String> {
        dispatch::dump_of(&self.link.context()?, self.native())
    }
}

impl AsValue for Argument {
    fn as_value(&self) -> Value {
        Value::Argument(self.clone())
    }
}
