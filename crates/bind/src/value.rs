//! Value handles.
//!
//! Every handle except a constant is a non-owning reference into the graph of
//! a module. Once that module is dropped, every query on the handle fails with
//! [`Error::StaleHandle`].
use quill_ir::{module::FuncRef, ConstData, ConstId, InstId, Opcode, ValueRef};
use tracing::trace;

use crate::{
    context::{ContextRef, ModuleLink},
    dispatch::{self, HandleFactory, NativeValue, ValueKind},
    operand::{self, Site},
    Argument, BasicBlock, Error, Function, Result, Type,
};

/// A handle to anything usable as an operand, tagged with its most specific
/// kind.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Value {
    Constant(Constant),
    Instruction(Instruction),
    BasicBlock(BasicBlock),
    Argument(Argument),
    Generic(GenericValue),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Constant(_) => ValueKind::Constant,
            Self::Instruction(_) => ValueKind::Instruction,
            Self::BasicBlock(_) => ValueKind::BasicBlock,
            Self::Argument(_) => ValueKind::Argument,
            Self::Generic(_) => ValueKind::Generic,
        }
    }

    /// Returns the type of the value. Functions are pointers to their
    /// function type, blocks are labels and void instructions are void.
    pub fn ty(&self) -> Result<Type> {
        dispatch::type_of(&self.context()?, self.native())
    }

    /// Returns the name of the value, or an empty string if it is unnamed.
    pub fn name(&self) -> Result<String> {
        dispatch::name_of(&self.context()?, self.native())
    }

    pub fn dump(&self) -> Result<String> {
        dispatch::dump_of(&self.context()?, self.native())
    }

    pub fn as_constant(&self) -> Option<&Constant> {
        match self {
            Self::Constant(cst) => Some(cst),
            _ => None,
        }
    }

    pub fn as_instruction(&self) -> Option<&Instruction> {
        match self {
            Self::Instruction(inst) => Some(inst),
            _ => None,
        }
    }

    pub fn as_basic_block(&self) -> Option<&BasicBlock> {
        match self {
            Self::BasicBlock(block) => Some(block),
            _ => None,
        }
    }

    pub fn as_argument(&self) -> Option<&Argument> {
        match self {
            Self::Argument(arg) => Some(arg),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<Function> {
        self.as_constant().and_then(Constant::as_function)
    }

    pub fn as_phi(&self) -> Result<Option<PhiNode>> {
        match self {
            Self::Instruction(inst) => inst.as_phi(),
            _ => Ok(None),
        }
    }

    pub(crate) fn native(&self) -> NativeValue {
        match self {
            Self::Constant(cst) => cst.native(),
            Self::Instruction(inst) => inst.native(),
            Self::BasicBlock(block) => block.native(),
            Self::Argument(arg) => arg.native(),
            Self::Generic(value) => value.native,
        }
    }

    pub(crate) fn belongs_to(&self, ctx: &ContextRef) -> bool {
        match self {
            Self::Constant(cst) => cst.belongs_to(ctx),
            Self::Instruction(inst) => inst.link.belongs_to(ctx),
            Self::BasicBlock(block) => block.link().belongs_to(ctx),
            Self::Argument(arg) => arg.link().belongs_to(ctx),
            Self::Generic(value) => &value.ctx == ctx,
        }
    }

    fn context(&self) -> Result<ContextRef> {
        match self {
            Self::Constant(cst) => cst.context(),
            Self::Instruction(inst) => inst.link.context(),
            Self::BasicBlock(block) => block.link().context(),
            Self::Argument(arg) => arg.link().context(),
            Self::Generic(value) => Ok(value.ctx.clone()),
        }
    }
}

/// Conversion of a handle into a [`Value`], used by every operation taking
/// operands.
pub trait AsValue {
    fn as_value(&self) -> Value;
}

impl AsValue for Value {
    fn as_value(&self) -> Value {
        self.clone()
    }
}

impl AsValue for Constant {
    fn as_value(&self) -> Value {
        Value::Constant(self.clone())
    }
}

impl AsValue for Instruction {
    fn as_value(&self) -> Value {
        Value::Instruction(self.clone())
    }
}

impl AsValue for PhiNode {
    fn as_value(&self) -> Value {
        Value::Instruction(self.0.clone())
    }
}

impl AsValue for GenericValue {
    fn as_value(&self) -> Value {
        Value::Generic(self.clone())
    }
}

/// A constant of the context, or a function used as a value.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Constant(ConstantRepr);

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
enum ConstantRepr {
    Data { ctx: ContextRef, cst: ConstId },
    Function(Function),
}

impl Constant {
    pub(crate) fn data(ctx: ContextRef, cst: ConstId) -> Self {
        Self(ConstantRepr::Data { ctx, cst })
    }

    pub(crate) fn function(func: Function) -> Self {
        Self(ConstantRepr::Function(func))
    }

    pub fn ty(&self) -> Result<Type> {
        self.as_value().ty()
    }

    pub fn dump(&self) -> Result<String> {
        self.as_value().dump()
    }

    /// Returns the function this constant stands for, if any.
    pub fn as_function(&self) -> Option<Function> {
        match &self.0 {
            ConstantRepr::Function(func) => Some(func.clone()),
            ConstantRepr::Data { .. } => None,
        }
    }

    pub fn int_value(&self) -> Option<i128> {
        self.const_data().and_then(|data| data.as_int())
    }

    pub fn float_value(&self) -> Option<f64> {
        self.const_data().and_then(|data| data.as_float())
    }

    pub fn is_null(&self) -> bool {
        matches!(self.const_data(), Some(ConstData::Null { .. }))
    }

    pub fn is_undef(&self) -> bool {
        matches!(self.const_data(), Some(ConstData::Undef { .. }))
    }

    fn const_data(&self) -> Option<ConstData> {
        match &self.0 {
            ConstantRepr::Data { ctx, cst } => Some(ctx.ir.const_data(*cst)),
            ConstantRepr::Function(_) => None,
        }
    }

    pub(crate) fn native(&self) -> NativeValue {
        match &self.0 {
            ConstantRepr::Data { cst, .. } => NativeValue::constant(*cst),
            ConstantRepr::Function(func) => func.native(),
        }
    }

    fn belongs_to(&self, ctx: &ContextRef) -> bool {
        match &self.0 {
            ConstantRepr::Data { ctx: own, .. } => own == ctx,
            ConstantRepr::Function(func) => func.link().belongs_to(ctx),
        }
    }

    fn context(&self) -> Result<ContextRef> {
        match &self.0 {
            ConstantRepr::Data { ctx, .. } => Ok(ctx.clone()),
            ConstantRepr::Function(func) => func.link().context(),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Instruction {
    link: ModuleLink,
    func: FuncRef,
    inst: InstId,
}

impl Instruction {
    pub(crate) fn new(link: ModuleLink, func: FuncRef, inst: InstId) -> Self {
        Self { link, func, inst }
    }

    pub(crate) fn native(&self) -> NativeValue {
        NativeValue::new(self.link.key(), ValueRef::Inst(self.func, self.inst))
    }

    pub fn opcode(&self) -> Result<Opcode> {
        self.link
            .with_module(|m| m.funcs[self.func].dfg.inst(self.inst).opcode())
    }

    /// Returns the result type, which is void for instructions without a
    /// result.
    pub fn ty(&self) -> Result<Type> {
        self.as_value().ty()
    }

    pub fn name(&self) -> Result<String> {
        self.as_value().name()
    }

    /// Names the result of the instruction. Returns the name actually
    /// assigned, which gets a numeric suffix if `name` is already used in the
    /// function.
    pub fn set_name(&self, name: &str) -> Result<String> {
        self.link
            .with_module_mut(|m| {
                let func = &mut m.funcs[self.func];
                let value = func.dfg.inst_result(self.inst)?;
                Some(func.set_value_name(value, name).unwrap_or_default())
            })?
            .ok_or_else(|| Error::InvalidType("a void instruction cannot be named".to_string()))
    }

    pub fn parent(&self) -> Result<BasicBlock> {
        let block = self
            .link
            .with_module(|m| m.funcs[self.func].layout.inst_block(self.inst))?
            .ok_or(Error::StaleHandle)?;
        Ok(BasicBlock::new(self.link.clone(), self.func, block))
    }

    pub fn function(&self) -> Function {
        Function::new(self.link.clone(), self.func)
    }

    pub fn is_terminator(&self) -> Result<bool> {
        self.link
            .with_module(|m| m.funcs[self.func].dfg.is_terminator(self.inst))
    }

    pub fn as_phi(&self) -> Result<Option<PhiNode>> {
        let is_phi = self
            .link
            .with_module(|m| m.funcs[self.func].dfg.is_phi(self.inst))?;
        Ok(is_phi.then(|| PhiNode::new(self.clone())))
    }

    pub fn dump(&self) -> Result<String> {
        self.as_value().dump()
    }
}

/// A phi instruction.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct PhiNode(Instruction);

impl PhiNode {
    pub(crate) fn new(inst: Instruction) -> Self {
        Self(inst)
    }

    pub fn as_instruction(&self) -> &Instruction {
        &self.0
    }

    /// Appends the incoming pair (`value`, `block`).
    ///
    /// `value` must have the type of the phi. Whether `block` is a
    /// predecessor of the phi's block is left to verification.
    pub fn add_incoming(&self, value: &impl AsValue, block: &BasicBlock) -> Result<()> {
        let phi = &self.0;
        let site = Site::new(phi.link.clone(), phi.func)?;
        let incoming = site.resolve(&value.as_value())?;
        let pred = site.resolve_block(&block.as_value())?;

        let phi_ty = phi.ty()?.raw();
        if incoming.ty != phi_ty {
            return Err(site.mismatch(phi_ty, incoming.ty));
        }

        let appended = phi.link.with_module_mut(|m| {
            let func = &mut m.funcs[phi.func];
            let value = incoming.operand.materialize(func);
            func.dfg.append_phi_arg(phi.inst, value, pred)
        })?;
        debug_assert!(appended, "{} is not a phi", phi.inst);
        trace!(phi = %phi.inst, block = %pred, "added incoming value");
        Ok(())
    }

    pub fn num_incoming(&self) -> Result<usize> {
        let phi = &self.0;
        phi.link.with_module(|m| {
            m.funcs[phi.func]
                .dfg
                .inst(phi.inst)
                .phi_args()
                .map_or(0, <[_]>::len)
        })
    }

    pub fn incoming_value(&self, idx: usize) -> Result<Value> {
        let phi = &self.0;
        let (value, count) = phi.link.with_module(|m| {
            let func = &m.funcs[phi.func];
            let args = func.dfg.inst(phi.inst).phi_args().unwrap_or_default();
            let value = args
                .get(idx)
                .map(|(value, _)| operand::value_ref(phi.func, func, *value));
            (value, args.len())
        })?;
        let value = value.ok_or(Error::OutOfRange {
            entity: "incoming value",
            index: idx,
            count,
        })?;

        let factory = HandleFactory::new(phi.link.context()?);
        Ok(factory.wrap_native(NativeValue::new(phi.link.key(), value)))
    }

    pub fn incoming_block(&self, idx: usize) -> Result<BasicBlock> {
        let phi = &self.0;
        let (block, count) = phi.link.with_module(|m| {
            let args = m.funcs[phi.func]
                .dfg
                .inst(phi.inst)
                .phi_args()
                .unwrap_or_default();
            (args.get(idx).map(|(_, block)| *block), args.len())
        })?;
        let block = block.ok_or(Error::OutOfRange {
            entity: "incoming block",
            index: idx,
            count,
        })?;
        Ok(BasicBlock::new(phi.link.clone(), phi.func, block))
    }
}

/// A value no more specific handle applies to.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct GenericValue {
    ctx: ContextRef,
    native: NativeValue,
}

impl GenericValue {
    pub(crate) fn new(ctx: ContextRef, native: NativeValue) -> Self {
        Self { ctx, native }
    }

    pub fn native(&self) -> NativeValue {
        self.native
    }
}
