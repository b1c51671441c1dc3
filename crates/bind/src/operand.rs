//! Resolution of operand handles against the function being built.
//!
//! Resolving never touches the graph. Constants are only materialized in the
//! function once the whole instruction has been validated.
use quill_ir::{self as ir, module::FuncRef, BlockId, ConstId, Value as IrValue, ValueId, ValueRef};

use crate::{
    context::{ContextRef, ModuleLink},
    dispatch::{HandleFactory, NativeValue, Unwrapped},
    Error, Result, Value,
};

#[derive(Debug, Clone, Copy)]
pub(crate) enum Operand {
    Local(ValueId),
    Const(ConstId),
}

impl Operand {
    pub(crate) fn materialize(self, func: &mut ir::Function) -> ValueId {
        match self {
            Self::Local(value) => value,
            Self::Const(cst) => func.dfg.make_const_value(cst),
        }
    }

    pub(crate) fn as_const(self) -> Option<ConstId> {
        match self {
            Self::Const(cst) => Some(cst),
            Self::Local(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Resolved {
    pub(crate) operand: Operand,
    pub(crate) ty: ir::Type,
}

/// The function operands are resolved against.
pub(crate) struct Site {
    pub(crate) ctx: ContextRef,
    pub(crate) link: ModuleLink,
    pub(crate) func: FuncRef,
}

impl Site {
    pub(crate) fn new(link: ModuleLink, func: FuncRef) -> Result<Self> {
        let ctx = link.context()?;
        Ok(Self { ctx, link, func })
    }

    pub(crate) fn resolve(&self, value: &Value) -> Result<Resolved> {
        let native = self.unwrap(value)?;
        match native.value() {
            ValueRef::Const(cst) => Ok(Resolved {
                operand: Operand::Const(cst),
                ty: self.ctx.ir.const_data(cst).ty(),
            }),
            ValueRef::Func(_) => Err(Error::operand(
                "a function can only be used as a call target",
            )),
            ValueRef::Block(..) => Err(Error::operand(
                "a basic block can only be used as a branch target",
            )),
            ValueRef::Arg(func, _) | ValueRef::Inst(func, _) if !self.is_local(native, func) => {
                Err(Error::operand("value belongs to a different function"))
            }
            ValueRef::Arg(_, idx) => self.link.with_module(|m| {
                let func = &m.funcs[self.func];
                let value = func.arg_values[idx as usize];
                Resolved {
                    operand: Operand::Local(value),
                    ty: func.dfg.value_ty(value),
                }
            }),
            ValueRef::Inst(_, inst) => self
                .link
                .with_module(|m| {
                    let func = &m.funcs[self.func];
                    func.dfg.inst_result(inst).map(|value| Resolved {
                        operand: Operand::Local(value),
                        ty: func.dfg.value_ty(value),
                    })
                })?
                .ok_or_else(|| Error::operand("instruction does not produce a value")),
        }
    }

    pub(crate) fn resolve_block(&self, value: &Value) -> Result<BlockId> {
        if !matches!(value, Value::BasicBlock(_)) {
            return Err(Error::WrongHandleKind {
                expected: "basic block",
                found: value.kind().as_str(),
            });
        }

        let native = self.unwrap(value)?;
        match native.value() {
            ValueRef::Block(func, block) if self.is_local(native, func) => Ok(block),
            _ => Err(Error::operand("basic block belongs to a different function")),
        }
    }

    pub(crate) fn resolve_callee(&self, value: &Value) -> Result<FuncRef> {
        let native = self.unwrap(value)?;
        match native.value() {
            ValueRef::Func(func) if native.module() == Some(self.link.key()) => Ok(func),
            ValueRef::Func(_) => Err(Error::operand("callee belongs to a different module")),
            _ => Err(Error::WrongHandleKind {
                expected: "function",
                found: value.kind().as_str(),
            }),
        }
    }

    pub(crate) fn display(&self, ty: ir::Type) -> String {
        self.ctx.ir.with_ty_store(|s| s.display(ty).to_string())
    }

    pub(crate) fn mismatch(&self, expected: ir::Type, found: ir::Type) -> Error {
        Error::mismatch(self.display(expected), self.display(found))
    }

    fn unwrap(&self, value: &Value) -> Result<NativeValue> {
        match HandleFactory::new(self.ctx.clone()).unwrap(Some(value)) {
            Unwrapped::Native(native) => Ok(native),
            Unwrapped::Null => Err(Error::operand("value is null")),
            Unwrapped::Invalid(reason) => Err(Error::operand(reason)),
        }
    }

    fn is_local(&self, native: NativeValue, func: FuncRef) -> bool {
        native.module() == Some(self.link.key()) && func == self.func
    }
}

/// Returns the module-wide reference of a function-local value.
pub(crate) fn value_ref(func_ref: FuncRef, func: &ir::Function, value: ValueId) -> ValueRef {
    match *func.dfg.value(value) {
        IrValue::Inst { inst, .. } => ValueRef::Inst(func_ref, inst),
        IrValue::Arg { idx, .. } => ValueRef::Arg(func_ref, idx),
        IrValue::Const { cst, .. } => ValueRef::Const(cst),
    }
}
