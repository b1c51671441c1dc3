//! Selection of the most specific handle for a native value.
//!
//! Classification happens once, when a native value crosses into the handle
//! layer, and yields a [`Value`] variant. The membership predicates are tried
//! in a fixed order: constant, instruction, basic block, argument. The first
//! predicate that holds wins and a value matching none of them gets a
//! [`GenericValue`] handle.
use std::fmt::Write;

use quill_ir::{self as ir, ir_writer::write_ident, FuncWriter, ValueClass, ValueRef};
use tracing::trace;

use crate::{
    context::{ContextRef, ModuleKey, ModuleLink},
    value::{Constant, GenericValue, Instruction},
    Argument, BasicBlock, Error, Function, Result, Type, Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Constant,
    Instruction,
    BasicBlock,
    Argument,
    Generic,
}

impl ValueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Constant => "constant",
            Self::Instruction => "instruction",
            Self::BasicBlock => "basic block",
            Self::Argument => "argument",
            Self::Generic => "value",
        }
    }
}

/// Picks the handle kind for `value`.
pub fn classify(value: &impl ValueClass) -> ValueKind {
    if value.is_constant() {
        ValueKind::Constant
    } else if value.is_instruction() {
        ValueKind::Instruction
    } else if value.is_basic_block() {
        ValueKind::BasicBlock
    } else if value.is_argument() {
        ValueKind::Argument
    } else {
        ValueKind::Generic
    }
}

/// A native value together with the module it lives in.
///
/// Constants live in the context and carry no module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeValue {
    module: Option<ModuleKey>,
    value: ValueRef,
}

impl NativeValue {
    pub(crate) fn new(module: ModuleKey, value: ValueRef) -> Self {
        let module = match value {
            ValueRef::Const(_) => None,
            _ => Some(module),
        };
        Self { module, value }
    }

    pub(crate) fn constant(cst: ir::ConstId) -> Self {
        Self {
            module: None,
            value: ValueRef::Const(cst),
        }
    }

    pub fn value(&self) -> ValueRef {
        self.value
    }

    pub(crate) fn module(&self) -> Option<ModuleKey> {
        self.module
    }
}

/// Outcome of [`HandleFactory::unwrap`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unwrapped {
    Null,
    /// The handle refers to something that can't be used here, e.g. a value
    /// of another context or of a dropped module.
    Invalid(String),
    Native(NativeValue),
}

/// Converts between native values and handles of one context.
#[derive(Debug, Clone)]
pub struct HandleFactory {
    ctx: ContextRef,
}

impl HandleFactory {
    pub(crate) fn new(ctx: ContextRef) -> Self {
        Self { ctx }
    }

    /// Wraps `native` in the most specific handle. A missing value gives a
    /// missing handle.
    pub fn wrap(&self, native: Option<NativeValue>) -> Option<Value> {
        native.map(|native| self.wrap_native(native))
    }

    pub(crate) fn wrap_native(&self, native: NativeValue) -> Value {
        let kind = classify(&native.value);
        trace!(kind = kind.as_str(), value = ?native.value, "dispatch");

        let link = native.module.map(|key| ModuleLink::new(&self.ctx, key));
        match (kind, native.value, link) {
            (ValueKind::Constant, ValueRef::Const(cst), _) => {
                Value::Constant(Constant::data(self.ctx.clone(), cst))
            }
            (ValueKind::Constant, ValueRef::Func(func), Some(link)) => {
                Value::Constant(Function::new(link, func).as_constant())
            }
            (ValueKind::Instruction, ValueRef::Inst(func, inst), Some(link)) => {
                Value::Instruction(Instruction::new(link, func, inst))
            }
            (ValueKind::BasicBlock, ValueRef::Block(func, block), Some(link)) => {
                Value::BasicBlock(BasicBlock::new(link, func, block))
            }
            (ValueKind::Argument, ValueRef::Arg(func, idx), Some(link)) => {
                Value::Argument(Argument::new(link, func, idx))
            }
            _ => Value::Generic(GenericValue::new(self.ctx.clone(), native)),
        }
    }

    /// Returns the native value behind `handle`.
    ///
    /// Handles of another context, of a dropped module, or of something that
    /// no longer exists are [`Unwrapped::Invalid`].
    pub fn unwrap(&self, handle: Option<&Value>) -> Unwrapped {
        let Some(handle) = handle else {
            return Unwrapped::Null;
        };
        if !handle.belongs_to(&self.ctx) {
            return Unwrapped::Invalid("value belongs to a different context".to_string());
        }

        let native = handle.native();
        if let Some(key) = native.module {
            match self.ctx.with_module(key, |m| m.contains(native.value)) {
                Ok(true) => {}
                Ok(false) => {
                    return Unwrapped::Invalid("value does not exist in its module".to_string())
                }
                Err(_) => {
                    return Unwrapped::Invalid(
                        "value belongs to a module that has been dropped".to_string(),
                    )
                }
            }
        }
        Unwrapped::Native(native)
    }
}

fn with_live<F, R>(ctx: &ContextRef, native: NativeValue, f: F) -> Result<R>
where
    F: FnOnce(&ir::Module) -> R,
{
    let key = native.module.ok_or(Error::StaleHandle)?;
    ctx.with_module(key, |m| m.contains(native.value).then(|| f(m)))?
        .ok_or(Error::StaleHandle)
}

pub(crate) fn type_of(ctx: &ContextRef, native: NativeValue) -> Result<Type> {
    let ty = match native.value {
        ValueRef::Const(cst) => ctx.ir.const_data(cst).ty(),
        value => with_live(ctx, native, |m| m.value_ty(value))?,
    };
    Ok(Type::new(ctx.clone(), ty))
}

/// Returns the name of a value, or an empty string if it has none.
pub(crate) fn name_of(ctx: &ContextRef, native: NativeValue) -> Result<String> {
    match native.value {
        ValueRef::Const(_) => Ok(String::new()),
        value => with_live(ctx, native, |m| {
            m.value_name(value).unwrap_or_default().to_string()
        }),
    }
}

/// Renders a value the way the textual IR shows it: an instruction or block
/// in full, anything else as a typed operand.
pub(crate) fn dump_of(ctx: &ContextRef, native: NativeValue) -> Result<String> {
    let mut text = String::new();
    match native.value {
        ValueRef::Const(cst) => {
            let data = ctx.ir.const_data(cst);
            let ty = ctx.ir.with_ty_store(|s| s.display(data.ty()).to_string());
            let _ = write!(text, "{ty} {data}");
        }
        ValueRef::Func(func) => {
            let (ty, name) = with_live(ctx, native, |m| {
                (m.value_ty(native.value), m.funcs[func].sig.name().to_string())
            })?;
            let ty = ctx.ir.with_ty_store(|s| s.display(ty).to_string());
            let _ = write!(text, "{ty} @");
            let _ = write_ident(&mut text, &name);
        }
        ValueRef::Arg(func, idx) => {
            with_live(ctx, native, |m| {
                let value = m.funcs[func].arg_values[idx as usize];
                let _ = FuncWriter::new(m, func).write_typed_value(&mut text, value);
            })?;
        }
        ValueRef::Inst(func, inst) => {
            with_live(ctx, native, |m| {
                let _ = FuncWriter::new(m, func).write_inst(&mut text, inst);
            })?;
        }
        ValueRef::Block(func, block) => {
            with_live(ctx, native, |m| {
                let _ = FuncWriter::new(m, func).write_block(&mut text, block);
            })?;
        }
    }
    Ok(text.trim().to_string())
}
