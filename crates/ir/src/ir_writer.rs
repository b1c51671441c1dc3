//! Textual form of modules and functions.
//!
//! The output follows the LLVM assembly conventions: `%` prefixes local names,
//! `@` prefixes functions, and unnamed values and blocks are numbered in
//! definition order.
use std::fmt::{self, Write};

use rustc_hash::FxHashMap;

use crate::{
    inst::{BinaryOp, InstData},
    module::FuncRef,
    types::TypeStore,
    BlockId, Function, InstId, Module, Type, Value, ValueId,
};

pub struct ModuleWriter<'a> {
    module: &'a Module,
}

impl<'a> ModuleWriter<'a> {
    pub fn new(module: &'a Module) -> Self {
        Self { module }
    }

    pub fn dump_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ModuleWriter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let module = self.module;
        writeln!(f, "; ModuleID = '{}'", module.name)?;
        writeln!(f, "source_filename = \"{}\"", module.source_filename)?;
        if let Some(data_layout) = &module.data_layout {
            writeln!(f, "target datalayout = \"{data_layout}\"")?;
        }
        if let Some(triple) = &module.target_triple {
            writeln!(f, "target triple = \"{triple}\"")?;
        }

        // Write struct types defined in the context.
        module.ctx.with_ty_store(|s| {
            let mut structs = s.all_struct_data().peekable();
            if structs.peek().is_some() {
                writeln!(f)?;
            }
            for data in structs {
                data.write_def(f, s)?;
                writeln!(f)?;
            }
            fmt::Result::Ok(())
        })?;

        for func_ref in module.funcs.keys() {
            writeln!(f)?;
            write!(f, "{}", FuncWriter::new(module, func_ref))?;
        }

        Ok(())
    }
}

/// Writes one function and the pieces of it.
pub struct FuncWriter<'a> {
    module: &'a Module,
    func: &'a Function,
    slots: SlotTracker,
}

impl<'a> FuncWriter<'a> {
    pub fn new(module: &'a Module, func_ref: FuncRef) -> Self {
        let func = &module.funcs[func_ref];
        Self {
            module,
            func,
            slots: SlotTracker::new(func),
        }
    }

    /// Writes a single instruction line, indented like in a function body.
    pub fn write_inst(&self, w: &mut impl Write, inst: InstId) -> fmt::Result {
        self.module
            .ctx
            .with_ty_store(|s| self.write_inst_impl(w, s, inst))
    }

    /// Writes a block label followed by its instructions.
    pub fn write_block(&self, w: &mut impl Write, block: BlockId) -> fmt::Result {
        self.module
            .ctx
            .with_ty_store(|s| self.write_block_impl(w, s, block))
    }

    /// Writes `value` as a typed operand, e.g. `i32 %a`.
    pub fn write_typed_value(&self, w: &mut impl Write, value: ValueId) -> fmt::Result {
        self.module.ctx.with_ty_store(|s| self.typed_value(w, s, value))
    }

    /// Writes the label reference of `block`, e.g. `%entry`.
    pub fn write_block_ref(&self, w: &mut impl Write, block: BlockId) -> fmt::Result {
        self.block_ref(w, block)
    }

    fn write_func(&self, w: &mut impl Write, s: &TypeStore) -> fmt::Result {
        let func = self.func;
        let sig = &func.sig;
        let is_decl = func.is_declaration();

        w.write_str(if is_decl { "declare " } else { "define " })?;
        let linkage = sig.linkage().to_string();
        if !linkage.is_empty() {
            write!(w, "{linkage} ")?;
        }
        write!(w, "{} @", s.display(sig.ret_ty()))?;
        write_ident(w, sig.name())?;
        w.write_char('(')?;
        for (idx, &arg) in func.arg_values.iter().enumerate() {
            if idx > 0 {
                w.write_str(", ")?;
            }
            if is_decl {
                write!(w, "{}", s.display(func.dfg.value_ty(arg)))?;
            } else {
                self.typed_value(w, s, arg)?;
            }
        }
        if sig.is_var_arg() {
            if !func.arg_values.is_empty() {
                w.write_str(", ")?;
            }
            w.write_str("...")?;
        }
        w.write_char(')')?;

        if is_decl {
            return writeln!(w);
        }

        writeln!(w, " {{")?;
        for (idx, block) in func.layout.iter_block().enumerate() {
            if idx > 0 {
                writeln!(w)?;
            }
            self.write_block_impl(w, s, block)?;
        }
        writeln!(w, "}}")
    }

    fn write_block_impl(&self, w: &mut impl Write, s: &TypeStore, block: BlockId) -> fmt::Result {
        match self.func.dfg.block_name(block) {
            Some(name) => {
                write_ident(w, name)?;
                writeln!(w, ":")?;
            }
            None => writeln!(w, "{}:", self.slots.blocks[&block])?,
        }

        for inst in self.func.layout.iter_inst(block) {
            self.write_inst_impl(w, s, inst)?;
            writeln!(w)?;
        }
        Ok(())
    }

    fn write_inst_impl(&self, w: &mut impl Write, s: &TypeStore, inst: InstId) -> fmt::Result {
        let dfg = &self.func.dfg;
        w.write_str("  ")?;
        if let Some(result) = dfg.inst_result(inst) {
            self.value_ref(w, result)?;
            w.write_str(" = ")?;
        }

        let data = dfg.inst(inst);
        match data {
            InstData::Binary { op, lhs, rhs } => {
                let op = match op {
                    BinaryOp::Add => "add",
                    BinaryOp::Sub => "sub",
                    BinaryOp::Mul => "mul",
                };
                write!(w, "{op} ")?;
                self.typed_value(w, s, *lhs)?;
                w.write_str(", ")?;
                self.value_ref(w, *rhs)
            }
            InstData::Icmp { pred, lhs, rhs } => {
                write!(w, "icmp {pred} ")?;
                self.typed_value(w, s, *lhs)?;
                w.write_str(", ")?;
                self.value_ref(w, *rhs)
            }
            InstData::Alloca { ty } => write!(w, "alloca {}", s.display(*ty)),
            InstData::Load { ty, ptr } => {
                write!(w, "load {}, ", s.display(*ty))?;
                self.typed_value(w, s, *ptr)
            }
            InstData::Store { value, ptr } => {
                w.write_str("store ")?;
                self.typed_value(w, s, *value)?;
                w.write_str(", ")?;
                self.typed_value(w, s, *ptr)
            }
            InstData::Gep {
                elem_ty,
                ptr,
                indices,
            } => {
                write!(w, "getelementptr {}, ", s.display(*elem_ty))?;
                self.typed_value(w, s, *ptr)?;
                for idx in indices {
                    w.write_str(", ")?;
                    self.typed_value(w, s, *idx)?;
                }
                Ok(())
            }
            InstData::Call { callee, args } => {
                let callee = &self.module.funcs[*callee];
                let sig = &callee.sig;
                if sig.is_var_arg() {
                    write!(w, "call {} @", s.display(sig.func_ty()))?;
                } else {
                    write!(w, "call {} @", s.display(sig.ret_ty()))?;
                }
                write_ident(w, sig.name())?;
                w.write_char('(')?;
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        w.write_str(", ")?;
                    }
                    self.typed_value(w, s, *arg)?;
                }
                w.write_char(')')
            }
            InstData::Phi { args } => {
                let ty = dfg
                    .inst_result(inst)
                    .map_or(Type::Void, |result| dfg.value_ty(result));
                write!(w, "phi {}", s.display(ty))?;
                for (idx, (value, block)) in args.iter().enumerate() {
                    w.write_str(if idx > 0 { ", [ " } else { " [ " })?;
                    self.value_ref(w, *value)?;
                    w.write_str(", ")?;
                    self.block_ref(w, *block)?;
                    w.write_str(" ]")?;
                }
                Ok(())
            }
            InstData::Br { dest } => {
                w.write_str("br label ")?;
                self.block_ref(w, *dest)
            }
            InstData::CondBr {
                cond,
                then_dest,
                else_dest,
            } => {
                w.write_str("br ")?;
                self.typed_value(w, s, *cond)?;
                w.write_str(", label ")?;
                self.block_ref(w, *then_dest)?;
                w.write_str(", label ")?;
                self.block_ref(w, *else_dest)
            }
            InstData::Ret { arg: Some(arg) } => {
                w.write_str("ret ")?;
                self.typed_value(w, s, *arg)
            }
            InstData::Ret { arg: None } => w.write_str("ret void"),
        }
    }

    fn typed_value(&self, w: &mut impl Write, s: &TypeStore, value: ValueId) -> fmt::Result {
        write!(w, "{} ", s.display(self.func.dfg.value_ty(value)))?;
        self.value_ref(w, value)
    }

    fn value_ref(&self, w: &mut impl Write, value: ValueId) -> fmt::Result {
        let dfg = &self.func.dfg;
        if let Value::Const { cst, .. } = dfg.value(value) {
            return write!(w, "{}", dfg.ctx.const_data(*cst));
        }

        match dfg.value_name(value) {
            Some(name) => {
                w.write_char('%')?;
                write_ident(w, name)
            }
            None => match self.slots.values.get(&value) {
                Some(slot) => write!(w, "%{slot}"),
                None => write!(w, "%<badref>"),
            },
        }
    }

    fn block_ref(&self, w: &mut impl Write, block: BlockId) -> fmt::Result {
        match self.func.dfg.block_name(block) {
            Some(name) => {
                w.write_char('%')?;
                write_ident(w, name)
            }
            None => match self.slots.blocks.get(&block) {
                Some(slot) => write!(w, "%{slot}"),
                None => write!(w, "%<badref>"),
            },
        }
    }
}

impl fmt::Display for FuncWriter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.module.ctx.with_ty_store(|s| self.write_func(f, s))
    }
}

/// Numbers for the unnamed arguments, blocks and instruction results of a
/// function.
struct SlotTracker {
    values: FxHashMap<ValueId, u32>,
    blocks: FxHashMap<BlockId, u32>,
}

impl SlotTracker {
    fn new(func: &Function) -> Self {
        let mut values = FxHashMap::default();
        let mut blocks = FxHashMap::default();
        let mut next = 0;

        for &arg in &func.arg_values {
            if func.dfg.value_name(arg).is_none() {
                values.insert(arg, next);
                next += 1;
            }
        }

        for block in func.layout.iter_block() {
            if func.dfg.block_name(block).is_none() {
                blocks.insert(block, next);
                next += 1;
            }
            for inst in func.layout.iter_inst(block) {
                let Some(result) = func.dfg.inst_result(inst) else {
                    continue;
                };
                if func.dfg.value_name(result).is_none() {
                    values.insert(result, next);
                    next += 1;
                }
            }
        }

        Self { values, blocks }
    }
}

/// Writes `name`, quoting it when it contains characters outside of
/// `[-a-zA-Z$._0-9]` or starts with a digit.
pub fn write_ident(w: &mut impl Write, name: &str) -> fmt::Result {
    let is_plain = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '$' | '.' | '_'))
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if is_plain && !name.is_empty() {
        return w.write_str(name);
    }

    w.write_char('"')?;
    for byte in name.bytes() {
        if byte == b'"' || byte == b'\\' || !(0x20..0x7f).contains(&byte) {
            write!(w, "\\{byte:02X}")?;
        } else {
            w.write_char(byte as char)?;
        }
    }
    w.write_char('"')
}
