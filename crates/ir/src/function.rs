use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use super::{BlockId, DataFlowGraph, InstData, InstId, Layout, Type, ValueId};
use crate::{types::TypeStore, Context, Linkage, Value};

pub struct Function {
    pub sig: Signature,
    pub arg_values: SmallVec<[ValueId; 8]>,
    pub dfg: DataFlowGraph,
    pub layout: Layout,
    symbols: LocalSymbols,
}

impl Function {
    pub fn new(ctx: &Context, sig: Signature) -> Self {
        let mut dfg = DataFlowGraph::new(ctx.clone());
        let arg_values = sig
            .args()
            .iter()
            .enumerate()
            .map(|(idx, ty)| {
                dfg.make_value(Value::Arg {
                    idx: idx as u32,
                    ty: *ty,
                })
            })
            .collect();

        Self {
            sig,
            arg_values,
            dfg,
            layout: Layout::default(),
            symbols: LocalSymbols::default(),
        }
    }

    pub fn ctx(&self) -> &Context {
        &self.dfg.ctx
    }

    /// A function without any block is a declaration.
    pub fn is_declaration(&self) -> bool {
        self.layout.entry_block().is_none()
    }

    pub fn arg_value(&self, idx: usize) -> Option<ValueId> {
        self.arg_values.get(idx).copied()
    }

    /// Makes a new block and appends it to the end of the function.
    pub fn append_block(&mut self, name: &str) -> BlockId {
        let block = self.dfg.make_block();
        let name = self.symbols.make_unique(name);
        self.dfg.set_block_name(block, name);
        self.layout.append_block(block);
        block
    }

    /// Makes `data` and appends it to `block`.
    ///
    /// A result value of `result_ty` is attached unless the type is void. The
    /// name is ignored for instructions without a result.
    pub fn append_inst(
        &mut self,
        block: BlockId,
        data: InstData,
        result_ty: Type,
        name: &str,
    ) -> (InstId, Option<ValueId>) {
        let inst = self.dfg.make_inst(data);
        self.layout.append_inst(inst, block);

        if result_ty.is_void() {
            return (inst, None);
        }

        let value = self.dfg.make_value(Value::Inst {
            inst,
            ty: result_ty,
        });
        self.dfg.attach_result(inst, value);
        let name = self.symbols.make_unique(name);
        self.dfg.set_value_name(value, name);
        (inst, Some(value))
    }

    /// Renames an argument or instruction result. Returns the name actually
    /// assigned, which differs from `name` when `name` is already in use.
    pub fn set_value_name(&mut self, value: ValueId, name: &str) -> Option<String> {
        if let Some(old) = self.dfg.value_name(value) {
            if old == name {
                return Some(old.to_string());
            }
            let old = old.to_string();
            self.symbols.release(&old);
        }
        let name = self.symbols.make_unique(name);
        self.dfg.set_value_name(value, name.clone());
        name
    }

    pub fn set_block_name(&mut self, block: BlockId, name: &str) -> Option<String> {
        if let Some(old) = self.dfg.block_name(block) {
            if old == name {
                return Some(old.to_string());
            }
            let old = old.to_string();
            self.symbols.release(&old);
        }
        let name = self.symbols.make_unique(name);
        self.dfg.set_block_name(block, name.clone());
        name
    }

    /// Returns the terminator of `block`, which is its last instruction if
    /// that instruction is a terminator.
    pub fn terminator_of(&self, block: BlockId) -> Option<InstId> {
        let last = self.layout.last_inst_of(block)?;
        self.dfg.is_terminator(last).then_some(last)
    }
}

/// Names of the blocks, arguments and instruction results of one function.
///
/// A clashing name gets a counter appended (`x`, `x1`, `x2`, ...). A `.` is
/// inserted before the counter when the base name already ends in a digit.
#[derive(Debug, Default)]
struct LocalSymbols {
    names: FxHashSet<String>,
    last_unique: u32,
}

impl LocalSymbols {
    fn make_unique(&mut self, name: &str) -> Option<String> {
        if name.is_empty() {
            return None;
        }

        if self.names.insert(name.to_string()) {
            return Some(name.to_string());
        }

        let sep = if name.ends_with(|c: char| c.is_ascii_digit()) {
            "."
        } else {
            ""
        };
        loop {
            self.last_unique += 1;
            let candidate = format!("{name}{sep}{}", self.last_unique);
            if self.names.insert(candidate.clone()) {
                return Some(candidate);
            }
        }
    }

    fn release(&mut self, name: &str) {
        self.names.remove(name);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Signature {
    /// Name of the function.
    name: String,

    /// Linkage of the function.
    linkage: Linkage,

    /// The function type the signature was made from.
    func_ty: Type,
    args: SmallVec<[Type; 8]>,
    ret_ty: Type,
    var_arg: bool,
}

impl Signature {
    /// Makes a signature from a function type. Returns `None` if `func_ty` is
    /// not a function type.
    pub fn from_func_type(
        name: &str,
        linkage: Linkage,
        func_ty: Type,
        store: &TypeStore,
    ) -> Option<Self> {
        let data = store.func_def(func_ty)?;
        Some(Self {
            name: name.to_string(),
            linkage,
            func_ty,
            args: data.params.clone(),
            ret_ty: data.ret_ty,
            var_arg: data.var_arg,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub fn linkage(&self) -> Linkage {
        self.linkage
    }

    pub fn update_linkage(&mut self, linkage: Linkage) {
        self.linkage = linkage;
    }

    pub fn func_ty(&self) -> Type {
        self.func_ty
    }

    pub fn args(&self) -> &[Type] {
        &self.args
    }

    pub fn ret_ty(&self) -> Type {
        self.ret_ty
    }

    pub fn is_var_arg(&self) -> bool {
        self.var_arg
    }

    pub fn func_ptr_type(&self, ctx: &Context) -> Type {
        ctx.with_ty_store_mut(|s| s.make_ptr(self.func_ty, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{inst::BinaryOp, Value};

    fn make_func(ctx: &Context) -> Function {
        let sig = ctx.with_ty_store_mut(|s| {
            let func_ty = s.make_func(&[Type::I32, Type::I32], Type::I32, false);
            Signature::from_func_type("add", Linkage::External, func_ty, s).unwrap()
        });
        Function::new(ctx, sig)
    }

    #[test]
    fn arguments_follow_signature() {
        let ctx = Context::new();
        let func = make_func(&ctx);
        assert_eq!(func.arg_values.len(), 2);
        assert!(matches!(
            func.dfg.value(func.arg_values[1]),
            Value::Arg { idx: 1, ty: Type::I32 }
        ));
        assert!(func.is_declaration());
    }

    #[test]
    fn local_names_are_unique() {
        let ctx = Context::new();
        let mut func = make_func(&ctx);
        let entry = func.append_block("entry");
        let lhs = func.arg_values[0];
        let rhs = func.arg_values[1];
        assert_eq!(func.set_value_name(lhs, "a").as_deref(), Some("a"));

        let add = InstData::Binary {
            op: BinaryOp::Add,
            lhs,
            rhs,
        };
        let (_, v0) = func.append_inst(entry, add.clone(), Type::I32, "sum");
        let (_, v1) = func.append_inst(entry, add.clone(), Type::I32, "sum");
        let (_, v2) = func.append_inst(entry, add.clone(), Type::I32, "sum");
        let (_, v3) = func.append_inst(entry, add, Type::I32, "");
        assert_eq!(func.dfg.value_name(v0.unwrap()), Some("sum"));
        assert_eq!(func.dfg.value_name(v1.unwrap()), Some("sum1"));
        assert_eq!(func.dfg.value_name(v2.unwrap()), Some("sum2"));
        assert_eq!(func.dfg.value_name(v3.unwrap()), None);

        // Blocks share the table with values.
        let b = func.append_block("a");
        assert_eq!(func.dfg.block_name(b), Some("a3"));
        assert_eq!(func.set_block_name(b, "x1").as_deref(), Some("x1"));
        assert_eq!(func.set_value_name(lhs, "x1").as_deref(), Some("x1.4"));
        assert!(!func.is_declaration());
    }
}
