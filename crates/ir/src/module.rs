use cranelift_entity::{entity_impl, PrimaryMap};
use indexmap::IndexMap;

use crate::{Context, Function, Linkage, Signature, Type, ValueRef};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FuncRef(u32);
entity_impl!(FuncRef, "func");

pub struct Module {
    pub ctx: Context,

    /// Module identifier, printed in the `; ModuleID` header.
    pub name: String,
    pub source_filename: String,
    pub target_triple: Option<String>,
    pub data_layout: Option<String>,

    /// Holds all functions declared in the module, in creation order.
    pub funcs: PrimaryMap<FuncRef, Function>,
    symbols: IndexMap<String, FuncRef>,
    last_unique: u32,
}

impl Module {
    pub fn new(ctx: &Context, name: &str) -> Self {
        Self {
            ctx: ctx.clone(),
            name: name.to_string(),
            source_filename: name.to_string(),
            target_triple: None,
            data_layout: None,
            funcs: PrimaryMap::default(),
            symbols: IndexMap::default(),
            last_unique: 0,
        }
    }

    /// Returns `func_ref` in the module.
    pub fn iter_functions(&self) -> impl Iterator<Item = FuncRef> {
        self.funcs.keys()
    }

    pub fn lookup_func(&self, name: &str) -> Option<FuncRef> {
        self.symbols.get(name).copied()
    }

    pub fn has_func(&self, func_ref: FuncRef) -> bool {
        self.funcs.is_valid(func_ref)
    }

    /// Returns `name` if no function uses it yet, or `name.N` for the first
    /// free `N` otherwise.
    pub fn unique_func_name(&mut self, name: &str) -> String {
        if !self.symbols.contains_key(name) {
            return name.to_string();
        }
        loop {
            let candidate = format!("{name}.{}", self.last_unique);
            self.last_unique += 1;
            if !self.symbols.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    /// Appends a function of type `func_ty`.
    ///
    /// The caller is responsible for making `name` unique; see
    /// [`Module::unique_func_name`].
    ///
    /// # Panics
    /// Panics if `func_ty` is not a function type or `name` is already taken.
    pub fn add_function(&mut self, name: &str, linkage: Linkage, func_ty: Type) -> FuncRef {
        assert!(!self.symbols.contains_key(name), "`{name}` is already defined");
        let sig = self
            .ctx
            .with_ty_store(|s| Signature::from_func_type(name, linkage, func_ty, s))
            .expect("function type");
        let func_ref = self.funcs.push(Function::new(&self.ctx, sig));
        self.symbols.insert(name.to_string(), func_ref);
        func_ref
    }

    /// Renames a function, making the new name unique. Returns the name
    /// actually assigned.
    pub fn rename_function(&mut self, func_ref: FuncRef, name: &str) -> String {
        let old = self.funcs[func_ref].sig.name().to_string();
        if old == name {
            return old;
        }
        self.symbols.shift_remove(&old);
        let name = self.unique_func_name(name);
        self.symbols.insert(name.clone(), func_ref);
        self.funcs[func_ref].sig.set_name(name.clone());
        name
    }

    /// Returns `true` if `value` refers to something alive in this module or
    /// its context.
    pub fn contains(&self, value: ValueRef) -> bool {
        match value {
            ValueRef::Const(_) => true,
            ValueRef::Func(func) => self.has_func(func),
            ValueRef::Arg(func, idx) => self
                .funcs
                .get(func)
                .is_some_and(|f| (idx as usize) < f.arg_values.len()),
            ValueRef::Inst(func, inst) => self.funcs.get(func).is_some_and(|f| f.dfg.has_inst(inst)),
            ValueRef::Block(func, block) => self
                .funcs
                .get(func)
                .is_some_and(|f| f.dfg.has_block(block)),
        }
    }

    /// Returns the type of `value`. Functions are pointers to their function
    /// type, blocks are labels and instructions without a result are void.
    pub fn value_ty(&self, value: ValueRef) -> Type {
        match value {
            ValueRef::Const(cst) => self.ctx.const_data(cst).ty(),
            ValueRef::Func(func) => self.funcs[func].sig.func_ptr_type(&self.ctx),
            ValueRef::Arg(func, idx) => self.funcs[func].sig.args()[idx as usize],
            ValueRef::Inst(func, inst) => {
                let func = &self.funcs[func];
                func.dfg
                    .inst_result(inst)
                    .map_or(Type::Void, |value| func.dfg.value_ty(value))
            }
            ValueRef::Block(..) => Type::Label,
        }
    }

    /// Returns the local name of `value`, or the symbol name of a function.
    pub fn value_name(&self, value: ValueRef) -> Option<&str> {
        match value {
            ValueRef::Const(_) => None,
            ValueRef::Func(func) => Some(self.funcs[func].sig.name()),
            ValueRef::Arg(func, idx) => {
                let func = &self.funcs[func];
                func.dfg.value_name(func.arg_values[idx as usize])
            }
            ValueRef::Inst(func, inst) => {
                let func = &self.funcs[func];
                func.dfg
                    .inst_result(inst)
                    .and_then(|value| func.dfg.value_name(value))
            }
            ValueRef::Block(func, block) => self.funcs[func].dfg.block_name(block),
        }
    }
}
