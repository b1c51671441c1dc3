use std::{
    cell::RefCell,
    fmt,
    hash::{Hash, Hasher},
    ops::Deref,
    rc::{Rc, Weak},
};

use quill_ir::{self as ir, ConstData};

use crate::{
    dispatch::HandleFactory,
    types::{Type, TypeRegistry},
    value::Constant,
    BindConfig, Error, Module, Result,
};

/// The root of every handle.
///
/// A `Context` scopes type uniquing and constant interning, and owns the
/// arena every [`Module`] created from it lives in. Cloning yields another
/// reference to the same context.
///
/// Handles are built on `Rc`, so none of them can leave the thread that made
/// the context.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Context {
    inner: ContextRef,
}

impl Context {
    pub fn new() -> Self {
        Self::with_config(BindConfig::default())
    }

    pub fn with_config(config: BindConfig) -> Self {
        let inner = ContextInner {
            ir: ir::Context::new(),
            modules: RefCell::new(ModuleArena::default()),
            config,
        };
        Self {
            inner: ContextRef(Rc::new(inner)),
        }
    }

    pub fn config(&self) -> &BindConfig {
        &self.inner.config
    }

    /// Creates an empty module. The returned handle is its only owner.
    pub fn create_module(&self, name: &str) -> Module {
        Module::new(self.inner.clone(), name)
    }

    pub fn types(&self) -> TypeRegistry {
        TypeRegistry::new(self.inner.clone())
    }

    pub fn handles(&self) -> HandleFactory {
        HandleFactory::new(self.inner.clone())
    }

    pub fn int1_type(&self) -> Type {
        self.types().int1()
    }

    pub fn int8_type(&self) -> Type {
        self.types().int8()
    }

    pub fn int16_type(&self) -> Type {
        self.types().int16()
    }

    pub fn int32_type(&self) -> Type {
        self.types().int32()
    }

    pub fn int64_type(&self) -> Type {
        self.types().int64()
    }

    pub fn int_type(&self, bits: u32) -> Result<Type> {
        self.types().int(bits)
    }

    pub fn float_type(&self) -> Type {
        self.types().float()
    }

    pub fn double_type(&self) -> Type {
        self.types().double()
    }

    pub fn void_type(&self) -> Type {
        self.types().void()
    }

    /// Returns the integer constant `value` of `ty`, truncated to its width.
    pub fn const_int(&self, ty: &Type, value: i128) -> Result<Constant> {
        self.inner.check_owned(ty)?;
        if !ty.is_integer_ty() {
            return Err(Error::mismatch("integer type", ty.dump()));
        }
        Ok(self.make_const(ConstData::int(ty.raw(), value)))
    }

    pub fn const_float(&self, ty: &Type, value: f64) -> Result<Constant> {
        self.inner.check_owned(ty)?;
        if !(ty.is_float_ty() || ty.is_double_ty()) {
            return Err(Error::mismatch("floating point type", ty.dump()));
        }
        Ok(self.make_const(ConstData::float(ty.raw(), value)))
    }

    /// Returns the null pointer of the pointer type `ty`.
    pub fn const_null(&self, ty: &Type) -> Result<Constant> {
        self.inner.check_owned(ty)?;
        if !ty.is_pointer_ty() {
            return Err(Error::mismatch("pointer type", ty.dump()));
        }
        Ok(self.make_const(ConstData::Null { ty: ty.raw() }))
    }

    pub fn undef(&self, ty: &Type) -> Result<Constant> {
        self.inner.check_owned(ty)?;
        if !ty.is_first_class() {
            return Err(Error::InvalidType(format!(
                "`{}` has no undef value",
                ty.dump()
            )));
        }
        Ok(self.make_const(ConstData::Undef { ty: ty.raw() }))
    }

    pub(crate) fn inner(&self) -> &ContextRef {
        &self.inner
    }

    pub(crate) fn from_inner(inner: ContextRef) -> Self {
        Self { inner }
    }

    fn make_const(&self, data: ConstData) -> Constant {
        let cst = self.inner.ir.make_const(data);
        Constant::data(self.inner.clone(), cst)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) struct ContextInner {
    pub(crate) ir: ir::Context,
    modules: RefCell<ModuleArena>,
    pub(crate) config: BindConfig,
}

impl ContextInner {
    pub(crate) fn insert_module(&self, module: ir::Module) -> ModuleKey {
        self.modules.borrow_mut().insert(module)
    }

    /// Frees the module in `key`. Every handle into it becomes stale.
    pub(crate) fn remove_module(&self, key: ModuleKey) -> Option<ir::Module> {
        self.modules.try_borrow_mut().ok()?.remove(key)
    }

    pub(crate) fn with_module<F, R>(&self, key: ModuleKey, f: F) -> Result<R>
    where
        F: FnOnce(&ir::Module) -> R,
    {
        let arena = self.modules.borrow();
        let module = arena.get(key).ok_or(Error::StaleHandle)?;
        Ok(f(module))
    }

    pub(crate) fn with_module_mut<F, R>(&self, key: ModuleKey, f: F) -> Result<R>
    where
        F: FnOnce(&mut ir::Module) -> R,
    {
        let mut arena = self.modules.borrow_mut();
        let module = arena.get_mut(key).ok_or(Error::StaleHandle)?;
        Ok(f(module))
    }

    pub(crate) fn check_owned(&self, ty: &Type) -> Result<()> {
        if std::ptr::eq(self, Rc::as_ptr(&ty.ctx().0)) {
            Ok(())
        } else {
            Err(Error::ForeignContext)
        }
    }
}

/// A strong reference to a context that compares by identity.
#[derive(Clone)]
pub(crate) struct ContextRef(Rc<ContextInner>);

impl ContextRef {
    pub(crate) fn downgrade(&self) -> Weak<ContextInner> {
        Rc::downgrade(&self.0)
    }
}

impl Deref for ContextRef {
    type Target = ContextInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PartialEq for ContextRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ContextRef {}

impl Hash for ContextRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Debug for ContextRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Context({:p})", Rc::as_ptr(&self.0))
    }
}

/// Position of a module in the arena of its context.
///
/// The generation changes whenever the slot is freed, so a key outliving its
/// module never resolves to whatever reuses the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ModuleKey {
    index: u32,
    generation: u32,
}

#[derive(Default)]
struct ModuleArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

struct Slot {
    generation: u32,
    module: Option<ir::Module>,
}

impl ModuleArena {
    fn insert(&mut self, module: ir::Module) -> ModuleKey {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.module = Some(module);
            return ModuleKey {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            module: Some(module),
        });
        ModuleKey {
            index,
            generation: 0,
        }
    }

    fn remove(&mut self, key: ModuleKey) -> Option<ir::Module> {
        let slot = self.slots.get_mut(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        let module = slot.module.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index);
        Some(module)
    }

    fn get(&self, key: ModuleKey) -> Option<&ir::Module> {
        self.slots
            .get(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.module.as_ref())
    }

    fn get_mut(&mut self, key: ModuleKey) -> Option<&mut ir::Module> {
        self.slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.module.as_mut())
    }
}

/// A non-owning link from a descendant handle to the module it lives in.
#[derive(Clone)]
pub(crate) struct ModuleLink {
    ctx: Weak<ContextInner>,
    key: ModuleKey,
}

impl ModuleLink {
    pub(crate) fn new(ctx: &ContextRef, key: ModuleKey) -> Self {
        Self {
            ctx: ctx.downgrade(),
            key,
        }
    }

    pub(crate) fn key(&self) -> ModuleKey {
        self.key
    }

    pub(crate) fn context(&self) -> Result<ContextRef> {
        self.ctx.upgrade().map(ContextRef).ok_or(Error::StaleHandle)
    }

    pub(crate) fn belongs_to(&self, ctx: &ContextRef) -> bool {
        std::ptr::eq(self.ctx.as_ptr(), Rc::as_ptr(&ctx.0))
    }

    pub(crate) fn with_module<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&ir::Module) -> R,
    {
        self.context()?.with_module(self.key, f)
    }

    pub(crate) fn with_module_mut<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut ir::Module) -> R,
    {
        self.context()?.with_module_mut(self.key, f)
    }
}

impl PartialEq for ModuleLink {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.ctx, &other.ctx) && self.key == other.key
    }
}

impl Eq for ModuleLink {}

impl Hash for ModuleLink {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ctx.as_ptr().hash(state);
        self.key.hash(state);
    }
}

impl fmt::Debug for ModuleLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ModuleLink({}@{})",
            self.key.index, self.key.generation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_generations() {
        let ctx = ir::Context::new();
        let mut arena = ModuleArena::default();
        let first = arena.insert(ir::Module::new(&ctx, "a"));
        assert!(arena.get(first).is_some());

        assert!(arena.remove(first).is_some());
        assert!(arena.get(first).is_none());
        assert!(arena.remove(first).is_none());

        let second = arena.insert(ir::Module::new(&ctx, "b"));
        assert_eq!(second.index, first.index);
        assert_ne!(second.generation, first.generation);
        assert!(arena.get(first).is_none());
        assert_eq!(arena.get(second).map(|m| m.name.as_str()), Some("b"));
    }

    #[test]
    fn constants_are_interned() {
        let ctx = Context::new();
        let i32_ty = ctx.int32_type();
        assert_eq!(ctx.const_int(&i32_ty, 7), ctx.const_int(&i32_ty, 7));
        assert_ne!(ctx.const_int(&i32_ty, 7), ctx.const_int(&i32_ty, 8));
        assert!(ctx.const_float(&i32_ty, 1.0).is_err());

        let i8_ty = ctx.int8_type();
        assert_eq!(ctx.const_int(&i8_ty, 255), ctx.const_int(&i8_ty, -1));

        let ptr = ctx.types().pointer(&i32_ty, 0).unwrap();
        assert!(ctx.const_null(ptr.as_type()).is_ok());
        assert!(ctx.const_null(&i32_ty).is_err());
        assert!(ctx.undef(&ctx.void_type()).is_err());
    }

    #[test]
    fn contexts_compare_by_identity() {
        let ctx = Context::new();
        assert_eq!(ctx, ctx.clone());
        assert_ne!(ctx, Context::new());
    }
}
