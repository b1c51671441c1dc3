use std::{cell::RefCell, rc::Rc};

use crate::{
    constant::{ConstData, ConstId, ConstStore},
    types::TypeStore,
};

/// Owner of the types and constants shared by every module created in it.
///
/// Cloning a `Context` yields another reference to the same stores. Types and
/// constants from different contexts must never be mixed; use
/// [`Context::ptr_eq`] to tell contexts apart.
#[derive(Debug, Clone, Default)]
pub struct Context {
    inner: Rc<ContextData>,
}

#[derive(Debug, Default)]
struct ContextData {
    ty_store: RefCell<TypeStore>,
    const_store: RefCell<ConstStore>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ty_store<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&TypeStore) -> R,
    {
        f(&self.inner.ty_store.borrow())
    }

    pub fn with_ty_store_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut TypeStore) -> R,
    {
        f(&mut self.inner.ty_store.borrow_mut())
    }

    pub fn with_const_store<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&ConstStore) -> R,
    {
        f(&self.inner.const_store.borrow())
    }

    pub fn make_const(&self, data: ConstData) -> ConstId {
        self.inner.const_store.borrow_mut().make_const(data)
    }

    pub fn const_data(&self, cst: ConstId) -> ConstData {
        *self.inner.const_store.borrow().const_data(cst)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}
