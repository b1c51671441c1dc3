//! Type handles.
//!
//! Pointer, array and function types are uniqued by the context: asking for
//! the same shape twice yields handles that compare equal. Struct types are
//! nominal, so two structs never compare equal unless they are the same
//! struct.
use std::fmt;

use quill_ir::{self as ir, types::TypeStore};

use crate::{context::ContextRef, Context, Error, Result};

/// A type owned by a [`Context`]. Equality is identity within the context.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Type {
    ctx: ContextRef,
    ty: ir::Type,
}

impl Type {
    pub(crate) fn new(ctx: ContextRef, ty: ir::Type) -> Self {
        Self { ctx, ty }
    }

    pub(crate) fn raw(&self) -> ir::Type {
        self.ty
    }

    pub(crate) fn ctx(&self) -> &ContextRef {
        &self.ctx
    }

    pub fn context(&self) -> Context {
        Context::from_inner(self.ctx.clone())
    }

    pub fn is_integer_ty(&self) -> bool {
        self.ty.is_integral()
    }

    pub fn integer_bit_width(&self) -> Option<u32> {
        self.ty.int_bits()
    }

    pub fn is_float_ty(&self) -> bool {
        self.ty.is_float()
    }

    pub fn is_double_ty(&self) -> bool {
        self.ty.is_double()
    }

    pub fn is_void_ty(&self) -> bool {
        self.ty.is_void()
    }

    pub fn is_label_ty(&self) -> bool {
        self.ty.is_label()
    }

    pub fn is_pointer_ty(&self) -> bool {
        self.with_store(|s| s.is_ptr(self.ty))
    }

    pub fn is_struct_ty(&self) -> bool {
        self.with_store(|s| s.is_struct(self.ty))
    }

    pub fn is_array_ty(&self) -> bool {
        self.with_store(|s| s.is_array(self.ty))
    }

    pub fn is_function_ty(&self) -> bool {
        self.with_store(|s| s.is_func(self.ty))
    }

    /// Returns `true` if values of this type can be operands and results.
    pub fn is_first_class(&self) -> bool {
        self.with_store(|s| s.is_first_class(self.ty))
    }

    /// Returns `true` if the type has a size, so it can be allocated, loaded
    /// and stored.
    pub fn is_sized(&self) -> bool {
        self.with_store(|s| s.is_sized(self.ty))
    }

    pub fn as_struct(&self) -> Option<StructType> {
        self.is_struct_ty().then(|| StructType(self.clone()))
    }

    pub fn as_array(&self) -> Option<ArrayType> {
        self.is_array_ty().then(|| ArrayType(self.clone()))
    }

    pub fn as_pointer(&self) -> Option<PointerType> {
        self.is_pointer_ty().then(|| PointerType(self.clone()))
    }

    pub fn as_function(&self) -> Option<FunctionType> {
        self.is_function_ty().then(|| FunctionType(self.clone()))
    }

    /// Returns the pointer type to this type.
    pub fn pointer_to(&self, address_space: u32) -> Result<PointerType> {
        PointerType::get(self, address_space)
    }

    /// Renders the type the way it appears in the textual IR.
    pub fn dump(&self) -> String {
        self.with_store(|s| s.display(self.ty).to_string())
    }

    fn with_store<R>(&self, f: impl FnOnce(&TypeStore) -> R) -> R {
        self.ctx.ir.with_ty_store(f)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dump())
    }
}

macro_rules! derived_type {
    ($name:ident, $expected:literal, $is:ident) => {
        #[derive(Clone, PartialEq, Eq, Hash, Debug)]
        pub struct $name(Type);

        impl $name {
            pub fn as_type(&self) -> &Type {
                &self.0
            }
        }

        impl From<$name> for Type {
            fn from(ty: $name) -> Self {
                ty.0
            }
        }

        impl TryFrom<Type> for $name {
            type Error = Error;

            fn try_from(ty: Type) -> Result<Self> {
                if ty.$is() {
                    Ok(Self(ty))
                } else {
                    Err(Error::mismatch($expected, ty.dump()))
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

derived_type!(StructType, "struct type", is_struct_ty);
derived_type!(ArrayType, "array type", is_array_ty);
derived_type!(PointerType, "pointer type", is_pointer_ty);
derived_type!(FunctionType, "function type", is_function_ty);

impl StructType {
    /// Creates an opaque struct named `name`.
    ///
    /// A name already in use gets a numeric suffix, so the new struct never
    /// aliases an existing one.
    pub fn create(context: &Context, name: &str) -> StructType {
        context.types().create_struct(name)
    }

    /// Fixes the fields of an opaque struct.
    ///
    /// Setting the body the struct already has is a no-op; any other body is
    /// rejected with [`Error::StructBodyAlreadySet`].
    pub fn set_body(&self, fields: &[Type], packed: bool) -> Result<()> {
        let ctx = self.0.ctx();
        for field in fields {
            ctx.check_owned(field)?;
            if !field.with_store(|s| s.is_valid_element(field.raw())) {
                return Err(Error::InvalidType(format!(
                    "`{}` cannot be a struct field",
                    field.dump()
                )));
            }
        }

        let Some(cmpd_ref) = self.cmpd_ref() else {
            unreachable!("struct handle over a non-compound type");
        };
        let raw: Vec<_> = fields.iter().map(Type::raw).collect();
        if ctx
            .ir
            .with_ty_store_mut(|s| s.set_struct_body(cmpd_ref, &raw, packed))
        {
            Ok(())
        } else {
            Err(Error::StructBodyAlreadySet { name: self.name() })
        }
    }

    pub fn name(&self) -> String {
        self.with_data(|data| data.name.clone())
    }

    /// Number of fields; `0` while the struct is opaque.
    pub fn num_elements(&self) -> usize {
        self.with_data(|data| data.num_fields())
    }

    pub fn element_type(&self, idx: usize) -> Result<Type> {
        let field = self.with_data(|data| data.fields.as_ref().and_then(|f| f.get(idx).copied()));
        match field {
            Some(ty) => Ok(Type::new(self.0.ctx().clone(), ty)),
            None => Err(Error::OutOfRange {
                entity: "field",
                index: idx,
                count: self.num_elements(),
            }),
        }
    }

    pub fn elements(&self) -> Vec<Type> {
        let fields = self.with_data(|data| data.fields.clone().unwrap_or_default());
        fields
            .into_iter()
            .map(|ty| Type::new(self.0.ctx().clone(), ty))
            .collect()
    }

    pub fn is_opaque(&self) -> bool {
        self.with_data(|data| data.is_opaque())
    }

    pub fn is_packed(&self) -> bool {
        self.with_data(|data| data.packed)
    }

    fn cmpd_ref(&self) -> Option<ir::types::CompoundTypeRef> {
        match self.0.raw() {
            ir::Type::Compound(cmpd_ref) => Some(cmpd_ref),
            _ => None,
        }
    }

    fn with_data<R>(&self, f: impl FnOnce(&ir::types::StructData) -> R) -> R {
        self.0.with_store(|s| match s.struct_def(self.0.raw()) {
            Some(data) => f(data),
            None => unreachable!("struct handle over a non-struct type"),
        })
    }
}

impl ArrayType {
    pub fn get(element: &Type, count: u64) -> Result<ArrayType> {
        TypeRegistry::new(element.ctx().clone()).array(element, count)
    }

    pub fn num_elements(&self) -> u64 {
        self.def().1
    }

    pub fn element_type(&self) -> Type {
        Type::new(self.0.ctx().clone(), self.def().0)
    }

    fn def(&self) -> (ir::Type, u64) {
        self.0
            .with_store(|s| s.array_def(self.0.raw()))
            .unwrap_or_else(|| unreachable!("array handle over a non-array type"))
    }
}

impl PointerType {
    pub fn get(pointee: &Type, address_space: u32) -> Result<PointerType> {
        TypeRegistry::new(pointee.ctx().clone()).pointer(pointee, address_space)
    }

    pub fn address_space(&self) -> u32 {
        self.def().1
    }

    pub fn element_type(&self) -> Type {
        Type::new(self.0.ctx().clone(), self.def().0)
    }

    fn def(&self) -> (ir::Type, u32) {
        self.0
            .with_store(|s| s.ptr_def(self.0.raw()))
            .unwrap_or_else(|| unreachable!("pointer handle over a non-pointer type"))
    }
}

impl FunctionType {
    pub fn get(return_type: &Type, params: &[Type], is_var_arg: bool) -> Result<FunctionType> {
        TypeRegistry::new(return_type.ctx().clone()).function(return_type, params, is_var_arg)
    }

    pub fn return_type(&self) -> Type {
        let ret = self.with_def(|data| data.ret_ty);
        Type::new(self.0.ctx().clone(), ret)
    }

    pub fn num_params(&self) -> usize {
        self.with_def(|data| data.params.len())
    }

    pub fn param_type(&self, idx: usize) -> Result<Type> {
        match self.with_def(|data| data.params.get(idx).copied()) {
            Some(ty) => Ok(Type::new(self.0.ctx().clone(), ty)),
            None => Err(Error::OutOfRange {
                entity: "parameter",
                index: idx,
                count: self.num_params(),
            }),
        }
    }

    pub fn params(&self) -> Vec<Type> {
        let params = self.with_def(|data| data.params.to_vec());
        params
            .into_iter()
            .map(|ty| Type::new(self.0.ctx().clone(), ty))
            .collect()
    }

    pub fn is_var_arg(&self) -> bool {
        self.with_def(|data| data.var_arg)
    }

    fn with_def<R>(&self, f: impl FnOnce(&ir::types::FuncData) -> R) -> R {
        self.0.with_store(|s| match s.func_def(self.0.raw()) {
            Some(data) => f(data),
            None => unreachable!("function handle over a non-function type"),
        })
    }
}

/// Factory for the types of one context.
#[derive(Clone, Debug)]
pub struct TypeRegistry {
    ctx: ContextRef,
}

impl TypeRegistry {
    pub(crate) fn new(ctx: ContextRef) -> Self {
        Self { ctx }
    }

    pub fn int1(&self) -> Type {
        self.make(ir::Type::I1)
    }

    pub fn int8(&self) -> Type {
        self.make(ir::Type::I8)
    }

    pub fn int16(&self) -> Type {
        self.make(ir::Type::I16)
    }

    pub fn int32(&self) -> Type {
        self.make(ir::Type::I32)
    }

    pub fn int64(&self) -> Type {
        self.make(ir::Type::I64)
    }

    /// Returns the integer type of `bits` width. Supported widths are 1, 8,
    /// 16, 32, 64 and 128.
    pub fn int(&self, bits: u32) -> Result<Type> {
        ir::Type::int(bits)
            .map(|ty| self.make(ty))
            .ok_or_else(|| Error::InvalidType(format!("unsupported integer width {bits}")))
    }

    pub fn float(&self) -> Type {
        self.make(ir::Type::F32)
    }

    pub fn double(&self) -> Type {
        self.make(ir::Type::F64)
    }

    pub fn void(&self) -> Type {
        self.make(ir::Type::Void)
    }

    pub fn label(&self) -> Type {
        self.make(ir::Type::Label)
    }

    pub fn pointer(&self, pointee: &Type, address_space: u32) -> Result<PointerType> {
        self.ctx.check_owned(pointee)?;
        if matches!(pointee.raw(), ir::Type::Void | ir::Type::Label) {
            return Err(Error::InvalidType(format!(
                "`{}` cannot be a pointee",
                pointee.dump()
            )));
        }

        let ty = self
            .ctx
            .ir
            .with_ty_store_mut(|s| s.make_ptr(pointee.raw(), address_space));
        Ok(PointerType(self.make(ty)))
    }

    pub fn array(&self, element: &Type, count: u64) -> Result<ArrayType> {
        self.check_element(element, "an array element")?;
        let ty = self
            .ctx
            .ir
            .with_ty_store_mut(|s| s.make_array(element.raw(), count));
        Ok(ArrayType(self.make(ty)))
    }

    pub fn function(
        &self,
        return_type: &Type,
        params: &[Type],
        is_var_arg: bool,
    ) -> Result<FunctionType> {
        self.ctx.check_owned(return_type)?;
        if !(return_type.is_void_ty() || return_type.is_first_class()) {
            return Err(Error::InvalidType(format!(
                "`{}` cannot be a return type",
                return_type.dump()
            )));
        }
        for param in params {
            self.check_element(param, "a parameter")?;
        }

        let raw: Vec<_> = params.iter().map(Type::raw).collect();
        let ty = self
            .ctx
            .ir
            .with_ty_store_mut(|s| s.make_func(&raw, return_type.raw(), is_var_arg));
        Ok(FunctionType(self.make(ty)))
    }

    pub fn create_struct(&self, name: &str) -> StructType {
        let ty = self.ctx.ir.with_ty_store_mut(|s| s.make_struct(name));
        StructType(self.make(ty))
    }

    pub fn struct_by_name(&self, name: &str) -> Option<StructType> {
        self.ctx
            .ir
            .with_ty_store(|s| s.lookup_struct(name))
            .map(|ty| StructType(self.make(ty)))
    }

    fn check_element(&self, ty: &Type, role: &str) -> Result<()> {
        self.ctx.check_owned(ty)?;
        if ty.with_store(|s| s.is_valid_element(ty.raw())) {
            Ok(())
        } else {
            Err(Error::InvalidType(format!(
                "`{}` cannot be {role}",
                ty.dump()
            )))
        }
    }

    fn make(&self, ty: ir::Type) -> Type {
        Type::new(self.ctx.clone(), ty)
    }
}
