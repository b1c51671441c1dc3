//! This module contains Quill IR type definitions.
//!
//! Primitive types are plain enum variants. Pointer, array and function types
//! are interned in [`TypeStore`], so two requests with the same shape yield the
//! same [`CompoundTypeRef`]. Struct types are nominal and never interned.
use std::fmt;

use cranelift_entity::{entity_impl, PrimaryMap};
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::ir_writer::write_ident;

#[derive(Debug, Default)]
pub struct TypeStore {
    compounds: PrimaryMap<CompoundTypeRef, CompoundType>,
    rev_types: FxHashMap<CompoundType, CompoundTypeRef>,
    struct_types: IndexMap<String, CompoundTypeRef>,
}

impl TypeStore {
    pub fn make_ptr(&mut self, elem: Type, addr_space: u32) -> Type {
        let cmpd_ref = self.make_compound(CompoundType::Ptr { elem, addr_space });
        Type::Compound(cmpd_ref)
    }

    pub fn make_array(&mut self, elem: Type, len: u64) -> Type {
        let cmpd_ref = self.make_compound(CompoundType::Array { elem, len });
        Type::Compound(cmpd_ref)
    }

    pub fn make_func(&mut self, params: &[Type], ret_ty: Type, var_arg: bool) -> Type {
        let cmpd_ref = self.make_compound(CompoundType::Func(FuncData {
            params: params.into(),
            ret_ty,
            var_arg,
        }));
        Type::Compound(cmpd_ref)
    }

    /// Returns the pointer type to `elem` if it was already made.
    pub fn lookup_ptr(&self, elem: Type, addr_space: u32) -> Option<Type> {
        self.rev_types
            .get(&CompoundType::Ptr { elem, addr_space })
            .map(|cmpd_ref| Type::Compound(*cmpd_ref))
    }

    /// Creates a new opaque struct type.
    ///
    /// Every call returns a distinct type. If `name` is already taken, a numeric
    /// suffix is appended (`name.0`, `name.1`, ...); an empty name is treated
    /// as `anon`.
    pub fn make_struct(&mut self, name: &str) -> Type {
        let name = self.unique_struct_name(if name.is_empty() { "anon" } else { name });
        let cmpd_ref = self.compounds.push(CompoundType::Struct(StructData {
            name: name.clone(),
            fields: None,
            packed: false,
        }));
        self.struct_types.insert(name, cmpd_ref);
        Type::Compound(cmpd_ref)
    }

    /// Fixes the body of a named struct.
    ///
    /// Setting the same body twice is a no-op. Returns `false` and leaves the
    /// struct untouched if it already has a different body.
    ///
    /// # Panics
    /// Panics if `cmpd_ref` doesn't refer to a struct type.
    pub fn set_struct_body(&mut self, cmpd_ref: CompoundTypeRef, fields: &[Type], packed: bool) -> bool {
        let CompoundType::Struct(data) = &mut self.compounds[cmpd_ref] else {
            panic!("{cmpd_ref} is not a struct type");
        };

        match &data.fields {
            Some(current) => current.as_slice() == fields && data.packed == packed,
            None => {
                data.fields = Some(fields.to_vec());
                data.packed = packed;
                true
            }
        }
    }

    pub fn resolve_compound(&self, cmpd_ref: CompoundTypeRef) -> &CompoundType {
        &self.compounds[cmpd_ref]
    }

    pub fn all_compound_refs(&self) -> impl Iterator<Item = CompoundTypeRef> {
        self.compounds.keys()
    }

    /// Returns [`StructData`] if the given type is a struct type.
    pub fn struct_def(&self, ty: Type) -> Option<&StructData> {
        match self.compound(ty)? {
            CompoundType::Struct(data) => Some(data),
            _ => None,
        }
    }

    pub fn array_def(&self, ty: Type) -> Option<(Type, u64)> {
        match self.compound(ty)? {
            CompoundType::Array { elem, len } => Some((*elem, *len)),
            _ => None,
        }
    }

    /// Returns the pointee and the address space of a pointer type.
    pub fn ptr_def(&self, ty: Type) -> Option<(Type, u32)> {
        match self.compound(ty)? {
            CompoundType::Ptr { elem, addr_space } => Some((*elem, *addr_space)),
            _ => None,
        }
    }

    pub fn func_def(&self, ty: Type) -> Option<&FuncData> {
        match self.compound(ty)? {
            CompoundType::Func(data) => Some(data),
            _ => None,
        }
    }

    pub fn deref(&self, ptr: Type) -> Option<Type> {
        self.ptr_def(ptr).map(|(elem, _)| elem)
    }

    /// Lookup the struct type by name.
    pub fn lookup_struct(&self, name: &str) -> Option<Type> {
        self.struct_types.get(name).map(|cmpd_ref| Type::Compound(*cmpd_ref))
    }

    /// Iterates named structs in creation order.
    pub fn all_struct_data(&self) -> impl Iterator<Item = &StructData> {
        self.struct_types
            .values()
            .filter_map(|cmpd_ref| match &self.compounds[*cmpd_ref] {
                CompoundType::Struct(data) => Some(data),
                _ => None,
            })
    }

    pub fn is_ptr(&self, ty: Type) -> bool {
        matches!(self.compound(ty), Some(CompoundType::Ptr { .. }))
    }

    pub fn is_array(&self, ty: Type) -> bool {
        matches!(self.compound(ty), Some(CompoundType::Array { .. }))
    }

    pub fn is_struct(&self, ty: Type) -> bool {
        matches!(self.compound(ty), Some(CompoundType::Struct(..)))
    }

    pub fn is_func(&self, ty: Type) -> bool {
        matches!(self.compound(ty), Some(CompoundType::Func(..)))
    }

    /// Returns `true` if `ty` may appear as a struct field, array element,
    /// pointee or function parameter.
    pub fn is_valid_element(&self, ty: Type) -> bool {
        !matches!(ty, Type::Void | Type::Label) && !self.is_func(ty)
    }

    /// Returns `true` if values of `ty` can be passed around as SSA values.
    pub fn is_first_class(&self, ty: Type) -> bool {
        !matches!(ty, Type::Void | Type::Label) && !self.is_func(ty)
    }

    /// Returns `true` if `ty` has a known size, so it can be allocated,
    /// loaded or stored.
    pub fn is_sized(&self, ty: Type) -> bool {
        let mut visiting = FxHashSet::default();
        self.is_sized_impl(ty, &mut visiting)
    }

    fn is_sized_impl(&self, ty: Type, visiting: &mut FxHashSet<CompoundTypeRef>) -> bool {
        match ty {
            Type::Void | Type::Label => false,
            Type::Compound(cmpd_ref) => {
                if !visiting.insert(cmpd_ref) {
                    // A struct that contains itself by value.
                    return false;
                }
                let sized = match &self.compounds[cmpd_ref] {
                    CompoundType::Ptr { .. } => true,
                    CompoundType::Func(..) => false,
                    CompoundType::Array { elem, .. } => self.is_sized_impl(*elem, visiting),
                    CompoundType::Struct(data) => data.fields.as_ref().is_some_and(|fields| {
                        fields.iter().all(|field| self.is_sized_impl(*field, visiting))
                    }),
                };
                visiting.remove(&cmpd_ref);
                sized
            }
            _ => true,
        }
    }

    /// Computes the type a `getelementptr` addresses.
    ///
    /// `elem_ty` is the type stepped over by the first index, and `rest` gives
    /// the remaining indices, `None` for a non-constant one. Struct members
    /// must be selected by a constant index in bounds of the body. Returns
    /// `None` if the indices don't fit the type.
    pub fn indexed_type(
        &self,
        elem_ty: Type,
        rest: impl IntoIterator<Item = Option<i128>>,
    ) -> Option<Type> {
        let mut current = elem_ty;
        for idx in rest {
            current = match self.compound(current)? {
                CompoundType::Array { elem, .. } => *elem,
                CompoundType::Struct(data) => {
                    let fields = data.fields.as_ref()?;
                    let idx = usize::try_from(idx?).ok()?;
                    *fields.get(idx)?
                }
                CompoundType::Ptr { .. } | CompoundType::Func(..) => return None,
            };
        }
        Some(current)
    }

    /// Returns a displayable form of `ty`, e.g. `[50 x i8]` or `%struct.Person*`.
    pub fn display(&self, ty: Type) -> DisplayType<'_> {
        DisplayType { ty, store: self }
    }

    fn compound(&self, ty: Type) -> Option<&CompoundType> {
        match ty {
            Type::Compound(cmpd_ref) => Some(&self.compounds[cmpd_ref]),
            _ => None,
        }
    }

    fn make_compound(&mut self, data: CompoundType) -> CompoundTypeRef {
        debug_assert!(!data.is_struct(), "struct types are nominal");
        if let Some(cmpd_ref) = self.rev_types.get(&data) {
            return *cmpd_ref;
        }

        let cmpd_ref = self.compounds.push(data.clone());
        self.rev_types.insert(data, cmpd_ref);
        cmpd_ref
    }

    fn unique_struct_name(&self, name: &str) -> String {
        if !self.struct_types.contains_key(name) {
            return name.to_string();
        }

        let mut suffix = 0usize;
        loop {
            let candidate = format!("{name}.{suffix}");
            if !self.struct_types.contains_key(&candidate) {
                return candidate;
            }
            suffix += 1;
        }
    }
}

/// Quill IR types definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Type {
    I1,
    I8,
    I16,
    I32,
    I64,
    I128,
    F32,
    F64,
    /// The type of basic blocks used as values.
    Label,
    Compound(CompoundTypeRef),
    #[default]
    Void,
}

impl Type {
    /// Returns the integer type of the given width, if it is supported.
    pub fn int(bits: u32) -> Option<Self> {
        match bits {
            1 => Some(Self::I1),
            8 => Some(Self::I8),
            16 => Some(Self::I16),
            32 => Some(Self::I32),
            64 => Some(Self::I64),
            128 => Some(Self::I128),
            _ => None,
        }
    }

    pub fn is_integral(self) -> bool {
        self.int_bits().is_some()
    }

    pub fn int_bits(self) -> Option<u32> {
        match self {
            Self::I1 => Some(1),
            Self::I8 => Some(8),
            Self::I16 => Some(16),
            Self::I32 => Some(32),
            Self::I64 => Some(64),
            Self::I128 => Some(128),
            _ => None,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::F32)
    }

    pub fn is_double(self) -> bool {
        matches!(self, Self::F64)
    }

    pub fn is_floating_point(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    pub fn is_void(self) -> bool {
        matches!(self, Self::Void)
    }

    pub fn is_label(self) -> bool {
        matches!(self, Self::Label)
    }

    pub fn is_compound(self) -> bool {
        matches!(self, Self::Compound(_))
    }
}

/// An opaque reference to [`CompoundType`].
#[derive(Clone, PartialEq, Eq, Copy, Hash, PartialOrd, Ord)]
pub struct CompoundTypeRef(u32);
entity_impl!(CompoundTypeRef, "type");

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CompoundType {
    Ptr { elem: Type, addr_space: u32 },
    Array { elem: Type, len: u64 },
    Struct(StructData),
    Func(FuncData),
}

impl CompoundType {
    pub fn is_ptr(&self) -> bool {
        matches!(self, Self::Ptr { .. })
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array { .. })
    }

    pub fn is_struct(&self) -> bool {
        matches!(self, Self::Struct(..))
    }

    pub fn is_func(&self) -> bool {
        matches!(self, Self::Func(..))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructData {
    pub name: String,
    /// `None` while the struct is opaque.
    pub fields: Option<Vec<Type>>,
    pub packed: bool,
}

impl StructData {
    pub fn is_opaque(&self) -> bool {
        self.fields.is_none()
    }

    pub fn num_fields(&self) -> usize {
        self.fields.as_ref().map_or(0, Vec::len)
    }

    /// Writes the definition line, e.g. `%pair = type { i32, i32 }`.
    pub fn write_def(&self, f: &mut impl fmt::Write, store: &TypeStore) -> fmt::Result {
        f.write_char('%')?;
        write_ident(f, &self.name)?;
        f.write_str(" = type ")?;

        let Some(fields) = &self.fields else {
            return f.write_str("opaque");
        };
        if fields.is_empty() {
            return f.write_str(if self.packed { "<{}>" } else { "{}" });
        }

        f.write_str(if self.packed { "<{ " } else { "{ " })?;
        for (idx, field) in fields.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", store.display(*field))?;
        }
        f.write_str(if self.packed { " }>" } else { " }" })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FuncData {
    pub params: SmallVec<[Type; 8]>,
    pub ret_ty: Type,
    pub var_arg: bool,
}

pub struct DisplayType<'a> {
    ty: Type,
    store: &'a TypeStore,
}

impl fmt::Display for DisplayType<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let store = self.store;
        match self.ty {
            Type::I1 => f.write_str("i1"),
            Type::I8 => f.write_str("i8"),
            Type::I16 => f.write_str("i16"),
            Type::I32 => f.write_str("i32"),
            Type::I64 => f.write_str("i64"),
            Type::I128 => f.write_str("i128"),
            Type::F32 => f.write_str("float"),
            Type::F64 => f.write_str("double"),
            Type::Label => f.write_str("label"),
            Type::Void => f.write_str("void"),
            Type::Compound(cmpd_ref) => match store.resolve_compound(cmpd_ref) {
                CompoundType::Ptr { elem, addr_space } => {
                    write!(f, "{}", store.display(*elem))?;
                    if *addr_space != 0 {
                        write!(f, " addrspace({addr_space})")?;
                    }
                    f.write_str("*")
                }
                CompoundType::Array { elem, len } => {
                    write!(f, "[{len} x {}]", store.display(*elem))
                }
                CompoundType::Struct(data) => {
                    f.write_str("%")?;
                    write_ident(f, &data.name)
                }
                CompoundType::Func(data) => {
                    write!(f, "{} (", store.display(data.ret_ty))?;
                    for (idx, param) in data.params.iter().enumerate() {
                        if idx > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{}", store.display(*param))?;
                    }
                    if data.var_arg {
                        if !data.params.is_empty() {
                            f.write_str(", ")?;
                        }
                        f.write_str("...")?;
                    }
                    f.write_str(")")
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_types_are_uniqued() {
        let mut store = TypeStore::default();
        let arr0 = store.make_array(Type::I32, 5);
        let arr1 = store.make_array(Type::I32, 5);
        let arr2 = store.make_array(Type::I32, 6);
        assert_eq!(arr0, arr1);
        assert_ne!(arr0, arr2);

        let ptr0 = store.make_ptr(Type::I8, 0);
        let ptr1 = store.make_ptr(Type::I8, 0);
        let ptr2 = store.make_ptr(Type::I8, 1);
        assert_eq!(ptr0, ptr1);
        assert_ne!(ptr0, ptr2);

        let func0 = store.make_func(&[Type::I32, Type::I32], Type::I32, false);
        let func1 = store.make_func(&[Type::I32, Type::I32], Type::I32, false);
        let func2 = store.make_func(&[Type::I32, Type::I32], Type::I32, true);
        assert_eq!(func0, func1);
        assert_ne!(func0, func2);
    }

    #[test]
    fn named_structs_are_nominal() {
        let mut store = TypeStore::default();
        let s0 = store.make_struct("pair");
        let s1 = store.make_struct("pair");
        assert_ne!(s0, s1);

        let Type::Compound(r0) = s0 else { unreachable!() };
        let Type::Compound(r1) = s1 else { unreachable!() };
        assert!(store.set_struct_body(r0, &[Type::I32, Type::I32], false));
        assert!(store.set_struct_body(r1, &[Type::I32, Type::I32], false));
        assert_ne!(s0, s1);

        assert_eq!(store.struct_def(s0).unwrap().name, "pair");
        assert_eq!(store.struct_def(s1).unwrap().name, "pair.0");
        assert_eq!(store.lookup_struct("pair.0"), Some(s1));
    }

    #[test]
    fn struct_body_is_fixed_once() {
        let mut store = TypeStore::default();
        let s = store.make_struct("node");
        let Type::Compound(r) = s else { unreachable!() };
        assert!(store.struct_def(s).unwrap().is_opaque());
        assert!(!store.is_sized(s));

        assert!(store.set_struct_body(r, &[Type::I64], false));
        assert!(store.set_struct_body(r, &[Type::I64], false));
        assert!(!store.set_struct_body(r, &[Type::I8], false));
        assert_eq!(store.struct_def(s).unwrap().fields.as_deref(), Some(&[Type::I64][..]));
        assert!(store.is_sized(s));
    }

    #[test]
    fn recursive_struct_by_value_is_unsized() {
        let mut store = TypeStore::default();
        let s = store.make_struct("loop");
        let Type::Compound(r) = s else { unreachable!() };
        let ptr = store.make_ptr(s, 0);
        store.set_struct_body(r, &[s, ptr], false);
        assert!(!store.is_sized(s));
        assert!(store.is_sized(ptr));
    }

    #[test]
    fn indexed_type() {
        let mut store = TypeStore::default();
        let name = store.make_array(Type::I8, 50);
        let person = store.make_struct("person");
        let Type::Compound(r) = person else { unreachable!() };
        store.set_struct_body(r, &[Type::I32, name], false);

        assert_eq!(store.indexed_type(person, []), Some(person));
        assert_eq!(store.indexed_type(person, [Some(1)]), Some(name));
        assert_eq!(store.indexed_type(person, [Some(1), None]), Some(Type::I8));
        assert_eq!(store.indexed_type(person, [None]), None);
        assert_eq!(store.indexed_type(person, [Some(2)]), None);
        assert_eq!(store.indexed_type(Type::I32, [Some(0)]), None);
    }

    #[test]
    fn display() {
        let mut store = TypeStore::default();
        let i8_ptr = store.make_ptr(Type::I8, 0);
        let name = store.make_array(Type::I8, 50);
        let person = store.make_struct("struct.Person");
        let Type::Compound(r) = person else { unreachable!() };
        store.set_struct_body(r, &[Type::F32, Type::I8, name, i8_ptr], false);
        let func = store.make_func(&[i8_ptr], Type::I32, true);
        let far = store.make_ptr(Type::I32, 3);

        assert_eq!(store.display(i8_ptr).to_string(), "i8*");
        assert_eq!(store.display(name).to_string(), "[50 x i8]");
        assert_eq!(store.display(person).to_string(), "%struct.Person");
        assert_eq!(store.display(func).to_string(), "i32 (i8*, ...)");
        assert_eq!(store.display(far).to_string(), "i32 addrspace(3)*");

        let mut def = String::new();
        store
            .struct_def(person)
            .unwrap()
            .write_def(&mut def, &store)
            .unwrap();
        assert_eq!(def, "%struct.Person = type { float, i8, [50 x i8], i8* }");
    }
}
