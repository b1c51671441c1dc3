//! Context-level constants.
//!
//! Constants are interned: requesting the same constant twice from a
//! [`ConstStore`] yields the same [`ConstId`].
use std::fmt;

use cranelift_entity::{entity_impl, PrimaryMap};
use rustc_hash::FxHashMap;

use crate::Type;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstId(u32);
entity_impl!(ConstId, "const");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstData {
    /// An integer constant. `value` is stored sign-extended from the type
    /// width, so `i8 255` and `i8 -1` are the same constant.
    Int { ty: Type, value: i128 },
    /// A floating point constant, stored as the bit pattern of an `f64`.
    Float { ty: Type, bits: u64 },
    /// The null pointer of a pointer type.
    Null { ty: Type },
    Undef { ty: Type },
}

impl ConstData {
    /// Makes an integer constant, truncating `value` to the width of `ty`.
    ///
    /// # Panics
    /// Panics if `ty` is not an integral type.
    pub fn int(ty: Type, value: i128) -> Self {
        let bits = ty.int_bits().expect("integral type");
        let value = if bits == 128 {
            value
        } else {
            let shift = 128 - bits;
            (value << shift) >> shift
        };
        Self::Int { ty, value }
    }

    /// Makes a floating point constant. `f32` values are rounded to single
    /// precision before being stored.
    pub fn float(ty: Type, value: f64) -> Self {
        debug_assert!(ty.is_floating_point());
        let value = if ty == Type::F32 {
            value as f32 as f64
        } else {
            value
        };
        Self::Float {
            ty,
            bits: value.to_bits(),
        }
    }

    pub fn ty(&self) -> Type {
        match self {
            Self::Int { ty, .. } | Self::Float { ty, .. } | Self::Null { ty } | Self::Undef { ty } => {
                *ty
            }
        }
    }

    pub fn as_int(&self) -> Option<i128> {
        match self {
            Self::Int { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float { bits, .. } => Some(f64::from_bits(*bits)),
            _ => None,
        }
    }

    /// Returns the zero-extended value of an integer constant.
    pub fn as_uint(&self) -> Option<u128> {
        match self {
            Self::Int { ty, value } => {
                let bits = ty.int_bits()?;
                let raw = *value as u128;
                Some(if bits == 128 {
                    raw
                } else {
                    raw & ((1u128 << bits) - 1)
                })
            }
            _ => None,
        }
    }
}

/// Operand text of a constant, without its type.
impl fmt::Display for ConstData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int { ty: Type::I1, value } => {
                f.write_str(if *value == 0 { "false" } else { "true" })
            }
            Self::Int { value, .. } => write!(f, "{value}"),
            Self::Float { bits, .. } => write_float(f, f64::from_bits(*bits)),
            Self::Null { .. } => f.write_str("null"),
            Self::Undef { .. } => f.write_str("undef"),
        }
    }
}

/// Writes `value` in exponent form (`1.000000e+00`) when that form reads back
/// exactly, and as a 64-bit hex pattern otherwise.
fn write_float(f: &mut impl fmt::Write, value: f64) -> fmt::Result {
    if value.is_finite() {
        let text = format!("{value:.6e}");
        if text.parse::<f64>().ok() == Some(value) {
            let (mantissa, exp) = text.split_once('e').unwrap_or((&text, "0"));
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exp),
            };
            return write!(f, "{mantissa}e{sign}{digits:0>2}");
        }
    }
    write!(f, "0x{:016X}", value.to_bits())
}

#[derive(Debug, Default)]
pub struct ConstStore {
    consts: PrimaryMap<ConstId, ConstData>,
    rev_consts: FxHashMap<ConstData, ConstId>,
}

impl ConstStore {
    pub fn make_const(&mut self, data: ConstData) -> ConstId {
        if let Some(cst) = self.rev_consts.get(&data) {
            return *cst;
        }
        let cst = self.consts.push(data);
        self.rev_consts.insert(data, cst);
        cst
    }

    pub fn const_data(&self, cst: ConstId) -> &ConstData {
        &self.consts[cst]
    }

    pub fn len(&self) -> usize {
        self.consts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning() {
        let mut store = ConstStore::default();
        let a = store.make_const(ConstData::int(Type::I32, 42));
        let b = store.make_const(ConstData::int(Type::I32, 42));
        let c = store.make_const(ConstData::int(Type::I64, 42));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn int_truncation() {
        assert_eq!(ConstData::int(Type::I8, 255), ConstData::int(Type::I8, -1));
        assert_eq!(ConstData::int(Type::I8, 255).as_int(), Some(-1));
        assert_eq!(ConstData::int(Type::I8, 255).as_uint(), Some(255));
        assert_eq!(ConstData::int(Type::I1, 3).to_string(), "true");
        assert_eq!(ConstData::int(Type::I1, 2).to_string(), "false");
        assert_eq!(ConstData::int(Type::I32, -7).to_string(), "-7");
    }

    #[test]
    fn float_text() {
        assert_eq!(ConstData::float(Type::F64, 1.0).to_string(), "1.000000e+00");
        assert_eq!(ConstData::float(Type::F64, -2.5).to_string(), "-2.500000e+00");
        assert_eq!(ConstData::float(Type::F64, 0.0).to_string(), "0.000000e+00");
        assert_eq!(ConstData::float(Type::F64, 1.0e-10).to_string(), "1.000000e-10");
        assert_eq!(ConstData::float(Type::F64, 0.1).to_string(), "1.000000e-01");

        let inexact = ConstData::float(Type::F64, 0.123_456_789).to_string();
        assert!(inexact.starts_with("0x"));
        assert_eq!(inexact.len(), 18);
    }
}
