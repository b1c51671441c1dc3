//! This module contains Quill IR value definition.
use cranelift_entity::entity_impl;

use crate::{constant::ConstId, inst::InstId, module::FuncRef, BlockId, Type};

/// An opaque reference to [`Value`].
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Copy, Hash)]
pub struct ValueId(pub u32);
entity_impl!(ValueId, "v");

/// A function-local value definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    /// The value is defined by an instruction.
    Inst { inst: InstId, ty: Type },

    /// The value is a function argument.
    Arg { idx: u32, ty: Type },

    /// The value is a context-level constant used inside the function.
    Const { cst: ConstId, ty: Type },
}

impl Value {
    pub fn ty(&self) -> Type {
        match self {
            Self::Inst { ty, .. } | Self::Arg { ty, .. } | Self::Const { ty, .. } => *ty,
        }
    }
}

/// A module-wide reference to anything that can be used as an operand.
///
/// Unlike [`ValueId`], a `ValueRef` names its enclosing function, so it can be
/// resolved without knowing which function is being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueRef {
    Const(ConstId),
    Func(FuncRef),
    Arg(FuncRef, u32),
    Inst(FuncRef, InstId),
    Block(FuncRef, BlockId),
}

impl ValueRef {
    /// Returns the function a local value belongs to.
    pub fn parent_func(self) -> Option<FuncRef> {
        match self {
            Self::Const(_) | Self::Func(_) => None,
            Self::Arg(func, _) | Self::Inst(func, _) | Self::Block(func, _) => Some(func),
        }
    }
}

/// Classification queries used to pick the most specific handle for a value.
///
/// Functions are global values and therefore answer `true` to
/// [`ValueClass::is_constant`].
pub trait ValueClass {
    fn is_constant(&self) -> bool;
    fn is_instruction(&self) -> bool;
    fn is_basic_block(&self) -> bool;
    fn is_argument(&self) -> bool;
}

impl ValueClass for ValueRef {
    fn is_constant(&self) -> bool {
        matches!(self, Self::Const(_) | Self::Func(_))
    }

    fn is_instruction(&self) -> bool {
        matches!(self, Self::Inst(..))
    }

    fn is_basic_block(&self) -> bool {
        matches!(self, Self::Block(..))
    }

    fn is_argument(&self) -> bool {
        matches!(self, Self::Arg(..))
    }
}

#[cfg(test)]
mod tests {
    use cranelift_entity::EntityRef;

    use super::*;
    use crate::types::CompoundTypeRef;

    #[test]
    fn entity_refs_print_with_their_prefix() {
        assert_eq!(format!("{:?}", ValueId::new(3)), "v3");
        assert_eq!(ValueId::new(3).to_string(), "v3");
        assert_eq!(format!("{:?}", InstId::new(1)), "inst1");
        assert_eq!(BlockId::new(2).to_string(), "block2");
        assert_eq!(format!("{:?}", ConstId::new(0)), "const0");
        assert_eq!(FuncRef::new(4).to_string(), "func4");
        assert_eq!(format!("{:?}", CompoundTypeRef::new(5)), "type5");

        let value = Value::Arg {
            idx: 0,
            ty: Type::I32,
        };
        assert!(format!("{value:?}").starts_with("Arg"));
    }
}
