//! Instruction definitions.
use std::fmt;

use cranelift_entity::entity_impl;
use smallvec::SmallVec;

use crate::{module::FuncRef, BlockId, Type, ValueId};

/// An opaque reference to [`InstData`].
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Copy, Hash)]
pub struct InstId(pub u32);
entity_impl!(InstId, "inst");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
}

/// Integer comparison predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IcmpPred {
    Eq,
    Ne,
    Ult,
    Ugt,
    Ule,
    Uge,
    Slt,
    Sgt,
    Sle,
    Sge,
}

impl IcmpPred {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Ult => "ult",
            Self::Ugt => "ugt",
            Self::Ule => "ule",
            Self::Uge => "uge",
            Self::Slt => "slt",
            Self::Sgt => "sgt",
            Self::Sle => "sle",
            Self::Sge => "sge",
        }
    }
}

impl fmt::Display for IcmpPred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Add,
    Sub,
    Mul,
    ICmp,
    Alloca,
    Load,
    Store,
    GetElementPtr,
    Call,
    Phi,
    Br,
    Ret,
}

impl Opcode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::ICmp => "icmp",
            Self::Alloca => "alloca",
            Self::Load => "load",
            Self::Store => "store",
            Self::GetElementPtr => "getelementptr",
            Self::Call => "call",
            Self::Phi => "phi",
            Self::Br => "br",
            Self::Ret => "ret",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstData {
    Binary {
        op: BinaryOp,
        lhs: ValueId,
        rhs: ValueId,
    },
    Icmp {
        pred: IcmpPred,
        lhs: ValueId,
        rhs: ValueId,
    },
    /// Reserves a stack slot of type `ty`. The result is a pointer to `ty`.
    Alloca {
        ty: Type,
    },
    Load {
        ty: Type,
        ptr: ValueId,
    },
    Store {
        value: ValueId,
        ptr: ValueId,
    },
    Gep {
        /// Type the first index steps over.
        elem_ty: Type,
        ptr: ValueId,
        indices: SmallVec<[ValueId; 4]>,
    },
    Call {
        callee: FuncRef,
        args: SmallVec<[ValueId; 8]>,
    },
    Phi {
        args: Vec<(ValueId, BlockId)>,
    },
    Br {
        dest: BlockId,
    },
    CondBr {
        cond: ValueId,
        then_dest: BlockId,
        else_dest: BlockId,
    },
    Ret {
        arg: Option<ValueId>,
    },
}

impl InstData {
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Binary { op, .. } => match op {
                BinaryOp::Add => Opcode::Add,
                BinaryOp::Sub => Opcode::Sub,
                BinaryOp::Mul => Opcode::Mul,
            },
            Self::Icmp { .. } => Opcode::ICmp,
            Self::Alloca { .. } => Opcode::Alloca,
            Self::Load { .. } => Opcode::Load,
            Self::Store { .. } => Opcode::Store,
            Self::Gep { .. } => Opcode::GetElementPtr,
            Self::Call { .. } => Opcode::Call,
            Self::Phi { .. } => Opcode::Phi,
            Self::Br { .. } | Self::CondBr { .. } => Opcode::Br,
            Self::Ret { .. } => Opcode::Ret,
        }
    }

    pub fn is_terminator(&self) -> bool {
        matches!(self, Self::Br { .. } | Self::CondBr { .. } | Self::Ret { .. })
    }

    pub fn is_phi(&self) -> bool {
        matches!(self, Self::Phi { .. })
    }

    /// Calls `f` on every value operand, in operand order.
    pub fn visit_values(&self, mut f: impl FnMut(ValueId)) {
        match self {
            Self::Binary { lhs, rhs, .. } | Self::Icmp { lhs, rhs, .. } => {
                f(*lhs);
                f(*rhs);
            }
            Self::Alloca { .. } | Self::Br { .. } => {}
            Self::Load { ptr, .. } => f(*ptr),
            Self::Store { value, ptr } => {
                f(*value);
                f(*ptr);
            }
            Self::Gep { ptr, indices, .. } => {
                f(*ptr);
                indices.iter().copied().for_each(f);
            }
            Self::Call { args, .. } => args.iter().copied().for_each(f),
            Self::Phi { args } => args.iter().for_each(|(value, _)| f(*value)),
            Self::CondBr { cond, .. } => f(*cond),
            Self::Ret { arg } => {
                if let Some(arg) = arg {
                    f(*arg);
                }
            }
        }
    }

    pub fn values(&self) -> SmallVec<[ValueId; 4]> {
        let mut values = SmallVec::new();
        self.visit_values(|value| values.push(value));
        values
    }

    /// Returns the successor blocks of a terminator.
    pub fn branch_dests(&self) -> SmallVec<[BlockId; 2]> {
        match self {
            Self::Br { dest } => smallvec::smallvec![*dest],
            Self::CondBr {
                then_dest,
                else_dest,
                ..
            } => smallvec::smallvec![*then_dest, *else_dest],
            _ => SmallVec::new(),
        }
    }

    pub fn phi_args(&self) -> Option<&[(ValueId, BlockId)]> {
        match self {
            Self::Phi { args } => Some(args),
            _ => None,
        }
    }

    /// Appends an incoming pair to a phi. Returns `false` if `self` is not a phi.
    pub fn append_phi_arg(&mut self, value: ValueId, block: BlockId) -> bool {
        match self {
            Self::Phi { args } => {
                args.push((value, block));
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cranelift_entity::EntityRef;

    #[test]
    fn operands_and_dests() {
        let v0 = ValueId::new(0);
        let v1 = ValueId::new(1);
        let b0 = BlockId::new(0);
        let b1 = BlockId::new(1);

        let store = InstData::Store { value: v0, ptr: v1 };
        assert_eq!(store.values().as_slice(), &[v0, v1]);
        assert_eq!(store.opcode(), Opcode::Store);
        assert!(!store.is_terminator());

        let br = InstData::CondBr {
            cond: v0,
            then_dest: b0,
            else_dest: b1,
        };
        assert!(br.is_terminator());
        assert_eq!(br.opcode().as_str(), "br");
        assert_eq!(br.branch_dests().as_slice(), &[b0, b1]);

        let mut phi = InstData::Phi { args: vec![] };
        assert!(phi.append_phi_arg(v1, b1));
        assert_eq!(phi.phi_args(), Some(&[(v1, b1)][..]));
        assert!(!InstData::Ret { arg: None }.clone().append_phi_arg(v0, b0));
    }
}
