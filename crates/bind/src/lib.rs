//! Handles over the quill IR.
//!
//! A [`Context`] is the root of everything: it scopes type uniquing and
//! constant interning, and owns the arena modules live in. A [`Module`]
//! handle is the only owning handle; functions, blocks, instructions and
//! arguments are references into the module and go stale when it is dropped.
//! A [`Builder`] emits instructions at its insertion point, and
//! [`Module::verify`] checks the result.
//!
//! Handles are `Rc` based and therefore confined to one thread.
pub mod block;
pub mod builder;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod function;
pub mod module;
pub mod types;
pub mod value;

mod operand;

pub use block::BasicBlock;
pub use builder::{Builder, InsertPoint, MAX_PHI_RESERVE};
pub use config::{BindConfig, SymbolClash};
pub use context::Context;
pub use dispatch::{classify, HandleFactory, NativeValue, Unwrapped, ValueKind};
pub use error::{Error, ErrorKind, Result};
pub use function::{Argument, Function};
pub use module::{Module, Verification};
pub use types::{ArrayType, FunctionType, PointerType, StructType, Type, TypeRegistry};
pub use value::{AsValue, Constant, GenericValue, Instruction, PhiNode, Value};

pub use quill_ir::{IcmpPred, Linkage, Opcode};
pub use quill_verifier::{VerificationLevel, VerificationReport, VerifierConfig};
