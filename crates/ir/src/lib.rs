pub mod cfg;
pub mod constant;
pub mod context;
pub mod dfg;
pub mod domtree;
pub mod function;
pub mod inst;
pub mod ir_writer;
pub mod layout;
pub mod linkage;
pub mod module;
pub mod types;
pub mod value;

pub use cfg::ControlFlowGraph;
pub use constant::{ConstData, ConstId};
pub use context::Context;
pub use dfg::{Block, BlockId, DataFlowGraph};
pub use domtree::DomTree;
pub use function::{Function, Signature};
pub use inst::{BinaryOp, IcmpPred, InstData, InstId, Opcode};
pub use ir_writer::{FuncWriter, ModuleWriter};
pub use layout::Layout;
pub use linkage::Linkage;
pub use module::{FuncRef, Module};
pub use types::Type;
pub use value::{Value, ValueClass, ValueId, ValueRef};
