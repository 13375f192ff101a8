//! Intermediate representation.
//!
//! The IR is a mutable def-use graph over arena-session data: values carry
//! use-lists, instructions live in per-block ordered lists, and basic blocks
//! are themselves values so control-flow edges need no separate storage.
//! [`graph`] holds the data structures and mutation operations, [`cfg`] the
//! derived successor/predecessor iterators, [`printer`] and [`dot`] the
//! diagnostic dumps.

pub mod cfg;
pub mod dot;
pub mod graph;
pub mod printer;

pub use cfg::{Predecessors, Successors};
pub use graph::{
    BinaryOp, BlockRef, DataType, FuncRef, InsertPos, InstKind, InstRef, IrContext, UseRef, ValueKind,
    ValueRef, VarId,
};
pub use printer::{dump_cfg_dot, dump_dom_tree_dot, print_function, PrintAnnotations};
