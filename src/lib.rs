//! sable - a small native-code compiler.
//!
//! Source text is lexed and parsed into an AST, lowered to a non-SSA IR,
//! converted to SSA form, and emitted as x86-64 machine code wrapped in a
//! relocatable ELF object.
//!
//! # Primary Usage
//!
//! ```
//! use bumpalo::Bump;
//! use sable::core::CompilationSession;
//! use sable::ir::IrContext;
//! use sable::analysis::{Dominators, DominanceFrontiers};
//!
//! let arena = Bump::new();
//! let session = CompilationSession::new(&arena);
//! let mut ctx = IrContext::new();
//!
//! let module = sable::frontend::parse("int64 id(int64 x) { return x; }").unwrap();
//! let funcs = sable::frontend::build_module(&mut ctx, &session, &module).unwrap();
//!
//! for &func in &funcs {
//!     let doms = Dominators::compute(&ctx, func);
//!     let frontiers = DominanceFrontiers::compute(&ctx, &doms);
//!     sable::ssa::ssa_convert(&mut ctx, &session, func, &doms, &frontiers).unwrap();
//! }
//!
//! let compiled = sable::backend::compile_module(&ctx, &session).unwrap();
//! let elf = sable::backend::write_object(&compiled).unwrap();
//! assert_eq!(&elf[..4], b"\x7fELF");
//! ```
//!
//! # Architecture
//!
//! - [`frontend`] - lexer, parser, AST, IR builder
//! - [`ir`] - the mutable def-use graph and CFG iterators
//! - [`analysis`] - dominator tree and dominance frontiers
//! - [`ssa`] - phi insertion and renaming
//! - [`backend`] - LRU register allocation, x86-64 emission, ELF output
//! - [`core`] - session (arena, statistics) and error types

pub mod analysis;
pub mod backend;
pub mod core;
pub mod frontend;
pub mod ir;
pub mod ssa;

pub use crate::core::{CompilationSession, CompileError, CompileResult, ParseError, SessionStats};
pub use analysis::{DominanceFrontiers, Dominators};
pub use backend::{compile_module, write_object, CompiledModule, RegAlloc, SpillSink};
pub use ir::{IrContext, PrintAnnotations};
pub use ssa::ssa_convert;
