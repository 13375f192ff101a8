//! Machine-code backend.
//!
//! [`regalloc`] is the LRU register allocator the emitter drives while
//! walking SSA IR, [`x64`] the x86-64 instruction emission built on
//! iced-x86, and [`object`] the ELF object wrapper around the emitted
//! bytes.

pub mod object;
pub mod regalloc;
pub mod x64;

pub use object::write_object;
pub use regalloc::{RegAlloc, RegId, SpillSink, Variable};
pub use x64::{compile_module, CompiledFunction, CompiledModule};
