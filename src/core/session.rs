// This module provides arena-based compilation session management using the bumpalo crate.
// CompilationSession owns a reference to the arena allocator and tracks state that spans
// the whole pipeline: interned strings (value and variable display names live in the arena
// so the IR can hand out &'arena str without copying) and compilation statistics. All
// IR-adjacent allocations share the session lifetime and are freed together when the
// arena is dropped; nothing is freed individually. SessionStats tracks metrics like the
// number of functions compiled, phi nodes inserted during SSA construction, and spills
// generated by the register allocator.

//! Arena-based compilation session management.
//!
//! All compilation objects are tied to the session lifetime, eliminating
//! complex lifetime propagation. The session also collects statistics that
//! the driver can print after a run.

use bumpalo::Bump;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

/// Arena-based compilation session.
///
/// Owns the arena used for string interning and carries statistics across
/// passes. One session corresponds to one compilation; tearing down the
/// arena frees everything at once.
pub struct CompilationSession<'arena> {
    /// Arena allocator for compilation objects.
    arena: &'arena Bump,

    /// Session statistics for debugging and reporting.
    stats: RefCell<SessionStats>,

    /// String interning for efficient storage.
    interned_strings: RefCell<HashMap<String, &'arena str>>,
}

impl<'arena> CompilationSession<'arena> {
    /// Create a new compilation session with the given arena.
    pub fn new(arena: &'arena Bump) -> Self {
        Self {
            arena,
            stats: RefCell::new(SessionStats::default()),
            interned_strings: RefCell::new(HashMap::new()),
        }
    }

    /// Get access to the arena allocator.
    pub fn arena(&self) -> &'arena Bump {
        self.arena
    }

    /// Allocate an object in the session arena.
    pub fn alloc<T>(&self, value: T) -> &'arena mut T {
        self.arena.alloc(value)
    }

    /// Intern a string in the arena.
    pub fn intern_str(&self, s: &str) -> &'arena str {
        let mut strings = self.interned_strings.borrow_mut();
        if let Some(&interned) = strings.get(s) {
            return interned;
        }

        let interned = self.arena.alloc_str(s);
        strings.insert(s.to_string(), interned);
        interned
    }

    /// Record that a function was compiled to machine code.
    pub fn record_function_compiled(&self, name: &str, code_size: usize) {
        let mut stats = self.stats.borrow_mut();
        stats.functions_compiled += 1;
        stats.total_code_size += code_size;
        log::debug!("compiled `{}` ({} bytes)", name, code_size);
    }

    /// Record an instruction lowered to machine code.
    pub fn record_instruction_compiled(&self) {
        self.stats.borrow_mut().instructions_compiled += 1;
    }

    /// Record a phi node inserted during SSA construction.
    pub fn record_phi_inserted(&self) {
        self.stats.borrow_mut().phis_inserted += 1;
    }

    /// Record a spill emitted by the register allocator.
    pub fn record_spill_generated(&self) {
        self.stats.borrow_mut().spills_generated += 1;
    }

    /// Get compilation statistics.
    pub fn stats(&self) -> SessionStats {
        self.stats.borrow().clone()
    }
}

/// Compilation session statistics.
#[derive(Debug, Default, Clone)]
pub struct SessionStats {
    /// Number of functions compiled to machine code.
    pub functions_compiled: usize,

    /// Total code size generated (bytes).
    pub total_code_size: usize,

    /// Number of IR instructions lowered.
    pub instructions_compiled: usize,

    /// Phi nodes inserted by SSA construction.
    pub phis_inserted: usize,

    /// Spills generated by the register allocator.
    pub spills_generated: usize,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Compilation Session Statistics:")?;
        writeln!(f, "  Functions compiled: {}", self.functions_compiled)?;
        writeln!(f, "  Instructions compiled: {}", self.instructions_compiled)?;
        writeln!(f, "  Total code size: {} bytes", self.total_code_size)?;
        writeln!(f, "  Phi nodes inserted: {}", self.phis_inserted)?;
        writeln!(f, "  Spills generated: {}", self.spills_generated)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_creation() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);

        let stats = session.stats();
        assert_eq!(stats.functions_compiled, 0);
        assert_eq!(stats.phis_inserted, 0);
    }

    #[test]
    fn test_string_interning() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);

        let s1 = session.intern_str("hello");
        let s2 = session.intern_str("hello");
        let s3 = session.intern_str("world");

        assert_eq!(s1.as_ptr(), s2.as_ptr()); // Same string interned
        assert_ne!(s1.as_ptr(), s3.as_ptr()); // Different strings
    }

    #[test]
    fn test_session_statistics() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);

        session.record_function_compiled("test_func", 128);
        session.record_instruction_compiled();
        session.record_instruction_compiled();
        session.record_phi_inserted();
        session.record_spill_generated();

        let stats = session.stats();
        assert_eq!(stats.functions_compiled, 1);
        assert_eq!(stats.instructions_compiled, 2);
        assert_eq!(stats.total_code_size, 128);
        assert_eq!(stats.phis_inserted, 1);
        assert_eq!(stats.spills_generated, 1);
    }

    #[test]
    fn test_statistics_display() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);

        session.record_function_compiled("factorial", 256);

        let output = format!("{}", session.stats());
        assert!(output.contains("Functions compiled: 1"));
        assert!(output.contains("256 bytes"));
    }
}
