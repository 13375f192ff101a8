// This module defines error types for the sable compiler using the thiserror crate for
// idiomatic Rust error handling. CompileError covers failures surfaced by the passes:
// SSA renaming finding a variable read before any assignment reaches it, unknown
// identifiers during IR building, missing block terminators, machine-code encoding
// failures and object-file writing failures. ParseError is the frontend's own error
// type carrying source positions. Contract violations inside passes (out-of-range
// operand slots, malformed graphs handed to an analysis) are assertions, not errors:
// they indicate a bug in an earlier pass rather than bad user input.

//! Error types for the compiler.
//!
//! Using thiserror for more idiomatic error handling.

use thiserror::Error;

/// Main error type for compilation.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("variable `{name}` is read before any assignment reaches it")]
    UseBeforeDef { name: String },

    #[error("unknown variable `{name}`")]
    UnknownVariable { name: String },

    #[error("unknown function `{name}`")]
    UnknownFunction { name: String },

    #[error("type error: {0}")]
    Type(String),

    #[error("block `{block}` has no terminator")]
    MissingTerminator { block: String },

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("instruction encoding failed: {0}")]
    Encoding(String),

    #[error("object emission failed: {0}")]
    Object(#[from] object::write::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Result type alias for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;

/// Errors produced by the lexer and parser.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("{line}:{col}: unexpected character `{ch}`")]
    UnexpectedChar { ch: char, line: u32, col: u32 },

    #[error("{line}:{col}: expected {expected}, found `{found}`")]
    Unexpected {
        expected: String,
        found: String,
        line: u32,
        col: u32,
    },

    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: String },

    #[error("{line}:{col}: integer literal `{text}` is out of range")]
    BadNumber { text: String, line: u32, col: u32 },
}
