//! Runtime error types for the reference interpreter.

use thiserror::Error;

/// Interpreter trap: a wrapper body did something the ABI contract forbids,
/// or the harness called it incorrectly.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("unknown wrapper function: {0}")]
    UnknownWrapper(String),

    /// No host implementation registered for a callable.
    #[error("no host implementation for {0}")]
    UnknownCallable(String),

    #[error("{wrapper} takes {expected} ABI arguments, got {found}")]
    ArityMismatch {
        wrapper: String,
        expected: usize,
        found: usize,
    },

    #[error("undefined variable: {0}")]
    UndefinedVariable(String),

    #[error("null pointer dereferenced through {0}")]
    NullPointer(String),

    /// Use of a freed or never-allocated heap cell.
    #[error("dangling handle #{0}")]
    DanglingHandle(usize),

    #[error("index {index:?} out of bounds for extents {extents:?}")]
    OutOfBounds { index: Vec<i64>, extents: Vec<usize> },

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("{class} has no attribute {attribute}")]
    MissingAttribute { class: String, attribute: String },

    /// Raised by a host closure.
    #[error("host error: {0}")]
    Host(String),
}

/// Result alias for interpreter operations.
pub type EvalResult<T> = Result<T, EvalError>;
