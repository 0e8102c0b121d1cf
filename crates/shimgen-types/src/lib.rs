//! Shared types for shimgen.
//!
//! This crate defines the semantic AST consumed by the wrapper engine, the
//! bind-C wrapper AST it produces, source spans, array layout helpers, and the
//! structured diagnostics shared by every stage.

mod error;
mod span;
mod target;
pub mod ast;
pub mod bind_c;
pub mod layout;

pub use error::{
    Diagnostic, DiagnosticCategory, DiagnosticCode, Diagnostics, Location, Severity,
    MAX_DIAGNOSTICS,
};
pub use span::Span;
pub use target::Target;
