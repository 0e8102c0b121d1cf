//! Wrapper synthesis for shimgen.
//!
//! Lowers a semantically analysed [`Module`](shimgen_types::ast::Module) into
//! a [`BindCModule`](shimgen_types::bind_c::BindCModule) whose every public
//! symbol takes and returns only scalars and opaque pointers.
//!
//! # Pipeline
//!
//! For each function the module assembler marshals the arguments, then the
//! results, then synthesizes the call body, all within one child scope of the
//! module's [`ScopeTree`]. Classes route their methods and attributes through
//! the same logic.

mod argument;
mod body;
mod class;
mod error;
mod function;
mod module;
mod result;
pub mod scope;

pub use error::{WrapError, WrapResult};
pub use module::{wrap_module, WrappedModule};
pub use scope::{ScopeKind, ScopeTree};
pub use shimgen_types::Target;
