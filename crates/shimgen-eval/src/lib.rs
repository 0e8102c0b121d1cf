//! shimgen reference interpreter.
//!
//! Executes wrapper functions of a [`BindCModule`](shimgen_types::bind_c::BindCModule)
//! directly from the bind-C AST, with host closures standing in for the
//! wrapped native callables. A foreign caller's view of the ABI (flat
//! buffers, shapes, strides, null pointers) goes in; the ABI outputs come
//! back out. Used to check that a wrapper is behaviorally transparent.

mod error;
mod heap;
mod interpreter;
mod value;

pub use error::{EvalError, EvalResult};
pub use heap::{Heap, Object};
pub use interpreter::{CallArgs, CallOutcome, HostFn, Interpreter};
pub use value::{ArrayView, Handle, Value};
