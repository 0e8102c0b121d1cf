//! shimgen pipeline: wraps semantic modules into bind-C wrapper modules.
//!
//! ```text
//! Module(s) → Wrapper (per module, fresh scope tree) → WrapOutput { modules, diagnostics, fingerprint }
//! ```
//!
//! Failures inside a module never stop the pipeline: they become
//! diagnostics and the offending unit is left out of the output.

mod error;
mod options;
mod pipeline;

pub use error::{PipelineError, PipelineResult};
pub use options::WrapOptions;
pub use pipeline::{fingerprint, wrap, wrap_json, WrapOutput};
