//! Pipeline error types.

use thiserror::Error;

/// Errors raised before or after wrapping: bad configuration, unreadable
/// input, unserializable output. Wrapping failures are diagnostics, not
/// `PipelineError`s.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error("invalid module input: {0}")]
    InvalidModules(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
