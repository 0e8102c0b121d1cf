use serde::{Deserialize, Serialize};

use shimgen_types::{Target, MAX_DIAGNOSTICS};

use crate::error::{PipelineError, PipelineResult};

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WrapOptions {
    pub target: Target,
    /// Treat any warning as a failure of the run.
    pub deny_warnings: bool,
    /// Diagnostics kept per severity; totals keep counting past it.
    pub max_diagnostics: usize,
}

impl Default for WrapOptions {
    fn default() -> Self {
        Self {
            target: Target::Fortran,
            deny_warnings: false,
            max_diagnostics: MAX_DIAGNOSTICS,
        }
    }
}

impl WrapOptions {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            ..Self::default()
        }
    }

    /// Parse options from JSON. Missing fields take their defaults; unknown
    /// fields are rejected.
    pub fn from_json(json: &str) -> PipelineResult<Self> {
        serde_json::from_str(json).map_err(|e| PipelineError::InvalidOptions(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = WrapOptions::from_json("{}").unwrap();
        assert_eq!(options, WrapOptions::default());
        assert_eq!(options.max_diagnostics, 20);
        assert_eq!(options.target, Target::Fortran);
    }

    #[test]
    fn test_partial_options() {
        let options = WrapOptions::from_json(r#"{ "target": "cuda", "deny_warnings": true }"#).unwrap();
        assert_eq!(options.target, Target::Cuda);
        assert!(options.deny_warnings);
        assert_eq!(options.max_diagnostics, MAX_DIAGNOSTICS);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = WrapOptions::from_json(r#"{ "targt": "cuda" }"#).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidOptions(_)));
        assert!(err.to_string().contains("targt"));
    }

    #[test]
    fn test_unknown_target_rejected() {
        assert!(WrapOptions::from_json(r#"{ "target": "opencl" }"#).is_err());
    }
}
