//! Wrapping error types.

use shimgen_types::{Diagnostic, DiagnosticCode, Location, Severity, Target};
use thiserror::Error;

/// Failures local to one wrapped unit (function, attribute, module feature).
///
/// Every variant except [`WrapError::ModuleNameUnavailable`] is turned into a
/// [`Diagnostic`] by the module assembler and the offending unit is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WrapError {
    /// An argument whose type has no ABI representation (function references).
    #[error("function '{function}' cannot be wrapped: argument '{argument}' of type {ty} has no ABI representation")]
    UnsupportedArgument {
        function: String,
        argument: String,
        ty: String,
    },

    /// A result with no marshaling rule.
    #[error("don't know how to return an object of type {ty} ('{result}' of '{function}') to C code")]
    UnsupportedResult {
        function: String,
        result: String,
        ty: String,
    },

    /// A class attribute that cannot be exposed.
    #[error("attribute '{attribute}' of class '{class}' has type {ty}, which cannot be exposed yet")]
    UnsupportedAttribute {
        class: String,
        attribute: String,
        ty: String,
    },

    /// A whole module section the target dialect cannot wrap.
    #[error("{feature} wrapping is not yet supported for {target}")]
    UnsupportedFeature { feature: &'static str, target: Target },

    /// A module variable whose type cannot be exposed.
    #[error("module variable '{variable}' of type {ty} cannot be wrapped yet")]
    UnsupportedVariable { variable: String, ty: String },

    /// The module cannot be given a wrapper name.
    #[error("module name '{module}' cannot produce a wrapper module name")]
    ModuleNameUnavailable { module: String },
}

impl WrapError {
    pub fn code(&self) -> DiagnosticCode {
        match self {
            Self::UnsupportedArgument { .. } => DiagnosticCode::UNSUPPORTED_ARGUMENT,
            Self::UnsupportedResult { .. } => DiagnosticCode::UNSUPPORTED_RESULT,
            Self::UnsupportedAttribute { .. } => DiagnosticCode::UNSUPPORTED_ATTRIBUTE,
            Self::UnsupportedFeature { .. } => DiagnosticCode::UNSUPPORTED_FEATURE,
            Self::UnsupportedVariable { .. } => DiagnosticCode::UNSUPPORTED_VARIABLE,
            Self::ModuleNameUnavailable { .. } => DiagnosticCode::MODULE_NAME_UNAVAILABLE,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::UnsupportedResult { .. } | Self::ModuleNameUnavailable { .. } => Severity::Fatal,
            _ => Severity::Warning,
        }
    }

    pub fn to_diagnostic(&self, location: Location) -> Diagnostic {
        Diagnostic::new(self.code(), self.severity(), self.to_string(), location)
    }
}

/// Wrapper result type alias.
pub type WrapResult<T> = Result<T, WrapError>;

#[cfg(test)]
mod tests {
    use super::*;
    use shimgen_types::Span;

    #[test]
    fn test_codes_and_severities() {
        let arg = WrapError::UnsupportedArgument {
            function: "apply".into(),
            argument: "f".into(),
            ty: "function".into(),
        };
        assert_eq!(arg.code(), DiagnosticCode::UNSUPPORTED_ARGUMENT);
        assert_eq!(arg.severity(), Severity::Warning);

        let res = WrapError::UnsupportedResult {
            function: "pair".into(),
            result: "t".into(),
            ty: "tuple[int64, bool]".into(),
        };
        assert_eq!(res.severity(), Severity::Fatal);
    }

    #[test]
    fn test_feature_message() {
        let err = WrapError::UnsupportedFeature {
            feature: "Interface",
            target: Target::Cuda,
        };
        assert_eq!(err.to_string(), "Interface wrapping is not yet supported for cuda");
        let d = err.to_diagnostic(Location::module("kernels", Span::default()));
        assert_eq!(d.code, DiagnosticCode::UNSUPPORTED_FEATURE);
        assert_eq!(d.severity, Severity::Warning);
    }
}
