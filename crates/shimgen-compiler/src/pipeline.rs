//! Multi-module wrapping and the JSON entry point.

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, error};

use shimgen_types::ast::Module;
use shimgen_types::{Diagnostics, Location};
use shimgen_wrapper::{wrap_module, WrappedModule};

use crate::error::{PipelineError, PipelineResult};
use crate::options::WrapOptions;

/// Result of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WrapOutput {
    /// True when no fatal diagnostic was recorded (and no warning either
    /// under `deny_warnings`), and the run itself did not fail.
    pub success: bool,
    pub modules: Vec<WrappedModule>,
    pub diagnostics: Diagnostics,
    /// Hex SHA-256 of the serialized wrapped modules.
    pub fingerprint: String,
    /// Pipeline-level failure (bad options or input); no modules then.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WrapOutput {
    fn failed(err: PipelineError) -> Self {
        Self {
            success: false,
            modules: Vec::new(),
            diagnostics: Diagnostics::new(),
            fingerprint: String::new(),
            error: Some(err.to_string()),
        }
    }

    /// Process exit status for the run: 0 on success, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.success)
    }

    pub fn module(&self, original: &str) -> Option<&WrappedModule> {
        self.modules.iter().find(|m| m.module.original == original)
    }
}

/// Hex SHA-256 over the JSON form of `modules`.
pub fn fingerprint(modules: &[WrappedModule]) -> PipelineResult<String> {
    let bytes =
        serde_json::to_vec(modules).map_err(|e| PipelineError::Serialization(e.to_string()))?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

/// Wrap every module independently, in input order.
///
/// Each module gets a fresh scope tree and diagnostics sink. A module whose
/// wrapper name cannot be allocated is reported and skipped.
pub fn wrap(modules: &[Module], options: &WrapOptions) -> WrapOutput {
    let mut diagnostics = Diagnostics::with_limit(options.max_diagnostics);
    let mut wrapped = Vec::with_capacity(modules.len());

    for module in modules {
        let mut sink = Diagnostics::with_limit(options.max_diagnostics);
        match wrap_module(module, options.target, &mut sink) {
            Ok(w) => wrapped.push(w),
            Err(err) => {
                let diagnostic = err.to_diagnostic(Location::module(&module.name, module.span));
                error!(code = diagnostic.code.0, "{}", diagnostic);
                sink.report(diagnostic);
            }
        }
        diagnostics.extend(sink);
    }

    let (fingerprint, error) = match fingerprint(&wrapped) {
        Ok(hash) => (hash, None),
        Err(err) => (String::new(), Some(err.to_string())),
    };
    let denied = options.deny_warnings && diagnostics.has_warnings();
    let success = error.is_none() && !diagnostics.has_fatal() && !denied;

    debug!(
        modules = wrapped.len(),
        fatal = diagnostics.total_fatal,
        warnings = diagnostics.total_warnings,
        success,
        "pipeline finished"
    );

    WrapOutput {
        success,
        modules: wrapped,
        diagnostics,
        fingerprint,
        error,
    }
}

fn parse_request(modules_json: &str, options_json: &str) -> PipelineResult<(Vec<Module>, WrapOptions)> {
    let options = if options_json.trim().is_empty() {
        WrapOptions::default()
    } else {
        WrapOptions::from_json(options_json)?
    };
    let modules: Vec<Module> = serde_json::from_str(modules_json)
        .map_err(|e| PipelineError::InvalidModules(e.to_string()))?;
    Ok((modules, options))
}

/// JSON in, JSON out. Never panics: every failure is reported inside the
/// returned `WrapOutput` document.
///
/// ```json
/// {
///   "success": true,
///   "modules": [ { "module": { "name": "bind_c_geometry", ... }, "scopes": { ... } } ],
///   "diagnostics": { "fatal": [], "warnings": [], "total_fatal": 0, "total_warnings": 0 },
///   "fingerprint": "9f2c..."
/// }
/// ```
pub fn wrap_json(modules_json: &str, options_json: &str) -> String {
    let output = match parse_request(modules_json, options_json) {
        Ok((modules, options)) => wrap(&modules, &options),
        Err(err) => WrapOutput::failed(err),
    };
    serde_json::to_string(&output).unwrap_or_else(|e| {
        format!(
            r#"{{"success":false,"modules":[],"diagnostics":{{"fatal":[],"warnings":[],"total_fatal":0,"total_warnings":0}},"fingerprint":"","error":"serialization error: {}"}}"#,
            e.to_string().replace('"', "'")
        )
    })
}
