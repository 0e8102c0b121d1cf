//! Function and method wrapping.

use shimgen_types::ast::{FunctionDef, MethodRole};
use shimgen_types::bind_c::{BindCFunction, Origin, Stmt};
use tracing::debug;

use crate::argument::{classify_argument, ArgumentKind};
use crate::body::CallSite;
use crate::error::WrapResult;
use crate::module::Wrapper;
use crate::result::{classify_result, MarshaledResult, ResultSource};
use crate::scope::ScopeKind;

/// One function (or method) to wrap.
pub(crate) struct FunctionJob<'f> {
    pub def: &'f FunctionDef,
    /// Hint for the wrapper name, before collision resolution.
    pub wrapper_hint: String,
    pub origin: Origin,
    /// Name the original callable is invoked through.
    pub call_name: &'f str,
}

impl Wrapper<'_> {
    /// Wrap one callable.
    ///
    /// Unsupported arguments and results are detected before any name is
    /// allocated, so a failed wrap leaves no trace in the scope tree.
    pub(crate) fn wrap_function(&mut self, job: FunctionJob<'_>) -> WrapResult<BindCFunction> {
        let def = job.def;
        let arg_kinds = def
            .arguments
            .iter()
            .map(|a| classify_argument(&def.name, a))
            .collect::<WrapResult<Vec<ArgumentKind>>>()?;
        let result_kinds = def
            .results
            .iter()
            .map(|r| classify_result(&def.name, r))
            .collect::<WrapResult<Vec<_>>>()?;

        let root = self.scopes.root();
        let name = self.scopes.fresh_name(root, &job.wrapper_hint.to_lowercase());
        let scope = self.scopes.new_child(root, &name, ScopeKind::Function);

        let arguments: Vec<_> = def
            .arguments
            .iter()
            .zip(arg_kinds)
            .map(|(arg, kind)| {
                let view_alias = kind == ArgumentKind::Array && (def.is_inline || arg.contiguous);
                self.marshal_argument(scope, arg, kind, view_alias)
            })
            .collect();

        let mut results: Vec<MarshaledResult> = Vec::with_capacity(def.results.len());
        for (result, kind) in def.results.iter().zip(result_kinds) {
            let in_place = result
                .is_argument
                .then(|| arguments.iter().find(|a| a.name() == result.name))
                .flatten();
            let source = match in_place {
                Some(arg) => ResultSource::InPlace(arg),
                None => ResultSource::Call,
            };
            results.push(self.marshal_result(scope, result, kind, source));
        }

        let targets: Vec<_> = results.iter().filter_map(|r| r.call_target.clone()).collect();
        let site = CallSite {
            function: job.call_name,
            arguments: &arguments,
            targets: &targets,
        };
        let mut body = site.synthesize();
        for r in &mut results {
            body.append(&mut r.deferred);
        }
        if def.role == MethodRole::Destructor {
            if let Some(receiver) = arguments.iter().find(|a| a.bind.is_bound()) {
                body.push(Stmt::Deallocate {
                    var: receiver.bind.local.name.clone(),
                });
            }
        }

        debug!(
            function = %def.name,
            wrapper = %name,
            arguments = arguments.len(),
            results = results.len(),
            "wrapped function"
        );

        Ok(BindCFunction {
            name,
            origin: job.origin,
            arguments: arguments.into_iter().map(|a| a.bind).collect(),
            results: results.into_iter().map(|r| r.bind).collect(),
            body,
            locals: self.scopes.locals(scope),
            scope,
            docstring: def.docstring.clone(),
        })
    }
}
