//! Module/interface assembly: the top-level driver of a wrap.

use std::collections::BTreeMap;

use serde::Serialize;
use shimgen_types::ast::{FunctionResult, Interface, Module, ValueType, Variable};
use shimgen_types::bind_c::{
    BindCFunction, BindCInterface, BindCModule, BindCResult, BindCVariable, Expr, Local, Origin,
    ResultAbi, Stmt,
};
use shimgen_types::layout::for_target;
use shimgen_types::{Diagnostics, Location, Severity, Span, Target};
use tracing::{debug, error, warn};

use crate::error::{WrapError, WrapResult};
use crate::function::FunctionJob;
use crate::scope::{ScopeKind, ScopeTree};

/// The output of wrapping one module.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WrappedModule {
    pub module: BindCModule,
    /// Scope tree the wrapper names were allocated in.
    pub scopes: ScopeTree,
}

/// State of an in-progress wrap of one module.
pub(crate) struct Wrapper<'a> {
    pub(crate) module: &'a Module,
    pub(crate) target: Target,
    pub(crate) scopes: ScopeTree,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> Wrapper<'a> {
    fn new(module: &'a Module, target: Target, diagnostics: &'a mut Diagnostics) -> Self {
        Self {
            module,
            target,
            scopes: ScopeTree::new(target, &module.name, module.used_symbols()),
            diagnostics,
        }
    }

    /// Record a local failure; the caller drops the unit it concerns.
    pub(crate) fn report(&mut self, err: &WrapError, symbol: Option<&str>, span: Span) {
        let location = match symbol {
            Some(symbol) => Location::symbol(&self.module.name, symbol, span),
            None => Location::module(&self.module.name, span),
        };
        let diagnostic = err.to_diagnostic(location);
        match diagnostic.severity {
            Severity::Warning => warn!(code = diagnostic.code.0, "{}", diagnostic),
            Severity::Fatal => error!(code = diagnostic.code.0, "{}", diagnostic),
        }
        self.diagnostics.report(diagnostic);
    }

    fn wrap(mut self) -> WrappedModule {
        let module = self.module;
        let mut functions = Vec::new();
        let mut removed_functions = Vec::new();
        // Original name → wrapper name, for successfully wrapped functions.
        let mut wrapped: BTreeMap<&str, String> = BTreeMap::new();

        // ── Functions ──
        for def in module.functions.iter().filter(|f| {
            f.is_host_callable() && !f.is_inline && !f.is_private
        }) {
            let job = FunctionJob {
                def,
                wrapper_hint: format!("bind_c_{}", def.name),
                origin: Origin::Function(def.name.clone()),
                call_name: &def.name,
            };
            match self.wrap_function(job) {
                Ok(f) => {
                    wrapped.insert(def.name.as_str(), f.name.clone());
                    functions.push(f);
                }
                Err(err) => {
                    self.report(&err, Some(&def.name), def.span);
                    removed_functions.push(def.name.clone());
                }
            }
        }
        let designated = |name: &Option<String>| {
            name.as_deref()
                .and_then(|n| wrapped.get(n))
                .cloned()
        };
        let init_func = designated(&module.init_func);
        let free_func = designated(&module.free_func);

        // ── Interfaces ──
        let mut interfaces = Vec::new();
        if self.target.supports_interfaces() {
            interfaces = module
                .interfaces
                .iter()
                .filter(|i| !i.is_inline)
                .filter_map(|i| collect_interface(i, &wrapped))
                .collect();
        } else if !module.interfaces.is_empty() {
            let err = WrapError::UnsupportedFeature {
                feature: "Interface",
                target: self.target,
            };
            self.report(&err, None, module.span);
        }

        // ── Classes ──
        let mut classes = Vec::new();
        if self.target.supports_classes() {
            for class in &module.classes {
                classes.push(self.wrap_class(class));
            }
        } else if !module.classes.is_empty() {
            let err = WrapError::UnsupportedFeature {
                feature: "Class",
                target: self.target,
            };
            self.report(&err, None, module.span);
        }

        // ── Variables ──
        let mut variables = Vec::new();
        for var in module.variables.iter().filter(|v| !v.is_private) {
            match self.wrap_variable(var) {
                Ok(v) => variables.push(v),
                Err(err) => self.report(&err, Some(&var.name), var.span),
            }
        }

        let root = self.scopes.root();
        let name = self
            .scopes
            .fresh_name(root, &format!("bind_c_{}", module.name));

        debug!(
            module = %module.name,
            wrapper = %name,
            functions = functions.len(),
            removed = removed_functions.len(),
            classes = classes.len(),
            "wrapped module"
        );

        WrappedModule {
            module: BindCModule {
                name,
                original: module.name.clone(),
                target: self.target,
                variables,
                functions,
                init_func,
                free_func,
                interfaces,
                classes,
                removed_functions,
            },
            scopes: self.scopes,
        }
    }

    /// Scalars pass through; arrays get a parameterless accessor.
    fn wrap_variable(&mut self, var: &Variable) -> WrapResult<BindCVariable> {
        match &var.ty {
            ValueType::Scalar(kind) => Ok(BindCVariable::Scalar {
                name: var.name.clone(),
                kind: *kind,
            }),
            ValueType::Array { .. } => Ok(BindCVariable::Array {
                name: var.name.clone(),
                ty: var.ty.clone(),
                accessor: self.variable_accessor(var),
            }),
            _ => Err(WrapError::UnsupportedVariable {
                variable: var.name.clone(),
                ty: var.ty.to_string(),
            }),
        }
    }

    fn variable_accessor(&mut self, var: &Variable) -> BindCFunction {
        let root = self.scopes.root();
        let name = self
            .scopes
            .fresh_name(root, &format!("bind_c_{}", var.name.to_lowercase()));
        let scope = self.scopes.new_child(root, &name, ScopeKind::Function);
        let bind = self.scopes.fresh_name(scope, &format!("bound_{}", var.name));

        let rank = var.ty.rank();
        let shape: Vec<String> = (1..=rank)
            .map(|i| self.scopes.fresh_name(scope, &format!("{}_shape_{i}", var.name)))
            .collect();
        let native_dims = for_target(
            &(0..rank).collect::<Vec<_>>(),
            var.ty.order(),
            self.target.storage_order(),
        );
        let mut body: Vec<Stmt> = shape
            .iter()
            .zip(native_dims)
            .map(|(out, dim)| Stmt::Assign {
                lhs: Expr::var(out),
                rhs: Expr::Shape {
                    var: var.name.clone(),
                    dim,
                },
            })
            .collect();
        body.push(Stmt::CLoc {
            source: var.name.clone(),
            ptr: bind.clone(),
        });

        debug!(variable = %var.name, accessor = %name, "wrapped module variable");

        BindCFunction {
            name,
            origin: Origin::VariableAccessor(var.name.clone()),
            arguments: Vec::new(),
            results: vec![BindCResult {
                original: FunctionResult::new(&var.name, var.ty.clone()),
                local: Local::alias(&var.name, var.ty.clone()),
                abi: ResultAbi::Pointer { ptr: bind, shape },
            }],
            body,
            locals: self.scopes.locals(scope),
            scope,
            docstring: None,
        }
    }
}

/// Keep the overloads that were wrapped; drop the interface if none were.
pub(crate) fn collect_interface(
    interface: &Interface,
    wrapped: &BTreeMap<&str, String>,
) -> Option<BindCInterface> {
    let functions: Vec<String> = interface
        .functions
        .iter()
        .filter_map(|f| wrapped.get(f.as_str()).cloned())
        .collect();
    if functions.is_empty() {
        return None;
    }
    Some(BindCInterface {
        name: interface.name.clone(),
        functions,
    })
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Wrap one semantic module for `target`.
///
/// Failures of individual functions, attributes, variables and module
/// sections are recorded in `diagnostics` and the offending unit is left
/// out. Only a module that cannot be given a wrapper name is an error.
pub fn wrap_module(
    module: &Module,
    target: Target,
    diagnostics: &mut Diagnostics,
) -> WrapResult<WrappedModule> {
    if !is_identifier(&module.name) {
        return Err(WrapError::ModuleNameUnavailable {
            module: module.name.clone(),
        });
    }
    Ok(Wrapper::new(module, target, diagnostics).wrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_check() {
        assert!(is_identifier("geometry"));
        assert!(is_identifier("_mod2"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("2d"));
        assert!(!is_identifier("my-mod"));
    }

    #[test]
    fn test_empty_module_name_is_unrecoverable() {
        let mut diags = Diagnostics::new();
        let err = wrap_module(&Module::new(""), Target::Fortran, &mut diags).unwrap_err();
        assert!(matches!(err, WrapError::ModuleNameUnavailable { .. }));
        assert_eq!(err.severity(), Severity::Fatal);
    }

    #[test]
    fn test_empty_module() {
        let mut diags = Diagnostics::new();
        let wrapped = wrap_module(&Module::new("empty"), Target::Fortran, &mut diags).unwrap();
        assert_eq!(wrapped.module.name, "bind_c_empty");
        assert!(wrapped.module.functions.is_empty());
        assert!(diags.is_empty());
    }
}
