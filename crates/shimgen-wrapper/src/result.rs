//! Result marshaling.
//!
//! A scalar result is returned by value. Anything stored behind a pointer
//! (arrays, fixed-length tuples, class instances, lists, sets) gets a
//! `bound_*` pointer output plus one shape output per dimension, and a list
//! of deferred statements that run after the call: shape assignments,
//! allocation and copy (or element-by-element fill), then the address bind.

use shimgen_types::ast::{FunctionResult, ValueType};
use shimgen_types::bind_c::{
    BindCResult, Expr, IndexExpr, Local, ResultAbi, ScopeId, Stmt,
};
use shimgen_types::layout::for_target;

use crate::argument::MarshaledArgument;
use crate::error::{WrapError, WrapResult};
use crate::module::Wrapper;
use crate::scope::ScopeKind;

/// Marshaling rule selected for a result type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResultKind {
    Direct,
    /// Allocate a native copy and assign the computed value into it.
    Copy,
    /// Allocate an array and fill it by iterating the collection.
    Fill { set: bool },
}

pub(crate) fn classify_result(function: &str, result: &FunctionResult) -> WrapResult<ResultKind> {
    match &result.ty {
        ValueType::Scalar(_) => Ok(ResultKind::Direct),
        ValueType::Array { .. } | ValueType::Class(_) => Ok(ResultKind::Copy),
        ValueType::HomogeneousTuple {
            length: Some(_), ..
        } => Ok(ResultKind::Copy),
        ValueType::List(_) => Ok(ResultKind::Fill { set: false }),
        ValueType::Set(_) => Ok(ResultKind::Fill { set: true }),
        ValueType::HomogeneousTuple { length: None, .. }
        | ValueType::Tuple(_)
        | ValueType::FunctionRef => Err(WrapError::UnsupportedResult {
            function: function.to_string(),
            result: result.name.clone(),
            ty: result.ty.to_string(),
        }),
    }
}

/// Where the value of a result comes from.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ResultSource<'a> {
    /// Bound from the call to the wrapped callable.
    Call,
    /// Read from a class attribute; never copied.
    Dotted,
    /// One of the arguments, modified in place by the callee.
    InPlace(&'a MarshaledArgument),
}

/// A result bound by the call expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CallTarget {
    pub name: String,
    pub alias: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct MarshaledResult {
    pub bind: BindCResult,
    /// Statements appended after the call.
    pub deferred: Vec<Stmt>,
    pub call_target: Option<CallTarget>,
}

impl Wrapper<'_> {
    pub(crate) fn marshal_result(
        &mut self,
        scope: ScopeId,
        result: &FunctionResult,
        kind: ResultKind,
        source: ResultSource<'_>,
    ) -> MarshaledResult {
        let stored_in_ptr = kind != ResultKind::Direct;
        let dotted = matches!(source, ResultSource::Dotted);

        let local = match source {
            ResultSource::InPlace(arg) => arg.bind.local.clone(),
            ResultSource::Call | ResultSource::Dotted => {
                let actual = self.scopes.insert_symbol(scope, &result.name);
                let local = if result.is_alias || (dotted && stored_in_ptr) {
                    Local::alias(actual, result.ty.clone())
                } else {
                    Local::owned(actual, result.ty.clone())
                };
                self.scopes.insert_variable(scope, local.clone());
                local
            }
        };
        let call_target = matches!(source, ResultSource::Call).then(|| CallTarget {
            name: local.name.clone(),
            alias: result.is_alias,
        });

        if !stored_in_ptr {
            return MarshaledResult {
                bind: BindCResult {
                    original: result.clone(),
                    local,
                    abi: ResultAbi::Direct,
                },
                deferred: Vec::new(),
                call_target,
            };
        }

        let bind = self.scopes.fresh_name(scope, &format!("bound_{}", result.name));
        let rank = result.ty.rank();
        let shape: Vec<String> = (1..=rank)
            .map(|i| self.scopes.fresh_name(scope, &format!("{}_shape_{i}", result.name)))
            .collect();

        let native = self.target.storage_order();
        let native_dims = for_target(&(0..rank).collect::<Vec<_>>(), result.ty.order(), native);

        let mut deferred: Vec<Stmt> = match source {
            ResultSource::InPlace(arg) if arg.shape_params().len() == rank => shape
                .iter()
                .zip(arg.shape_params())
                .map(|(out, declared)| Stmt::Assign {
                    lhs: Expr::var(out),
                    rhs: Expr::var(declared),
                })
                .collect(),
            _ => shape
                .iter()
                .zip(&native_dims)
                .map(|(out, &dim)| Stmt::Assign {
                    lhs: Expr::var(out),
                    rhs: Expr::Shape {
                        var: local.name.clone(),
                        dim,
                    },
                })
                .collect(),
        };

        let copy_needed = matches!(source, ResultSource::Call) && !result.is_alias;
        if copy_needed {
            let ptr_var = self.scopes.fresh_name(scope, &format!("{}_ptr", result.name));
            self.scopes
                .insert_variable(scope, Local::alias(ptr_var.clone(), result.ty.clone()));
            let alloc_shape: Vec<Expr> = for_target(&shape, result.ty.order(), native)
                .iter()
                .map(Expr::var)
                .collect();
            deferred.push(Stmt::Allocate {
                var: ptr_var.clone(),
                shape: alloc_shape,
            });
            match kind {
                ResultKind::Fill { set } => {
                    deferred.extend(self.fill_loop(scope, result, &local, &ptr_var, set));
                }
                _ => deferred.push(Stmt::Assign {
                    lhs: Expr::var(&ptr_var),
                    rhs: local.var(),
                }),
            }
            deferred.push(Stmt::CLoc {
                source: ptr_var,
                ptr: bind.clone(),
            });
        } else {
            deferred.push(Stmt::CLoc {
                source: local.name.clone(),
                ptr: bind.clone(),
            });
        }

        MarshaledResult {
            bind: BindCResult {
                original: result.clone(),
                local,
                abi: ResultAbi::Pointer { ptr: bind, shape },
            },
            deferred,
            call_target,
        }
    }

    /// Copy a list or set into `ptr_var` one element at a time.
    ///
    /// Lists use the loop's positional counter; sets have no position, so the
    /// index is advanced explicitly.
    fn fill_loop(
        &mut self,
        scope: ScopeId,
        result: &FunctionResult,
        local: &Local,
        ptr_var: &str,
        set: bool,
    ) -> Vec<Stmt> {
        let idx = self.scopes.fresh_name(scope, "idx");
        self.scopes.insert_variable(scope, Local::index(idx.clone()));

        let loop_scope = self.scopes.new_child(scope, "for", ScopeKind::Loop);
        let element = self.scopes.fresh_name(loop_scope, "elem");
        let element_ty = result.ty.element().unwrap_or_else(|| result.ty.clone());
        self.scopes
            .insert_variable(loop_scope, Local::owned(element.clone(), element_ty));

        let base = self.target.index_base();
        let slot = if base == 0 {
            Expr::var(&idx)
        } else {
            Expr::add(Expr::var(&idx), Expr::Int(base))
        };
        let mut body = vec![Stmt::Assign {
            lhs: Expr::Index {
                base: ptr_var.to_string(),
                indices: vec![IndexExpr::Element(slot)],
            },
            rhs: Expr::var(&element),
        }];
        if set {
            body.push(Stmt::Assign {
                lhs: Expr::var(&idx),
                rhs: Expr::add(Expr::var(&idx), Expr::Int(1)),
            });
        }

        vec![
            Stmt::Assign {
                lhs: Expr::var(&idx),
                rhs: Expr::Int(0),
            },
            Stmt::For {
                element,
                iterable: local.name.clone(),
                counter: (!set).then_some(idx),
                body,
            },
        ]
    }
}
