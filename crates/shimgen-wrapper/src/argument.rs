//! Argument marshaling.
//!
//! Each declared argument becomes either a direct scalar parameter or one
//! opaque pointer (plus shape and stride scalars for arrays, a length for
//! sequences). The reinterpretation statement that rebuilds the native value
//! is built here, once, and only emitted later by the body synthesizer on
//! the paths where the argument is live.

use shimgen_types::ast::{FunctionArgument, ValueType};
use shimgen_types::bind_c::{ArgumentAbi, BindCArgument, Expr, IndexExpr, Local, ScopeId, Stmt};
use shimgen_types::layout::for_target;
use tracing::trace;

use crate::error::{WrapError, WrapResult};
use crate::module::Wrapper;

/// How an argument crosses the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArgumentKind {
    /// Non-optional scalar passed by value.
    Direct,
    /// Array: pointer + shape + strides.
    Array,
    /// Homogeneous tuple, list or set: pointer + length.
    Sequence,
    /// Optional scalar or class instance: a bare pointer.
    Handle,
}

/// Decide the ABI form of `arg`, or fail the wrap of `function`.
pub(crate) fn classify_argument(function: &str, arg: &FunctionArgument) -> WrapResult<ArgumentKind> {
    match &arg.ty {
        ValueType::Scalar(_) if arg.optional => Ok(ArgumentKind::Handle),
        ValueType::Scalar(_) => Ok(ArgumentKind::Direct),
        ValueType::Array { .. } => Ok(ArgumentKind::Array),
        ValueType::HomogeneousTuple { .. } | ValueType::List(_) | ValueType::Set(_) => {
            Ok(ArgumentKind::Sequence)
        }
        ValueType::Class(_) => Ok(ArgumentKind::Handle),
        ValueType::FunctionRef | ValueType::Tuple(_) => Err(WrapError::UnsupportedArgument {
            function: function.to_string(),
            argument: arg.name.clone(),
            ty: arg.ty.to_string(),
        }),
    }
}

/// A wrapped argument together with what the body needs to use it.
#[derive(Debug, Clone)]
pub(crate) struct MarshaledArgument {
    pub bind: BindCArgument,
    /// Rebuilds `bind.local` from the ABI pointer. `None` for direct scalars.
    pub reinterpret: Option<Stmt>,
    /// Temporary alias bound to the strided view right before the call.
    pub view_alias: Option<String>,
}

impl MarshaledArgument {
    pub fn name(&self) -> &str {
        &self.bind.original.name
    }

    /// The value handed to the wrapped callable on a live path.
    pub fn passed_value(&self) -> Expr {
        match &self.view_alias {
            Some(alias) => Expr::var(alias),
            None => self.bind.call_value.clone(),
        }
    }

    /// Declared-order shape parameter names (empty unless pointer-backed).
    pub fn shape_params(&self) -> &[String] {
        match &self.bind.abi {
            ArgumentAbi::Pointer { shape, .. } => shape,
            ArgumentAbi::Direct => &[],
        }
    }
}

impl Wrapper<'_> {
    /// Marshal one argument into `scope`.
    ///
    /// `needs_view_alias` requests a temporary alias for array arguments
    /// (inline callees and arguments declared contiguous).
    pub(crate) fn marshal_argument(
        &mut self,
        scope: ScopeId,
        arg: &FunctionArgument,
        kind: ArgumentKind,
        needs_view_alias: bool,
    ) -> MarshaledArgument {
        let actual = self.scopes.insert_symbol(scope, &arg.name);

        if kind == ArgumentKind::Direct {
            let local = Local::owned(actual, arg.ty.clone());
            return MarshaledArgument {
                bind: BindCArgument {
                    original: arg.clone(),
                    call_value: local.var(),
                    local,
                    abi: ArgumentAbi::Direct,
                },
                reinterpret: None,
                view_alias: None,
            };
        }

        let ptr = self.scopes.fresh_name(scope, &format!("bound_{}", arg.name));
        let local = Local::alias(actual.clone(), arg.ty.clone());
        self.scopes.insert_variable(scope, local.clone());

        let (shape, strides, reinterpret, call_value, view_alias) = match kind {
            ArgumentKind::Array => {
                let rank = arg.ty.rank();
                let shape: Vec<String> = (1..=rank)
                    .map(|i| self.scopes.fresh_name(scope, &format!("{}_shape_{i}", arg.name)))
                    .collect();
                let strides: Vec<String> = (1..=rank)
                    .map(|i| self.scopes.fresh_name(scope, &format!("{}_stride_{i}", arg.name)))
                    .collect();

                let native = self.target.storage_order();
                let native_shape = for_target(&shape, arg.ty.order(), native);
                let native_strides = for_target(&strides, arg.ty.order(), native);
                if arg.ty.order().crosses(native) {
                    trace!(argument = %arg.name, "reversing shape and strides for native order");
                }

                // The caller's buffer spans shape*stride elements per dimension.
                let sizes = native_shape
                    .iter()
                    .zip(&native_strides)
                    .map(|(sh, st)| Expr::mul(Expr::var(sh), Expr::var(st)))
                    .collect();
                let base = self.target.index_base();
                let indices = native_strides
                    .iter()
                    .map(|st| IndexExpr::Slice {
                        start: Expr::Int(base),
                        stop: None,
                        step: Expr::var(st),
                    })
                    .collect();
                let call_value = Expr::Index {
                    base: actual.clone(),
                    indices,
                };

                let view_alias = needs_view_alias.then(|| {
                    let tmp = self.scopes.fresh_name(scope, &arg.name);
                    self.scopes
                        .insert_variable(scope, Local::alias(tmp.clone(), arg.ty.clone()));
                    tmp
                });

                let reinterpret = Stmt::CFPointer {
                    ptr: ptr.clone(),
                    target: actual,
                    sizes,
                };
                (shape, strides, reinterpret, call_value, view_alias)
            }
            ArgumentKind::Sequence => {
                let length = self
                    .scopes
                    .fresh_name(scope, &format!("{}_shape_1", arg.name));
                let reinterpret = Stmt::CFPointer {
                    ptr: ptr.clone(),
                    target: actual.clone(),
                    sizes: vec![Expr::var(&length)],
                };
                (vec![length], Vec::new(), reinterpret, Expr::var(actual), None)
            }
            ArgumentKind::Handle | ArgumentKind::Direct => {
                let reinterpret = Stmt::CFPointer {
                    ptr: ptr.clone(),
                    target: actual.clone(),
                    sizes: Vec::new(),
                };
                (Vec::new(), Vec::new(), reinterpret, Expr::var(actual), None)
            }
        };

        MarshaledArgument {
            bind: BindCArgument {
                original: arg.clone(),
                local,
                abi: ArgumentAbi::Pointer {
                    ptr,
                    shape,
                    strides,
                },
                call_value,
            },
            reinterpret: Some(reinterpret),
            view_alias,
        }
    }
}
