//! Call-body synthesis.
//!
//! The body of a wrapper is a binary tree of presence checks, one level per
//! optional argument in declaration order. Each leaf is straight-line code:
//! reinterpret the pointers of the arguments live on that path, bind any
//! temporary views, call the wrapped callable and bind its results.

use std::collections::BTreeSet;

use shimgen_types::bind_c::{CallArgument, Expr, Stmt};
use tracing::trace;

use crate::argument::MarshaledArgument;
use crate::result::CallTarget;

/// Everything needed to emit the call to the wrapped callable.
pub(crate) struct CallSite<'a> {
    /// Name the callable is invoked through.
    pub function: &'a str,
    pub arguments: &'a [MarshaledArgument],
    pub targets: &'a [CallTarget],
}

impl CallSite<'_> {
    /// Build the full presence-check tree.
    pub(crate) fn synthesize(&self) -> Vec<Stmt> {
        let live = (0..self.arguments.len()).collect();
        self.branch(live, BTreeSet::new())
    }

    /// `handled` is owned by each branch so that the two sides of a check
    /// never see each other's decisions.
    fn branch(&self, live: Vec<usize>, mut handled: BTreeSet<usize>) -> Vec<Stmt> {
        let optional = live
            .iter()
            .copied()
            .find(|&i| self.arguments[i].bind.is_optional() && !handled.contains(&i));

        let Some(index) = optional else {
            return self.leaf(&live);
        };
        let arg = &self.arguments[index];
        let Some(ptr) = arg.bind.pointer() else {
            return self.leaf(&live);
        };
        trace!(function = self.function, argument = arg.name(), "splitting on optional");

        handled.insert(index);
        let absent: Vec<usize> = live.iter().copied().filter(|&i| i != index).collect();
        let body = self.branch(live, handled.clone());
        let orelse = self.branch(absent, handled);

        vec![Stmt::If {
            condition: Expr::is_not_null(Expr::var(ptr)),
            body,
            orelse,
        }]
    }

    fn leaf(&self, live: &[usize]) -> Vec<Stmt> {
        // Receiver first, then declaration order.
        let mut order: Vec<usize> = live.to_vec();
        order.sort_by_key(|&i| (!self.arguments[i].bind.is_bound(), i));

        let mut body: Vec<Stmt> = order
            .iter()
            .filter_map(|&i| self.arguments[i].reinterpret.clone())
            .collect();

        for &i in &order {
            let arg = &self.arguments[i];
            if let Some(alias) = &arg.view_alias {
                body.push(Stmt::AliasAssign {
                    lhs: Expr::var(alias),
                    rhs: arg.bind.call_value.clone(),
                });
            }
        }

        let call = Expr::Call {
            function: self.function.to_string(),
            args: live
                .iter()
                .map(|&i| CallArgument {
                    keyword: Some(self.arguments[i].name().to_string()),
                    value: self.arguments[i].passed_value(),
                })
                .collect(),
        };
        body.push(self.bind(call));
        body
    }

    fn bind(&self, call: Expr) -> Stmt {
        match self.targets {
            [] => Stmt::Expr(call),
            [single] if single.alias => Stmt::AliasAssign {
                lhs: Expr::var(&single.name),
                rhs: call,
            },
            [single] => Stmt::Assign {
                lhs: Expr::var(&single.name),
                rhs: call,
            },
            many => Stmt::Assign {
                lhs: Expr::Tuple(many.iter().map(|t| Expr::var(&t.name)).collect()),
                rhs: call,
            },
        }
    }
}
