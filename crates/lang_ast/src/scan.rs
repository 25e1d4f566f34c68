//! Flat AST scans used by the variable-type guessing pass: a `self` escape
//! detector and an explicit-return gatherer. Both walk the expression tree
//! only — nested `Def`s keep their bodies behind the def arena, so neither
//! scan crosses into another method.

use crate::{Expr, ExprId, Module};

/// Reports whether the subtree rooted at `expr` mentions `self` in a way
/// that exposes the instance. The one exception is `self.class`, which
/// yields the metaclass without leaking the receiver.
pub fn mentions_self(module: &Module, expr: ExprId) -> bool {
    match &module[expr] {
        Expr::Var(name) => name == "self",
        Expr::Call(call) => {
            let receiver_escapes = match call.receiver {
                Some(r) => {
                    !(call.name == "class"
                        && call.args.is_empty()
                        && matches!(&module[r], Expr::Var(name) if name == "self"))
                        && mentions_self(module, r)
                }
                None => false,
            };
            receiver_escapes
                || call.args.iter().any(|&a| mentions_self(module, a))
                || call.block_body.is_some_and(|b| mentions_self(module, b))
                || call.expansion.is_some_and(|x| mentions_self(module, x))
        }
        other => {
            let mut found = false;
            other.walk_child_exprs(|child| {
                if !found {
                    found = mentions_self(module, child);
                }
            });
            found
        }
    }
}

/// Collects every explicit `return` in a method body, in traversal order.
/// A bare `return` contributes `None` — the nil placeholder.
pub fn gather_returns(module: &Module, body: ExprId) -> Vec<Option<ExprId>> {
    let mut returns = Vec::new();
    gather_returns_into(module, body, &mut returns);
    returns
}

fn gather_returns_into(module: &Module, expr: ExprId, out: &mut Vec<Option<ExprId>>) {
    if let Expr::Return(value) = &module[expr] {
        out.push(*value);
    }
    module[expr].walk_child_exprs(|child| gather_returns_into(module, child, out));
}
