// ==============================================================================
// Type-expression guessing for generic owners
// ==============================================================================
//
// Instance variables of a generic class cannot hold resolved types: the
// same assignment means something different under every instantiation. This
// dispatcher mirrors the concrete guesser case by case but keeps results as
// syntactic type expressions wherever resolution must be deferred. The two
// top-level dispatchers stay separate on purpose; only the leaf helpers are
// shared.

use lang_ast::{Expr, ExprId};
use lang_ty::{Resolution, Ty};

use crate::{GuessCtx, GuessError, TypeCandidate};

impl GuessCtx<'_> {
    pub(crate) fn guess_type_vars(
        &mut self,
        e: ExprId,
    ) -> Result<Option<Vec<TypeCandidate>>, GuessError> {
        let module = self.module;
        match &module[e] {
            Expr::Var(name) => {
                if name == "self" {
                    return self.wrap_concrete(e);
                }
                let Some(def_id) = self.current_def else {
                    return self.wrap_concrete(e);
                };
                let def = &module[def_id];
                if let Some(param) = def.args.iter().find(|p| p.name == *name) {
                    if let Some(te) = param.restriction {
                        // The restriction node itself is the candidate; the
                        // resolution attempt still runs so an illegal type
                        // is recorded.
                        let _ = self.lookup_var_type(te);
                        return Ok(Some(vec![TypeCandidate::Node(te)]));
                    }
                    if let Some(default) = param.default {
                        return Ok(self
                            .guess_type(default)?
                            .map(|ty| vec![TypeCandidate::Resolved(ty)]));
                    }
                    return Ok(None);
                }
                if let Some(block) = &def.block_arg {
                    if block.name == *name {
                        return Ok(Some(match block.restriction {
                            Some(te) => {
                                let _ = self.lookup_var_type(te);
                                vec![TypeCandidate::Node(te)]
                            }
                            None => vec![TypeCandidate::Resolved(Ty::proc_of([], Ty::VOID))],
                        }));
                    }
                }
                Ok(None)
            }

            Expr::InstanceVar(name) => {
                let explicit = self
                    .inputs
                    .explicit_ivars
                    .get(&self.owner)
                    .and_then(|vars| vars.get(name))
                    .map(|decl| decl.type_expr);
                if let Some(te) = explicit {
                    return Ok(Some(vec![TypeCandidate::Node(te)]));
                }
                Ok(self
                    .result
                    .instance_vars
                    .get(&self.owner)
                    .and_then(|vars| vars.get(name))
                    .map(|info| info.type_vars.clone()))
            }

            // `of` clauses become a fabricated container node over the
            // existing element expressions, re-resolved per instantiation.
            Expr::ArrayLiteral {
                of_elem: Some(of), ..
            } => Ok(Some(vec![TypeCandidate::OfGeneric {
                class: self.registry.array_class(),
                args: Box::new([*of]),
            }])),
            Expr::HashLiteral {
                of_pair: Some((key, value)),
                ..
            } => Ok(Some(vec![TypeCandidate::OfGeneric {
                class: self.registry.hash_class(),
                args: Box::new([*key, *value]),
            }])),

            Expr::If {
                then_body,
                else_body,
                ..
            }
            | Expr::Unless {
                then_body,
                else_body,
                ..
            } => {
                let mut branches = vec![self.guess_type_vars(*then_body)?];
                branches.push(match else_body {
                    Some(else_body) => self.guess_type_vars(*else_body)?,
                    None => Some(vec![TypeCandidate::Resolved(Ty::NIL)]),
                });
                Ok(concat_candidates(branches))
            }

            Expr::Case {
                whens, else_body, ..
            } => {
                let mut branches = Vec::new();
                for when in whens.iter() {
                    branches.push(self.guess_type_vars(when.body)?);
                }
                if let Some(else_body) = else_body {
                    branches.push(self.guess_type_vars(*else_body)?);
                }
                Ok(concat_candidates(branches))
            }

            Expr::BinOp { lhs, rhs, .. } => {
                let branches = vec![self.guess_type_vars(*lhs)?, self.guess_type_vars(*rhs)?];
                Ok(concat_candidates(branches))
            }

            Expr::Expressions(items) => {
                let mut branches = Vec::with_capacity(items.len());
                for &item in items.iter() {
                    branches.push(self.guess_type_vars(item)?);
                }
                Ok(concat_candidates(branches))
            }

            // `T.new` with an uninstantiated generic receiver cannot form a
            // concrete value; the node sits in a type-expression context, so
            // no disallowed-type error is recorded either. A concrete
            // receiver behaves as the concrete guesser does.
            Expr::Call(call) if call.name == "new" => {
                if let Some(receiver) = call.receiver {
                    if let Some(Resolution::Type(Ty::Class(id))) =
                        self.resolve_receiver(receiver)
                    {
                        if self.registry.is_generic(id) {
                            return Ok(None);
                        }
                    }
                }
                self.wrap_concrete(e)
            }

            _ => self.wrap_concrete(e),
        }
    }

    /// Fall back to the concrete guesser and wrap its result.
    fn wrap_concrete(&mut self, e: ExprId) -> Result<Option<Vec<TypeCandidate>>, GuessError> {
        Ok(self
            .guess_type(e)?
            .map(|ty| vec![TypeCandidate::Resolved(ty)]))
    }
}

/// Union-as-list: concatenate branch candidates, dropping branches that
/// contributed nothing. `None` only when every branch came up empty.
fn concat_candidates(branches: Vec<Option<Vec<TypeCandidate>>>) -> Option<Vec<TypeCandidate>> {
    let mut merged: Option<Vec<TypeCandidate>> = None;
    for branch in branches.into_iter().flatten() {
        merged.get_or_insert_with(Vec::new).extend(branch);
    }
    merged
}
