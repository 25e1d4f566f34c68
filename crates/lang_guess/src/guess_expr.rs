// ==============================================================================
// Concrete type guessing
// ==============================================================================
//
// One exhaustive dispatch over expression kinds: AST node in, resolved type
// (or nothing) out. Never errors for "don't know" — the only hard failure
// comes from attributing a nested assignment under a forbidding owner.
// Recursion through constants and through method bodies is bounded by the
// two LIFO stacks on the context.

use lang_ast::{scan, Call, ClassId, Expr, ExprId, NodeRef, TypeExpr, TypeExprId};
use lang_ty::{resolve, resolve_path, DefKind, MethodSig, Resolution, Ty};

use crate::{GuessCtx, GuessError};

impl GuessCtx<'_> {
    pub(crate) fn guess_type(&mut self, e: ExprId) -> Result<Option<Ty>, GuessError> {
        let module = self.module;
        match &module[e] {
            Expr::Literal(lit) => Ok(Some(lit.into())),
            Expr::StringInterpolation(_) => Ok(Some(Ty::STRING)),

            Expr::Range { from, to, .. } => {
                let Some(from_ty) = self.guess_type(*from)? else {
                    return Ok(None);
                };
                let Some(to_ty) = self.guess_type(*to)? else {
                    return Ok(None);
                };
                Ok(Some(self.registry.range_of(from_ty, to_ty)))
            }

            Expr::ArrayLiteral {
                elements,
                of_elem,
                constructor,
            } => self.guess_array_literal(elements, *of_elem, *constructor),

            Expr::HashLiteral {
                entries,
                of_pair,
                constructor,
            } => self.guess_hash_literal(entries, *of_pair, *constructor),

            // All elements or nothing: a tuple with an unknown slot is not
            // a usable tuple type.
            Expr::TupleLiteral(elements) => {
                let mut tys = Vec::with_capacity(elements.len());
                for &element in elements.iter() {
                    let Some(ty) = self.guess_type(element)? else {
                        return Ok(None);
                    };
                    tys.push(ty);
                }
                Ok(Some(Ty::tuple(tys)))
            }

            Expr::NamedTupleLiteral(entries) => {
                let mut fields = Vec::with_capacity(entries.len());
                for (name, value) in entries.iter() {
                    let Some(ty) = self.guess_type(*value)? else {
                        return Ok(None);
                    };
                    fields.push((name.clone(), ty));
                }
                Ok(Some(Ty::named_tuple(fields)))
            }

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
                let then_ty = self.guess_type(*then_body)?;
                // A missing else is the parser's implicit nop, which is nil.
                let else_ty = match else_body {
                    Some(else_body) => self.guess_type(*else_body)?,
                    None => Some(Ty::NIL),
                };
                Ok(merge_opt(then_ty, else_ty))
            }

            // A case without an else keeps its `when` coverage as-is: no
            // implicit nil joins the merge.
            Expr::Case {
                whens, else_body, ..
            } => {
                let mut parts = Vec::new();
                for when in whens.iter() {
                    if let Some(ty) = self.guess_type(when.body)? {
                        parts.push(ty);
                    }
                }
                if let Some(else_body) = else_body {
                    if let Some(ty) = self.guess_type(*else_body)? {
                        parts.push(ty);
                    }
                }
                Ok(Ty::merge(parts))
            }

            Expr::BinOp { lhs, rhs, .. } => {
                let lhs_ty = self.guess_type(*lhs)?;
                let rhs_ty = self.guess_type(*rhs)?;
                Ok(merge_opt(lhs_ty, rhs_ty))
            }

            Expr::Not(_) | Expr::IsA { .. } | Expr::RespondsTo { .. } => Ok(Some(Ty::BOOL)),
            Expr::SizeOf(_) | Expr::InstanceSizeOf(_) => Ok(Some(Ty::INT32)),
            Expr::Nop => Ok(Some(Ty::NIL)),

            Expr::UninitializedVar { ty, .. } => Ok(self.lookup_var_type(*ty)),

            Expr::Cast { expr, ty } => {
                // `x.as(typeof(e))` guesses through the inner expression.
                if let TypeExpr::Typeof(exprs) = &module[*ty] {
                    if exprs.len() == 1 {
                        return self.guess_type(exprs[0]);
                    }
                }
                Ok(self.lookup_var_type(*ty))
            }

            Expr::NilableCast { ty, .. } => Ok(self.lookup_var_type(*ty).map(Ty::nilable)),

            Expr::Var(name) => self.guess_var(name),
            Expr::InstanceVar(name) => Ok(self.guess_instance_var(name)),
            Expr::Path { names, global } => self.guess_path_expr(names, *global),

            Expr::Generic(te) => {
                match resolve(self.registry, module, self.owner, *te, false) {
                    Some(Resolution::Type(ty)) => Ok(Some(ty.metaclass())),
                    _ => Ok(None),
                }
            }

            Expr::Call(call) => self.guess_call(call),

            Expr::Expressions(items) => match items.last() {
                Some(&last) => self.guess_type(last),
                None => Ok(None),
            },

            // Nested assignments are attributed as they are guessed through,
            // so `@a = @b = 1` contributes to both variables.
            Expr::Assign { target, value } => self.process_assign(*target, *value),
            Expr::MultiAssign { targets, values } => {
                self.process_multi_assign(targets, values)?;
                Ok(None)
            }

            _ => Ok(None),
        }
    }

    fn guess_array_literal(
        &mut self,
        elements: &[ExprId],
        of_elem: Option<TypeExprId>,
        constructor: Option<TypeExprId>,
    ) -> Result<Option<Ty>, GuessError> {
        if let Some(ctor) = constructor {
            return match resolve(self.registry, self.module, self.owner, ctor, false) {
                Some(Resolution::Type(Ty::Class(id))) if self.registry.is_generic(id) => {
                    let Some(elem) = self.merge_guesses(elements)? else {
                        return Ok(None);
                    };
                    Ok(Some(Ty::Instance {
                        class: id,
                        args: Box::new([elem.into()]),
                    }))
                }
                Some(Resolution::Type(ty)) => Ok(self.admit_var_type(ty, NodeRef::Type(ctor))),
                _ => Ok(None),
            };
        }
        if let Some(of) = of_elem {
            return Ok(self
                .lookup_var_type(of)
                .map(|elem| self.registry.array_of(elem)));
        }
        let merged = self.merge_guesses(elements)?;
        Ok(merged.map(|elem| self.registry.array_of(elem)))
    }

    fn guess_hash_literal(
        &mut self,
        entries: &[(ExprId, ExprId)],
        of_pair: Option<(TypeExprId, TypeExprId)>,
        constructor: Option<TypeExprId>,
    ) -> Result<Option<Ty>, GuessError> {
        if let Some(ctor) = constructor {
            return match resolve(self.registry, self.module, self.owner, ctor, false) {
                Some(Resolution::Type(Ty::Class(id))) if self.registry.is_generic(id) => {
                    let Some((key, value)) = self.merge_entry_guesses(entries)? else {
                        return Ok(None);
                    };
                    Ok(Some(Ty::Instance {
                        class: id,
                        args: Box::new([key.into(), value.into()]),
                    }))
                }
                Some(Resolution::Type(ty)) => Ok(self.admit_var_type(ty, NodeRef::Type(ctor))),
                _ => Ok(None),
            };
        }
        if let Some((key_te, value_te)) = of_pair {
            let Some(key) = self.lookup_var_type(key_te) else {
                return Ok(None);
            };
            let Some(value) = self.lookup_var_type(value_te) else {
                return Ok(None);
            };
            return Ok(Some(self.registry.hash_of(key, value)));
        }
        let merged = self.merge_entry_guesses(entries)?;
        Ok(merged.map(|(key, value)| self.registry.hash_of(key, value)))
    }

    fn merge_guesses(&mut self, exprs: &[ExprId]) -> Result<Option<Ty>, GuessError> {
        let mut parts = Vec::new();
        for &expr in exprs {
            if let Some(ty) = self.guess_type(expr)? {
                parts.push(ty);
            }
        }
        Ok(Ty::merge(parts))
    }

    fn merge_entry_guesses(
        &mut self,
        entries: &[(ExprId, ExprId)],
    ) -> Result<Option<(Ty, Ty)>, GuessError> {
        let mut keys = Vec::new();
        let mut values = Vec::new();
        for &(key, value) in entries {
            if let Some(ty) = self.guess_type(key)? {
                keys.push(ty);
            }
            if let Some(ty) = self.guess_type(value)? {
                values.push(ty);
            }
        }
        match (Ty::merge(keys), Ty::merge(values)) {
            (Some(key), Some(value)) => Ok(Some((key, value))),
            _ => Ok(None),
        }
    }

    // -- Variable references -------------------------------------------------

    fn guess_var(&mut self, name: &str) -> Result<Option<Ty>, GuessError> {
        if name == "self" {
            let def = self.registry.def(self.owner);
            let is_concrete_class = matches!(def.kind, DefKind::Class { .. }) && !def.is_generic();
            return Ok(is_concrete_class.then(|| self.registry.virtual_ty(self.owner)));
        }
        let Some(def_id) = self.current_def else {
            return Ok(None);
        };
        let def = &self.module[def_id];
        if let Some(param) = def.args.iter().find(|p| p.name == name) {
            if let Some(te) = param.restriction {
                return Ok(self.lookup_var_type(te));
            }
            if let Some(default) = param.default {
                return self.guess_type(default);
            }
            return Ok(None);
        }
        if let Some(block) = &def.block_arg {
            if block.name == name {
                return Ok(match block.restriction {
                    Some(te) => self.lookup_var_type(te),
                    // An unrestricted block parameter is a proc producing void.
                    None => Some(Ty::proc_of([], Ty::VOID)),
                });
            }
        }
        Ok(None)
    }

    /// An instance variable read picks up the explicit declaration if there
    /// is one, else the first already-accumulated resolved guess. This lets
    /// `@x = @y` work without constraining assignment order.
    fn guess_instance_var(&mut self, name: &str) -> Option<Ty> {
        let explicit = self
            .inputs
            .explicit_ivars
            .get(&self.owner)
            .and_then(|vars| vars.get(name))
            .map(|decl| decl.type_expr);
        if let Some(te) = explicit {
            return self.lookup_var_type(te);
        }
        self.result
            .instance_vars
            .get(&self.owner)
            .and_then(|vars| vars.get(name))
            .and_then(|info| info.first_resolved())
            .cloned()
    }

    // -- Constant paths ------------------------------------------------------

    fn guess_path_expr(
        &mut self,
        names: &[smol_str::SmolStr],
        global: bool,
    ) -> Result<Option<Ty>, GuessError> {
        match resolve_path(self.registry, self.owner, names, global) {
            Some(Resolution::Type(ty)) => Ok(Some(ty.metaclass())),
            Some(Resolution::Const(id)) => {
                let const_def = self.registry.const_def(id);
                if let Some(enum_parent) = const_def.enum_parent {
                    return Ok(Some(self.registry.ty_for(enum_parent)));
                }
                if self.consts_being_resolved.contains(&id) {
                    return Ok(None);
                }
                let Some(value) = const_def.value else {
                    return Ok(None);
                };
                self.consts_being_resolved.push(id);
                let guessed = self.guess_type(value);
                self.consts_being_resolved.pop();
                guessed
            }
            None => Ok(None),
        }
    }

    // -- Calls ---------------------------------------------------------------

    pub(crate) fn resolve_receiver(&self, receiver: ExprId) -> Option<Resolution> {
        match &self.module[receiver] {
            Expr::Path { names, global } => {
                resolve_path(self.registry, self.owner, names, *global)
            }
            Expr::Generic(te) => resolve(self.registry, self.module, self.owner, *te, false),
            _ => None,
        }
    }

    pub(crate) fn guess_call(&mut self, call: &Call) -> Result<Option<Ty>, GuessError> {
        let Some(receiver) = call.receiver else {
            // Unqualified `new` constructs the current owner, when the
            // owner is something constructible.
            if call.name == "new" {
                let def = self.registry.def(self.owner);
                let constructible = matches!(def.kind, DefKind::Primitive(_))
                    || (matches!(def.kind, DefKind::Class { .. }) && !def.is_generic());
                if constructible {
                    let owner_ty = self.registry.virtual_ty(self.owner);
                    if let Some(annotated) = self.guess_from_method(&owner_ty, call)? {
                        return Ok(Some(annotated));
                    }
                    return Ok(Some(owner_ty));
                }
            }
            return Ok(None);
        };

        let resolution = self.resolve_receiver(receiver);

        // Foreign-library calls: the declared return type (or external
        // variable type). `out` arguments attribute to instance variables
        // whether or not the call result is used anywhere.
        if let Some(Resolution::Type(Ty::Class(id))) = &resolution {
            if matches!(self.registry.def(*id).kind, DefKind::Lib) {
                return self.guess_lib_call(*id, call);
            }
        }

        let Some(Resolution::Type(receiver_ty)) = resolution else {
            return Ok(None);
        };

        // `Pointer(T).malloc` / `Pointer(T).null` yield the pointer type.
        if (call.name == "malloc" || call.name == "null")
            && self.registry.pointer_elem(&receiver_ty).is_some()
        {
            return Ok(Some(receiver_ty));
        }

        // `Pointer.malloc(size, value)` takes the element from the value.
        if call.name == "malloc"
            && call.args.len() == 2
            && receiver_ty == Ty::Class(self.registry.pointer_class())
        {
            let elem = self.guess_type(call.args[1])?;
            return Ok(elem.map(|ty| self.registry.pointer_of(ty)));
        }

        if call.name == "new" {
            let Some(receiver_ty) = self.admit_var_type(receiver_ty, NodeRef::Expr(receiver))
            else {
                return Ok(None);
            };
            if let Some(annotated) = self.guess_from_method(&receiver_ty, call)? {
                return Ok(Some(annotated));
            }
            return Ok(Some(receiver_ty));
        }

        self.guess_from_method(&receiver_ty, call)
    }

    fn guess_lib_call(&mut self, lib: ClassId, call: &Call) -> Result<Option<Ty>, GuessError> {
        self.attribute_lib_out_args(lib, call)?;
        let def = self.registry.def(lib);
        if let Some(fun) = def.lib_funs.get(&call.name) {
            return Ok(Some(fun.ret.clone()));
        }
        if call.args.is_empty() && !call.has_block {
            if let Some(ty) = def.lib_externals.get(&call.name) {
                return Ok(Some(ty.clone()));
            }
        }
        Ok(None)
    }

    // -- Guessing from method definitions ------------------------------------

    /// Find the metaclass definitions a call could reach and derive a type
    /// from them: a return annotation all candidates agree on, or — for a
    /// single candidate — the merge of its body's returns and final value.
    fn guess_from_method(&mut self, owner_ty: &Ty, call: &Call) -> Result<Option<Ty>, GuessError> {
        let registry = self.registry;
        let class = match owner_ty {
            Ty::Class(id) | Ty::Virtual(id) => *id,
            Ty::Instance { class, .. } => *class,
            Ty::Primitive(prim) => match registry.class_for_primitive(*prim) {
                Some(id) => id,
                None => return Ok(None),
            },
            _ => return Ok(None),
        };

        let argc = call.args.len();
        let mut candidates: Vec<(ClassId, &MethodSig)> = registry
            .class_methods_named(class, &call.name)
            .into_iter()
            .filter(|(_, sig)| {
                sig.accepts_block == call.has_block
                    && sig.min_args <= argc
                    && argc <= sig.max_args
            })
            .collect();
        if candidates.is_empty() {
            return Ok(None);
        }

        // Zero-arg `new` keeps only the first candidate, so inherited
        // constructors defer to the most-derived definition. Downstream
        // unification corrects the occasional wrong pick.
        if call.name == "new" && argc == 0 && !call.has_block {
            candidates.truncate(1);
        }

        let annotated: Vec<(ClassId, TypeExprId)> = candidates
            .iter()
            .filter_map(|(owner, sig)| sig.return_type.map(|te| (*owner, te)))
            .collect();
        if annotated.len() == candidates.len() {
            let mut agreed: Option<Ty> = None;
            let mut settled = true;
            for (sig_owner, te) in annotated {
                // An annotation that fails to resolve doesn't settle the
                // type; body inference below is the remaining shot.
                let Some(ty) = self.lookup_var_type_in(sig_owner, te) else {
                    settled = false;
                    break;
                };
                match &agreed {
                    None => agreed = Some(ty),
                    Some(previous) if *previous == ty => {}
                    Some(_) => {
                        settled = false;
                        break;
                    }
                }
            }
            if settled {
                return Ok(agreed);
            }
        }

        if candidates.len() != 1 {
            return Ok(None);
        }
        let (sig_owner, sig) = candidates[0];
        let Some(def_id) = sig.def else {
            return Ok(None);
        };
        if self.methods_being_checked.contains(&def_id) {
            return Ok(None);
        }

        // Body inference runs in the candidate's own scope: annotations and
        // argument restrictions inside the body resolve against its owner.
        self.methods_being_checked.push(def_id);
        let saved_owner = self.owner;
        let saved_def = self.current_def;
        self.owner = sig_owner;
        self.current_def = Some(def_id);

        let body = self.module[def_id].body;
        let mut parts = Vec::new();
        let mut failure = None;
        for ret in scan::gather_returns(self.module, body) {
            let guessed = match ret {
                Some(value) => self.guess_type(value),
                None => Ok(Some(Ty::NIL)),
            };
            match guessed {
                Ok(Some(ty)) => parts.push(ty),
                Ok(None) => {}
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        if failure.is_none() {
            match self.guess_type(body) {
                Ok(Some(ty)) => parts.push(ty),
                Ok(None) => {}
                Err(err) => failure = Some(err),
            }
        }

        self.owner = saved_owner;
        self.current_def = saved_def;
        self.methods_being_checked.pop();

        match failure {
            Some(err) => Err(err),
            None => Ok(Ty::merge(parts)),
        }
    }
}

/// Merge of two optional branches: one side alone is enough.
fn merge_opt(lhs: Option<Ty>, rhs: Option<Ty>) -> Option<Ty> {
    match (lhs, rhs) {
        (Some(lhs), Some(rhs)) => Ty::merge([lhs, rhs]),
        (lhs, rhs) => lhs.or(rhs),
    }
}
