// ==============================================================================
// Attribution visitor
// ==============================================================================
//
// Pre-order traversal that routes every assignment to the right bucket:
// globals, class variables keyed by their owning class, instance variables
// keyed by the lexically enclosing type. Owner, outside-def flag and the
// in-flight initialize info are saved and restored at every class/def
// boundary so nested definitions never corrupt the outer context.

use indexmap::IndexSet;
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;
use tracing::trace;

use lang_ast::{scan, Call, ClassId, DefId, Expr, ExprId, NodeRef, TypeExprId};
use lang_ty::{resolve_path, DefKind, Resolution, Ty};

use crate::{GuessCtx, GuessError, InitializeInfo, TypeCandidate};

impl GuessCtx<'_> {
    pub(crate) fn visit(&mut self, e: ExprId) -> Result<(), GuessError> {
        let module = self.module;
        match &module[e] {
            Expr::ClassDef { class, body }
            | Expr::ModuleDef { class, body }
            | Expr::EnumDef { class, body } => self.visit_type_body(*class, *body),

            // Lib bodies only declare foreign functions; their signatures
            // already live in the type table.
            Expr::LibDef { .. } => Ok(()),

            Expr::Def(def_id) => self.visit_def(*def_id),

            Expr::Expressions(items) => self.visit_body(items),

            Expr::Assign { target, value } => {
                self.process_assign(*target, *value)?;
                Ok(())
            }
            Expr::MultiAssign { targets, values } => self.process_multi_assign(targets, values),

            Expr::TypeDeclaration {
                target,
                value: Some(value),
                ..
            } => {
                self.process_assign(*target, *value)?;
                Ok(())
            }
            // A value-less declaration or an `uninitialized` assignment both
            // contribute the declared type.
            Expr::TypeDeclaration {
                target,
                ty,
                value: None,
            }
            | Expr::UninitializedVar { target, ty } => self.process_declared(*target, *ty),

            Expr::Call(call) => self.visit_call(e, call),

            Expr::Var(name) if name == "self" => {
                self.found_self = true;
                Ok(())
            }

            // Macro-expanded code only contributes top-level declarations.
            Expr::MacroInvocation { expanded } => {
                if self.outside_def {
                    if let Some(expansion) = *expanded {
                        return self.visit(expansion);
                    }
                }
                Ok(())
            }

            _ => self.visit_children(e),
        }
    }

    fn visit_children(&mut self, e: ExprId) -> Result<(), GuessError> {
        let mut children = Vec::new();
        self.module[e].walk_child_exprs(|child| children.push(child));
        for child in children {
            self.visit(child)?;
        }
        Ok(())
    }

    /// Visit the statements of a body, skipping defs shadowed by a later
    /// redefinition that does not reach back via `previous_def`. Same-name
    /// defs with different signatures are overloads, not redefinitions.
    fn visit_body(&mut self, items: &[ExprId]) -> Result<(), GuessError> {
        let module = self.module;
        let mut defs_by_sig: FxHashMap<(&SmolStr, usize, Option<usize>, bool), Vec<DefId>> =
            FxHashMap::default();
        for &item in items {
            if let Expr::Def(def_id) = &module[item] {
                let def = &module[*def_id];
                let sig = (
                    &def.name,
                    def.args.len(),
                    def.splat_index,
                    def.block_arg.is_some(),
                );
                defs_by_sig.entry(sig).or_default().push(*def_id);
            }
        }
        let mut shadowed: FxHashSet<DefId> = FxHashSet::default();
        for defs in defs_by_sig.values() {
            for (i, &def_id) in defs.iter().enumerate() {
                let reachable = defs[i + 1..]
                    .iter()
                    .all(|&later| module[later].calls_previous_def);
                if !reachable {
                    shadowed.insert(def_id);
                }
            }
        }

        for &item in items {
            if let Expr::Def(def_id) = &module[item] {
                if shadowed.contains(def_id) {
                    continue;
                }
            }
            self.visit(item)?;
        }
        Ok(())
    }

    fn visit_type_body(&mut self, class: ClassId, body: ExprId) -> Result<(), GuessError> {
        trace!(class = ?class, "entering type body");
        self.result.initialize_infos.entry(class).or_default();

        let saved_owner = self.owner;
        let saved_outside = self.outside_def;
        let saved_init = self.current_init.take();
        self.owner = class;
        self.outside_def = true;

        let visited = self.visit(body);

        self.owner = saved_owner;
        self.outside_def = saved_outside;
        self.current_init = saved_init;
        visited
    }

    fn visit_def(&mut self, def_id: DefId) -> Result<(), GuessError> {
        let def = &self.module[def_id];
        trace!(name = %def.name, "entering def");

        let saved_self = self.found_self;
        let saved_def = self.current_def;
        let saved_init = self.current_init.take();
        let saved_outside = self.outside_def;

        self.found_self = false;
        self.current_def = Some(def_id);
        self.current_init = (def.is_initializer() && self.owner != self.registry.program())
            .then(|| InitializeInfo {
                def: def_id,
                instance_vars: IndexSet::new(),
            });
        self.outside_def = false;

        let visited = self.visit(def.body);

        if let Some(info) = self.current_init.take() {
            self.result
                .initialize_infos
                .entry(self.owner)
                .or_default()
                .push(info);
        }
        self.found_self = saved_self;
        self.current_def = saved_def;
        self.current_init = saved_init;
        self.outside_def = saved_outside;
        visited
    }

    fn visit_call(&mut self, e: ExprId, call: &Call) -> Result<(), GuessError> {
        if self.outside_def {
            // Top-level calls may be macro invocations the parser already
            // expanded against the right scope; the expansion replaces the
            // call for this pass.
            if let Some(expansion) = call.expansion {
                return self.visit(expansion);
            }
            return self.visit_children(e);
        }

        // Inside a method body the call itself only matters for the
        // `LibX.fn(out @var)` idiom; arguments and block still get walked
        // for `self` sightings and nested assignments. The expansion is
        // not: macro output only counts at the top level.
        if let Some(receiver) = call.receiver {
            if let Expr::Path { names, global } = &self.module[receiver] {
                if let Some(Resolution::Type(Ty::Class(id))) =
                    resolve_path(self.registry, self.owner, names, *global)
                {
                    if matches!(self.registry.def(id).kind, DefKind::Lib) {
                        self.attribute_lib_out_args(id, call)?;
                    }
                }
            }
            self.visit(receiver)?;
        }
        for &arg in call.args.iter() {
            self.visit(arg)?;
        }
        if let Some(block_body) = call.block_body {
            self.visit(block_body)?;
        }
        Ok(())
    }

    // -- Assignment routing --------------------------------------------------

    /// Route `target = value`. Returns the guessed type so a nested assign
    /// can contribute to its parent (`@a = @b = 1`).
    pub(crate) fn process_assign(
        &mut self,
        target: ExprId,
        value: ExprId,
    ) -> Result<Option<Ty>, GuessError> {
        let module = self.module;
        if scan::mentions_self(module, value) {
            self.found_self = true;
        }
        self.error = None;

        let mut error_key: Option<(ClassId, SmolStr)> = None;
        let guessed = match &module[target] {
            Expr::Global(name) => {
                error_key = Some((self.owner, name.clone()));
                if let Some(ty) = self.inputs.typed_globals.get(name).cloned() {
                    // Already typed in the symbol table: reuse, don't guess.
                    Some(ty)
                } else if let Some(ty) = self.guess_type(value)? {
                    Self::add_type_info(
                        &mut self.result.globals,
                        name,
                        ty.clone(),
                        NodeRef::Expr(target),
                        self.outside_def,
                    );
                    Some(ty)
                } else {
                    None
                }
            }

            Expr::ClassVar(name) => match self.class_var_owner() {
                Some(cv_owner) => {
                    error_key = Some((cv_owner, name.clone()));
                    let already = self
                        .inputs
                        .typed_class_vars
                        .get(&cv_owner)
                        .and_then(|vars| vars.get(name))
                        .cloned();
                    if let Some(ty) = already {
                        Some(ty)
                    } else if let Some(ty) = self.guess_type(value)? {
                        let outside_def = self.outside_def;
                        let map = self.result.class_vars.entry(cv_owner).or_default();
                        Self::add_type_info(map, name, ty.clone(), NodeRef::Expr(target), outside_def);
                        Some(ty)
                    } else {
                        None
                    }
                }
                None => None,
            },

            Expr::InstanceVar(name) => {
                let name = name.clone();
                error_key = Some((self.owner, name.clone()));
                self.process_assign_ivar(target, &name, value)?
            }

            // Constants have their own typing rules.
            Expr::Path { .. } => None,

            // Local variables and the rest: only chase nested assignments.
            _ => {
                self.visit(value)?;
                None
            }
        };

        self.drain_error(error_key);
        Ok(guessed)
    }

    fn process_assign_ivar(
        &mut self,
        target: ExprId,
        name: &SmolStr,
        value: ExprId,
    ) -> Result<Option<Ty>, GuessError> {
        let owner = self.owner;
        if !self.check_ivar_owner(owner, name, target)? {
            return Ok(None);
        }

        if self.outside_def {
            self.result
                .outside_vars
                .entry(owner)
                .or_default()
                .insert(name.clone());
        }

        let mut guessed = None;
        if self.has_explicit_ivar(owner, name) {
            // The declared type wins; still chase nested assignments.
            self.visit(value)?;
        } else if self.registry.is_generic(owner) {
            if let Some(candidates) = self.guess_type_vars(value)? {
                for candidate in candidates {
                    self.add_instance_var_candidate(owner, name, candidate, NodeRef::Expr(target));
                }
            }
        } else if let Some(ty) = self.guess_type(value)? {
            self.add_instance_var_candidate(
                owner,
                name,
                TypeCandidate::Resolved(ty.clone()),
                NodeRef::Expr(target),
            );
            guessed = Some(ty);
        }

        self.note_initializer_assignment(name);
        Ok(guessed)
    }

    /// A declaration with no value: the declared type is the guess,
    /// resolved for a concrete owner, kept as a node for a generic one.
    fn process_declared(&mut self, target: ExprId, te: TypeExprId) -> Result<(), GuessError> {
        let module = self.module;
        let Expr::InstanceVar(name) = &module[target] else {
            return Ok(());
        };
        let name = name.clone();
        self.error = None;

        let owner = self.owner;
        if !self.check_ivar_owner(owner, &name, target)? {
            return Ok(());
        }

        if self.outside_def {
            self.result
                .outside_vars
                .entry(owner)
                .or_default()
                .insert(name.clone());
        }

        if !self.has_explicit_ivar(owner, &name) {
            if self.registry.is_generic(owner) {
                // Resolve once so an illegal type is flagged; keep the node
                // when it is merely unresolvable in the uninstantiated scope
                // (a type parameter, say).
                let resolved = self.lookup_var_type(te);
                if resolved.is_some() || self.error.is_none() {
                    self.add_instance_var_candidate(
                        owner,
                        &name,
                        TypeCandidate::Node(te),
                        NodeRef::Type(te),
                    );
                }
            } else if let Some(ty) = self.lookup_var_type(te) {
                self.add_instance_var_candidate(
                    owner,
                    &name,
                    TypeCandidate::Resolved(ty),
                    NodeRef::Type(te),
                );
            }
        }

        self.note_initializer_assignment(&name);
        self.drain_error(Some((owner, name)));
        Ok(())
    }

    pub(crate) fn process_multi_assign(
        &mut self,
        targets: &[ExprId],
        values: &[ExprId],
    ) -> Result<(), GuessError> {
        let module = self.module;
        if targets.len() == values.len() {
            for (&target, &value) in targets.iter().zip(values.iter()) {
                self.process_assign(target, value)?;
            }
            return Ok(());
        }

        // Unequal arity: self escapes and definite-assignment marks still
        // apply even when no type can be distributed.
        for &value in values {
            if scan::mentions_self(module, value) {
                self.found_self = true;
            }
        }
        for &target in targets {
            if let Expr::InstanceVar(name) = &module[target] {
                let name = name.clone();
                self.note_initializer_assignment(&name);
            }
        }

        // A single tuple-typed source spreads element-wise onto the targets.
        if let [value] = values {
            if let Some(Ty::Tuple(elems)) = self.guess_type(*value)? {
                if elems.len() >= targets.len() {
                    for (&target, elem) in targets.iter().zip(elems.iter()) {
                        self.attribute_known(target, elem.clone().into_ty())?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Attribute an already-known type to an assignment target, honoring
    /// the explicit/already-typed suppressions. Used by tuple distribution
    /// and by foreign `out` parameters.
    fn attribute_known(&mut self, target: ExprId, ty: Ty) -> Result<(), GuessError> {
        let module = self.module;
        match &module[target] {
            Expr::Global(name) => {
                if !self.inputs.typed_globals.contains_key(name) {
                    Self::add_type_info(
                        &mut self.result.globals,
                        name,
                        ty,
                        NodeRef::Expr(target),
                        self.outside_def,
                    );
                }
            }
            Expr::ClassVar(name) => {
                if let Some(cv_owner) = self.class_var_owner() {
                    let already = self
                        .inputs
                        .typed_class_vars
                        .get(&cv_owner)
                        .is_some_and(|vars| vars.contains_key(name));
                    if !already {
                        let outside_def = self.outside_def;
                        let map = self.result.class_vars.entry(cv_owner).or_default();
                        Self::add_type_info(map, name, ty, NodeRef::Expr(target), outside_def);
                    }
                }
            }
            Expr::InstanceVar(name) => {
                let name = name.clone();
                self.attribute_ivar_known(&name, ty, target)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn attribute_ivar_known(
        &mut self,
        name: &SmolStr,
        ty: Ty,
        target: ExprId,
    ) -> Result<(), GuessError> {
        let owner = self.owner;
        if !self.check_ivar_owner(owner, name, target)? {
            return Ok(());
        }
        if self.outside_def {
            self.result
                .outside_vars
                .entry(owner)
                .or_default()
                .insert(name.clone());
        }
        if !self.has_explicit_ivar(owner, name) {
            self.add_instance_var_candidate(
                owner,
                name,
                TypeCandidate::Resolved(ty),
                NodeRef::Expr(target),
            );
        }
        self.note_initializer_assignment(name);
        Ok(())
    }

    /// For each `out @var` argument of a foreign call, the pointed-to
    /// element type of the parameter attributes to the instance variable
    /// exactly as an assignment would.
    pub(crate) fn attribute_lib_out_args(
        &mut self,
        lib: ClassId,
        call: &Call,
    ) -> Result<(), GuessError> {
        let registry = self.registry;
        let module = self.module;
        let Some(fun) = registry.def(lib).lib_funs.get(&call.name) else {
            return Ok(());
        };
        for (i, &arg) in call.args.iter().enumerate() {
            let Expr::Out(inner) = &module[arg] else {
                continue;
            };
            let Expr::InstanceVar(name) = &module[*inner] else {
                continue;
            };
            let Some(param_ty) = fun.params.get(i) else {
                continue;
            };
            let Some(elem) = registry.pointer_elem(param_ty) else {
                continue;
            };
            let name = name.clone();
            self.attribute_ivar_known(&name, elem, *inner)?;
        }
        Ok(())
    }

    // -- Shared owner checks -------------------------------------------------

    /// False: silently ignore (the top-level program and file modules have
    /// no instance variables). Error: the owner's kind forbids them.
    fn check_ivar_owner(
        &self,
        owner: ClassId,
        name: &SmolStr,
        at: ExprId,
    ) -> Result<bool, GuessError> {
        match self.registry.def(owner).kind {
            DefKind::Program | DefKind::FileModule => Ok(false),
            DefKind::Class { .. } | DefKind::Module => Ok(true),
            DefKind::Enum | DefKind::Lib | DefKind::Primitive(_) => {
                Err(GuessError::InstanceVarsForbidden {
                    owner: self.registry.def(owner).name.clone(),
                    name: name.clone(),
                    at,
                })
            }
        }
    }

    /// The class-var owner is the first class/module/enum up the lexical
    /// chain; reaching the program root means there is none.
    fn class_var_owner(&self) -> Option<ClassId> {
        let mut current = Some(self.owner);
        while let Some(id) = current {
            match self.registry.def(id).kind {
                DefKind::Class { .. } | DefKind::Module | DefKind::Enum => return Some(id),
                DefKind::Program | DefKind::FileModule => return None,
                _ => current = self.registry.def(id).parent,
            }
        }
        None
    }

    fn has_explicit_ivar(&self, owner: ClassId, name: &SmolStr) -> bool {
        self.inputs
            .explicit_ivars
            .get(&owner)
            .is_some_and(|vars| vars.contains_key(name))
    }

    fn drain_error(&mut self, key: Option<(ClassId, SmolStr)>) {
        if let (Some(error), Some((owner, name))) = (self.error.take(), key) {
            self.result
                .errors
                .entry(owner)
                .or_default()
                .entry(name)
                .or_insert(error);
        }
    }
}
