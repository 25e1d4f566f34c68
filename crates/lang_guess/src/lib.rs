mod diagnostic;
mod guess_expr;
mod legality;
mod type_vars;
mod visitor;


#[cfg(test)]
mod pbt;

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use thiserror::Error;

use lang_ast::{ClassId, DefId, ExprId, Module, NodeRef, TypeExprId};
use lang_ty::{ConstId, Ty, TypeRegistry};

pub use diagnostic::DisallowedType;

/// Guess a type for every global, class and instance variable assigned
/// anywhere in `module`, from the syntactic forms alone. Runs before full
/// semantic analysis: the only hard failure is an instance-variable
/// assignment under an owner that cannot have them; everything else either
/// contributes a candidate type or contributes nothing.
pub fn guess_module(
    module: &Module,
    registry: &TypeRegistry,
    inputs: GuessInputs,
) -> Result<GuessResult, GuessError> {
    tracing::debug!("guessing variable types");
    let mut ctx = GuessCtx::new(module, registry, inputs);
    ctx.visit(module.entry_expr)?;
    Ok(ctx.result)
}

/// Facts established by earlier passes that gate guessing: explicitly
/// declared instance variables suppress guesses for the same name, and
/// already-typed globals/class vars are reused rather than re-guessed.
#[derive(Debug, Clone, Default)]
pub struct GuessInputs {
    pub explicit_ivars: FxHashMap<ClassId, FxHashMap<SmolStr, ExplicitDecl>>,
    pub typed_globals: FxHashMap<SmolStr, Ty>,
    pub typed_class_vars: FxHashMap<ClassId, FxHashMap<SmolStr, Ty>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExplicitDecl {
    pub type_expr: TypeExprId,
    pub location: NodeRef,
}

/// Everything the pass produces. Map iteration follows first-sighting
/// order, so downstream diagnostics are stable across runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GuessResult {
    pub globals: IndexMap<SmolStr, TypeInfo>,
    pub class_vars: IndexMap<ClassId, IndexMap<SmolStr, TypeInfo>>,
    pub instance_vars: IndexMap<ClassId, IndexMap<SmolStr, InstanceVarTypeInfo>>,
    /// Instance variables assigned outside any method body, per owner.
    pub outside_vars: IndexMap<ClassId, IndexSet<SmolStr>>,
    /// One entry per `initialize` definition, in definition order.
    pub initialize_infos: IndexMap<ClassId, Vec<InitializeInfo>>,
    /// First disallowed-variable-type error per (owner, name).
    pub errors: IndexMap<ClassId, IndexMap<SmolStr, DisallowedType>>,
}

/// Accumulated guess for a global or class variable. `ty` widens by merge
/// as more assignment sites are seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub ty: Ty,
    pub first_location: NodeRef,
    pub outside_def: bool,
}

/// Accumulated guesses for an instance variable. Under a generic owner the
/// candidates may stay as unresolved type expressions, to be re-resolved
/// once the owner is instantiated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceVarTypeInfo {
    pub location: NodeRef,
    pub type_vars: Vec<TypeCandidate>,
    pub outside_def: bool,
}

impl InstanceVarTypeInfo {
    /// The first candidate, when it is already a resolved type.
    pub fn first_resolved(&self) -> Option<&Ty> {
        match self.type_vars.first() {
            Some(TypeCandidate::Resolved(ty)) => Some(ty),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeCandidate {
    /// A concrete type, resolved at the assignment site.
    Resolved(Ty),
    /// A type expression kept unresolved for per-instantiation resolution.
    Node(TypeExprId),
    /// An `of`-clause container fabricated from a well-known generic class
    /// and the element nodes of the literal, e.g. `Array(T)` from `[] of T`.
    OfGeneric {
        class: ClassId,
        args: Box<[TypeExprId]>,
    },
}

/// Which instance variables one `initialize` definition assigns before any
/// expression mentioning `self` runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializeInfo {
    pub def: DefId,
    pub instance_vars: IndexSet<SmolStr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuessError {
    #[error("can't declare instance variables in {owner}")]
    InstanceVarsForbidden {
        owner: SmolStr,
        name: SmolStr,
        at: ExprId,
    },
}

/// The traversal state. Owner, outside-def flag and the in-flight
/// initialize info are saved and restored at every scope boundary; the two
/// stacks break resolution cycles through constants and method bodies.
pub(crate) struct GuessCtx<'db> {
    module: &'db Module,
    registry: &'db TypeRegistry,
    inputs: GuessInputs,
    result: GuessResult,

    /// The lexically enclosing type; the program root at top level.
    owner: ClassId,
    /// True while not inside any method body.
    outside_def: bool,
    /// Set once `self` has been seen in the current method body.
    found_self: bool,
    /// The initialize info being built, while inside an `initialize` body.
    current_init: Option<InitializeInfo>,
    /// The def whose formal arguments are in scope for variable guessing.
    current_def: Option<DefId>,

    methods_being_checked: Vec<DefId>,
    consts_being_resolved: Vec<ConstId>,

    /// One-shot slot: a single assignment's chain of resolutions surfaces
    /// at most one disallowed-type error. Cleared at each assignment.
    error: Option<DisallowedType>,
}

impl<'db> GuessCtx<'db> {
    pub(crate) fn new(
        module: &'db Module,
        registry: &'db TypeRegistry,
        inputs: GuessInputs,
    ) -> Self {
        Self {
            module,
            registry,
            inputs,
            result: GuessResult::default(),
            owner: registry.program(),
            outside_def: true,
            found_self: false,
            current_init: None,
            current_def: None,
            methods_being_checked: Vec::new(),
            consts_being_resolved: Vec::new(),
            error: None,
        }
    }

    fn add_type_info(
        map: &mut IndexMap<SmolStr, TypeInfo>,
        name: &SmolStr,
        ty: Ty,
        node: NodeRef,
        outside_def: bool,
    ) {
        match map.get_mut(name) {
            Some(info) => {
                info.ty = Ty::merge([ty, info.ty.clone()]).expect("merging two types");
                info.outside_def |= outside_def;
            }
            None => {
                map.insert(
                    name.clone(),
                    TypeInfo {
                        ty,
                        first_location: node,
                        outside_def,
                    },
                );
            }
        }
    }

    fn add_instance_var_candidate(
        &mut self,
        owner: ClassId,
        name: &SmolStr,
        candidate: TypeCandidate,
        node: NodeRef,
    ) {
        let outside_def = self.outside_def;
        let map = self.result.instance_vars.entry(owner).or_default();
        match map.get_mut(name) {
            Some(info) => {
                info.type_vars.push(candidate);
                info.outside_def |= outside_def;
            }
            None => {
                map.insert(
                    name.clone(),
                    InstanceVarTypeInfo {
                        location: node,
                        type_vars: vec![candidate],
                        outside_def,
                    },
                );
            }
        }
    }

    /// Marks `name` definitely assigned in the current initializer, unless
    /// `self` already escaped earlier in the body.
    fn note_initializer_assignment(&mut self, name: &SmolStr) {
        if self.found_self {
            return;
        }
        if let Some(info) = &mut self.current_init {
            info.instance_vars.insert(name.clone());
        }
    }
}
