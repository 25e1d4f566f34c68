// ==============================================================================
// Name resolution oracle
// ==============================================================================
//
// Resolves a type expression against the registry from a lexical scope.
// A miss is `None`, never an error: callers decide whether an unresolved
// name matters. Legality filtering (what may appear as a variable type)
// is the caller's concern, not the resolver's.

use lang_ast::{ClassId, Module, TypeExpr, TypeExprId};
use smol_str::SmolStr;

use crate::{Member, Ty, TyRef, TypeRegistry};

/// The two things a path can denote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Type(Ty),
    Const(crate::ConstId),
}

/// Resolve a type expression in `scope`. `allow_typeof` admits `typeof(...)`
/// expressions; the oracle itself never evaluates them (that requires an
/// expression guesser), so a `typeof` resolves to `None` either way and
/// callers that allow it recurse into the inner expressions themselves.
pub fn resolve(
    registry: &TypeRegistry,
    module: &Module,
    scope: ClassId,
    te: TypeExprId,
    allow_typeof: bool,
) -> Option<Resolution> {
    match &module[te] {
        TypeExpr::Path { names, global } => resolve_path(registry, scope, names, *global),
        TypeExpr::Generic { base, args } => {
            let base = resolve(registry, module, scope, *base, allow_typeof)?;
            let Resolution::Type(Ty::Class(class)) = base else {
                return None;
            };
            let params = &registry.def(class).type_params;
            if params.is_empty() || params.len() != args.len() {
                return None;
            }
            let mut resolved: Vec<TyRef> = Vec::with_capacity(args.len());
            for &arg in args.iter() {
                match resolve(registry, module, scope, arg, allow_typeof)? {
                    Resolution::Type(ty) => resolved.push(ty.into()),
                    Resolution::Const(_) => return None,
                }
            }
            Some(Resolution::Type(Ty::Instance {
                class,
                args: resolved.into(),
            }))
        }
        TypeExpr::Union(parts) => {
            let mut tys = Vec::with_capacity(parts.len());
            for &part in parts.iter() {
                match resolve(registry, module, scope, part, allow_typeof)? {
                    Resolution::Type(ty) => tys.push(ty),
                    Resolution::Const(_) => return None,
                }
            }
            Ty::merge(tys).map(Resolution::Type)
        }
        TypeExpr::Proc { inputs, output } => {
            let mut params = Vec::with_capacity(inputs.len());
            for &input in inputs.iter() {
                match resolve(registry, module, scope, input, allow_typeof)? {
                    Resolution::Type(ty) => params.push(ty),
                    Resolution::Const(_) => return None,
                }
            }
            let ret = match output {
                Some(out) => match resolve(registry, module, scope, *out, allow_typeof)? {
                    Resolution::Type(ty) => ty,
                    Resolution::Const(_) => return None,
                },
                None => Ty::VOID,
            };
            Some(Resolution::Type(Ty::proc_of(params, ret)))
        }
        TypeExpr::SelfType => Some(Resolution::Type(registry.ty_for(scope))),
        TypeExpr::Underscore => None,
        TypeExpr::Typeof(_) => None,
        TypeExpr::Metaclass(inner) => {
            match resolve(registry, module, scope, *inner, allow_typeof)? {
                Resolution::Type(ty) => Some(Resolution::Type(ty.metaclass())),
                Resolution::Const(_) => None,
            }
        }
    }
}

/// Resolve a bare constant path. The head name is looked up lexically
/// (climbing enclosing namespaces); the rest walk members of the result.
pub fn resolve_path(
    registry: &TypeRegistry,
    scope: ClassId,
    names: &[SmolStr],
    global: bool,
) -> Option<Resolution> {
    let (first, rest) = names.split_first()?;
    let mut current = if global {
        registry.lookup_member(registry.program(), first)?
    } else {
        lookup_lexical(registry, scope, first)?
    };
    for name in rest {
        let Member::Type(id) = current else {
            return None;
        };
        current = registry.lookup_member(id, name)?;
    }
    Some(match current {
        Member::Type(id) => Resolution::Type(registry.ty_for(id)),
        Member::Const(id) => Resolution::Const(id),
    })
}

fn lookup_lexical(registry: &TypeRegistry, scope: ClassId, name: &str) -> Option<Member> {
    let mut current = Some(scope);
    while let Some(id) = current {
        if let Some(member) = registry.lookup_member(id, name) {
            return Some(member);
        }
        current = registry.def(id).parent;
    }
    None
}
