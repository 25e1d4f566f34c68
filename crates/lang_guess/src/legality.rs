// ==============================================================================
// Variable-type legality
// ==============================================================================
//
// Every resolution of a name to a type funnels through here. Types that may
// not be stored in a variable (uninstantiated generics, abstract hierarchy
// roots) are swapped for `None` and flagged in the one-shot error slot;
// concrete classes come back virtualized.

use lang_ast::{ClassId, NodeRef, TypeExprId};
use lang_ty::{resolve, DefKind, Resolution, Ty};

use crate::{DisallowedType, GuessCtx};

impl GuessCtx<'_> {
    /// Resolve a type expression in the current owner's scope, filtered
    /// through the legality rules.
    pub(crate) fn lookup_var_type(&mut self, te: TypeExprId) -> Option<Ty> {
        self.lookup_var_type_in(self.owner, te)
    }

    /// Same, with an explicit scope — used for return-type annotations,
    /// which resolve where the method was defined.
    pub(crate) fn lookup_var_type_in(&mut self, scope: ClassId, te: TypeExprId) -> Option<Ty> {
        match resolve(self.registry, self.module, scope, te, false)? {
            Resolution::Type(ty) => self.admit_var_type(ty, NodeRef::Type(te)),
            Resolution::Const(_) => None,
        }
    }

    pub(crate) fn admit_var_type(&mut self, ty: Ty, node: NodeRef) -> Option<Ty> {
        let Ty::Class(id) = ty else {
            return Some(ty);
        };
        let def = self.registry.def(id);
        if def.is_generic() || def.root_restricted {
            self.flag_disallowed(node, Ty::Class(id));
            return None;
        }
        match def.kind {
            DefKind::Class { .. } => Some(self.registry.virtual_ty(id)),
            _ => Some(Ty::Class(id)),
        }
    }

    fn flag_disallowed(&mut self, node: NodeRef, ty: Ty) {
        if self.error.is_none() {
            self.error = Some(DisallowedType { node, ty });
        }
    }
}
