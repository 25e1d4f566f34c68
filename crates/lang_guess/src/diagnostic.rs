use lang_ast::NodeRef;
use lang_ty::{Ty, TypeRegistry};

/// A type that surfaced where a variable type was needed but may not be
/// one: an uninstantiated generic, or one of the abstract hierarchy roots.
/// Recorded per (owner, variable), first offending site wins; rendering
/// happens downstream with the node's source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisallowedType {
    pub node: NodeRef,
    pub ty: Ty,
}

impl DisallowedType {
    pub fn message(&self, registry: &TypeRegistry) -> String {
        format!(
            "can't use {} as a variable type, use a more specific type",
            self.ty.display(registry)
        )
    }
}
