mod display;
mod registry;
mod resolve;

#[cfg(test)]
mod tests;

use std::collections::BTreeSet;
use std::sync::Arc;

use derive_more::Debug;
use smol_str::SmolStr;

pub use display::TyDisplay;
pub use lang_ast::ClassId;
pub use registry::{
    ConstDef, ConstId, DefKind, LibFun, Member, MethodSig, TypeDef, TypeRegistry,
};
pub use resolve::{resolve, resolve_path, Resolution};

use lang_ast::{FloatKind, IntKind, Literal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PrimitiveTy {
    Nil,
    Bool,
    Char,
    Int(IntKind),
    Float(FloatKind),
    String,
    Symbol,
    Regex,
    Void,
}

impl PrimitiveTy {
    pub fn is_number(&self) -> bool {
        matches!(self, PrimitiveTy::Int(_) | PrimitiveTy::Float(_))
    }
}

impl From<&Literal> for PrimitiveTy {
    fn from(value: &Literal) -> Self {
        match value {
            Literal::Int { kind, .. } => PrimitiveTy::Int(*kind),
            Literal::Float { kind, .. } => PrimitiveTy::Float(*kind),
            Literal::Bool(_) => PrimitiveTy::Bool,
            Literal::Char(_) => PrimitiveTy::Char,
            Literal::Str(_) => PrimitiveTy::String,
            Literal::Symbol(_) => PrimitiveTy::Symbol,
            Literal::Regex(_) => PrimitiveTy::Regex,
            Literal::Nil => PrimitiveTy::Nil,
        }
    }
}

impl From<&Literal> for Ty {
    fn from(value: &Literal) -> Self {
        Ty::Primitive(value.into())
    }
}

impl From<PrimitiveTy> for Ty {
    fn from(value: PrimitiveTy) -> Self {
        Ty::Primitive(value)
    }
}

/// Arc-shared reference to a child type. `Ty` values are immutable once
/// built, so sharing is safe and keeps unions/tuples cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[debug("{_0:?}")]
pub struct TyRef(pub Arc<Ty>);

impl From<Ty> for TyRef {
    fn from(value: Ty) -> Self {
        TyRef(Arc::new(value))
    }
}

impl TyRef {
    pub fn into_ty(self) -> Ty {
        Arc::try_unwrap(self.0).unwrap_or_else(|arc| (*arc).clone())
    }
}

impl From<TyRef> for Ty {
    fn from(value: TyRef) -> Self {
        value.into_ty()
    }
}

impl std::ops::Deref for TyRef {
    type Target = Ty;
    fn deref(&self) -> &Ty {
        &self.0
    }
}

/// The type algebra the guessing pass computes over. Named types are ids
/// into the symbol-table-owned [`TypeRegistry`]; everything structural
/// (tuples, procs, generic instances, unions) is a value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Ty {
    #[debug("{_0:?}")]
    Primitive(PrimitiveTy),
    /// A non-generic class, module or enum.
    Class(ClassId),
    /// A class together with all its descendants.
    Virtual(ClassId),
    Metaclass(TyRef),
    /// A generic class applied to type arguments, e.g. `Array(Int32)`.
    Instance {
        class: ClassId,
        args: Box<[TyRef]>,
    },
    Tuple(Box<[TyRef]>),
    NamedTuple(Box<[(SmolStr, TyRef)]>),
    Proc {
        params: Box<[TyRef]>,
        ret: TyRef,
    },
    Union(Union),
}

/// A canonical set of union members. Backed by a `BTreeSet` so the member
/// order never depends on the order merge sites were encountered.
#[derive(Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Union {
    set: BTreeSet<TyRef>,
}

impl Union {
    pub fn iter(&self) -> impl Iterator<Item = &TyRef> {
        self.set.iter()
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn contains(&self, ty: &Ty) -> bool {
        self.set.iter().any(|member| &**member == ty)
    }
}

impl FromIterator<TyRef> for Union {
    fn from_iter<T: IntoIterator<Item = TyRef>>(iter: T) -> Self {
        Self {
            set: iter.into_iter().collect(),
        }
    }
}

impl Ty {
    pub const NIL: Ty = Ty::Primitive(PrimitiveTy::Nil);
    pub const BOOL: Ty = Ty::Primitive(PrimitiveTy::Bool);
    pub const VOID: Ty = Ty::Primitive(PrimitiveTy::Void);
    pub const INT32: Ty = Ty::Primitive(PrimitiveTy::Int(IntKind::I32));
    pub const STRING: Ty = Ty::Primitive(PrimitiveTy::String);

    /// The canonical widening operator: flattens nested unions, dedups, and
    /// unwraps a single survivor. `None` for an empty input.
    pub fn merge(parts: impl IntoIterator<Item = Ty>) -> Option<Ty> {
        let mut set = BTreeSet::new();
        for part in parts {
            match part {
                Ty::Union(u) => set.extend(u.set),
                other => {
                    set.insert(TyRef::from(other));
                }
            }
        }
        match set.len() {
            0 => None,
            1 => set.into_iter().next().map(TyRef::into_ty),
            _ => Some(Ty::Union(Union { set })),
        }
    }

    pub fn nilable(self) -> Ty {
        Ty::merge([self, Ty::NIL]).expect("merge of a non-empty input")
    }

    pub fn tuple(elems: impl IntoIterator<Item = Ty>) -> Ty {
        Ty::Tuple(elems.into_iter().map(TyRef::from).collect())
    }

    pub fn named_tuple(entries: impl IntoIterator<Item = (SmolStr, Ty)>) -> Ty {
        Ty::NamedTuple(
            entries
                .into_iter()
                .map(|(name, ty)| (name, TyRef::from(ty)))
                .collect(),
        )
    }

    pub fn proc_of(params: impl IntoIterator<Item = Ty>, ret: Ty) -> Ty {
        Ty::Proc {
            params: params.into_iter().map(TyRef::from).collect(),
            ret: ret.into(),
        }
    }

    pub fn metaclass(self) -> Ty {
        Ty::Metaclass(self.into())
    }

    /// The tuple element types, if this is a tuple.
    pub fn as_tuple(&self) -> Option<&[TyRef]> {
        match self {
            Ty::Tuple(elems) => Some(elems),
            _ => None,
        }
    }

    pub fn display<'a>(&'a self, registry: &'a TypeRegistry) -> TyDisplay<'a> {
        TyDisplay::new(self, registry)
    }
}
