// ==============================================================================
// Display — human-readable type printing
// ==============================================================================
//
// Named types only carry ids, so rendering borrows the registry. Diagnostics
// convert at the output boundary while the registry is still in reach.

use std::fmt;

use lang_ast::{ClassId, FloatKind, IntKind};

use crate::{PrimitiveTy, Ty, TypeRegistry};

pub struct TyDisplay<'a> {
    ty: &'a Ty,
    registry: &'a TypeRegistry,
}

impl<'a> TyDisplay<'a> {
    pub(crate) fn new(ty: &'a Ty, registry: &'a TypeRegistry) -> Self {
        Self { ty, registry }
    }

    fn child(&self, ty: &'a Ty) -> TyDisplay<'a> {
        TyDisplay::new(ty, self.registry)
    }

    fn write_qualified(&self, f: &mut fmt::Formatter<'_>, id: ClassId) -> fmt::Result {
        let def = self.registry.def(id);
        if let Some(parent) = def.parent {
            if parent != self.registry.program() {
                self.write_qualified(f, parent)?;
                write!(f, "::")?;
            }
        }
        write!(f, "{}", def.name)
    }
}

impl fmt::Display for TyDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ty {
            Ty::Primitive(prim) => write!(f, "{prim}"),
            Ty::Class(id) => self.write_qualified(f, *id),
            Ty::Virtual(id) => {
                self.write_qualified(f, *id)?;
                write!(f, "+")
            }
            Ty::Metaclass(inner) => {
                write!(f, "{}.class", self.child(inner))
            }
            Ty::Instance { class, args } => {
                self.write_qualified(f, *class)?;
                write!(f, "(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", self.child(arg))?;
                }
                write!(f, ")")
            }
            Ty::Tuple(elems) => {
                write!(f, "{{")?;
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", self.child(elem))?;
                }
                write!(f, "}}")
            }
            Ty::NamedTuple(entries) => {
                write!(f, "{{")?;
                for (i, (name, ty)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {}", self.child(ty))?;
                }
                write!(f, "}}")
            }
            Ty::Proc { params, ret } => {
                write!(f, "Proc(")?;
                for param in params.iter() {
                    write!(f, "{}, ", self.child(param))?;
                }
                write!(f, "{})", self.child(ret))
            }
            Ty::Union(members) => {
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}", self.child(member))?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for PrimitiveTy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrimitiveTy::Nil => "Nil",
            PrimitiveTy::Bool => "Bool",
            PrimitiveTy::Char => "Char",
            PrimitiveTy::String => "String",
            PrimitiveTy::Symbol => "Symbol",
            PrimitiveTy::Regex => "Regex",
            PrimitiveTy::Void => "Void",
            PrimitiveTy::Int(kind) => match kind {
                IntKind::I8 => "Int8",
                IntKind::I16 => "Int16",
                IntKind::I32 => "Int32",
                IntKind::I64 => "Int64",
                IntKind::U8 => "UInt8",
                IntKind::U16 => "UInt16",
                IntKind::U32 => "UInt32",
                IntKind::U64 => "UInt64",
            },
            PrimitiveTy::Float(kind) => match kind {
                FloatKind::F32 => "Float32",
                FloatKind::F64 => "Float64",
            },
        };
        write!(f, "{name}")
    }
}
