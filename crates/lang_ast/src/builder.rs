use la_arena::Arena;
use smol_str::SmolStr;

use crate::{Call, Def, Expr, ExprId, IntKind, Literal, Module, TypeExpr, TypeExprId};

/// Programmatic `Module` construction. The parser lowers its concrete tree
/// through one of these; tests build fixtures with it directly.
#[derive(Default, Debug)]
pub struct ModuleBuilder {
    exprs: Arena<Expr>,
    type_exprs: Arena<TypeExpr>,
    defs: Arena<Def>,
}

impl ModuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, expr: Expr) -> ExprId {
        self.exprs.alloc(expr)
    }

    pub fn alloc_type(&mut self, type_expr: TypeExpr) -> TypeExprId {
        self.type_exprs.alloc(type_expr)
    }

    pub fn alloc_def(&mut self, def: Def) -> crate::DefId {
        self.defs.alloc(def)
    }

    pub fn finish(self, entry_expr: ExprId) -> Module {
        Module {
            exprs: self.exprs,
            type_exprs: self.type_exprs,
            defs: self.defs,
            entry_expr,
        }
    }

    // -- Shorthand for common node shapes ------------------------------------

    pub fn int(&mut self, value: i64) -> ExprId {
        self.alloc(Expr::Literal(Literal::Int {
            value,
            kind: IntKind::I32,
        }))
    }

    pub fn str(&mut self, value: &str) -> ExprId {
        self.alloc(Expr::Literal(Literal::Str(value.into())))
    }

    pub fn bool(&mut self, value: bool) -> ExprId {
        self.alloc(Expr::Literal(Literal::Bool(value)))
    }

    pub fn nil(&mut self) -> ExprId {
        self.alloc(Expr::Literal(Literal::Nil))
    }

    pub fn var(&mut self, name: &str) -> ExprId {
        self.alloc(Expr::Var(name.into()))
    }

    pub fn self_ref(&mut self) -> ExprId {
        self.alloc(Expr::Var("self".into()))
    }

    pub fn ivar(&mut self, name: &str) -> ExprId {
        self.alloc(Expr::InstanceVar(name.into()))
    }

    pub fn class_var(&mut self, name: &str) -> ExprId {
        self.alloc(Expr::ClassVar(name.into()))
    }

    pub fn global(&mut self, name: &str) -> ExprId {
        self.alloc(Expr::Global(name.into()))
    }

    pub fn assign(&mut self, target: ExprId, value: ExprId) -> ExprId {
        self.alloc(Expr::Assign { target, value })
    }

    pub fn exprs(&mut self, items: impl IntoIterator<Item = ExprId>) -> ExprId {
        self.alloc(Expr::Expressions(items.into_iter().collect()))
    }

    pub fn path(&mut self, names: &[&str]) -> ExprId {
        self.alloc(Expr::Path {
            names: names.iter().map(|n| SmolStr::from(*n)).collect(),
            global: false,
        })
    }

    pub fn type_path(&mut self, names: &[&str]) -> TypeExprId {
        self.alloc_type(TypeExpr::Path {
            names: names.iter().map(|n| SmolStr::from(*n)).collect(),
            global: false,
        })
    }

    pub fn call(&mut self, receiver: Option<ExprId>, name: &str, args: &[ExprId]) -> ExprId {
        self.alloc(Expr::Call(Call {
            receiver,
            name: name.into(),
            args: args.into(),
            has_block: false,
            block_body: None,
            expansion: None,
        }))
    }
}
