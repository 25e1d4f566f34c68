mod builder;
pub mod scan;


use std::ops;

use derive_more::Debug;
use la_arena::{Arena, Idx as Id};
use ordered_float::OrderedFloat;
use smol_str::SmolStr;

pub use builder::ModuleBuilder;

pub type ExprId = Id<Expr>;
pub type TypeExprId = Id<TypeExpr>;
pub type DefId = Id<Def>;

/// Id of a type in the program's type table. The declaration pass that runs
/// before this crate's consumers annotates every class-like definition node
/// with the id it was registered under, so later passes never re-resolve
/// definition names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[debug("ClassId({_0})")]
pub struct ClassId(pub u32);

/// A location handle stored in pass outputs. The driver owns the mapping
/// from ids back to source spans, so passes only ever carry ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Expr(ExprId),
    Type(TypeExprId),
}

impl From<ExprId> for NodeRef {
    fn from(value: ExprId) -> Self {
        NodeRef::Expr(value)
    }
}

impl From<TypeExprId> for NodeRef {
    fn from(value: TypeExprId) -> Self {
        NodeRef::Type(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    exprs: Arena<Expr>,
    type_exprs: Arena<TypeExpr>,
    defs: Arena<Def>,
    pub entry_expr: ExprId,
}

impl Module {
    pub fn exprs(&self) -> impl ExactSizeIterator<Item = (ExprId, &Expr)> {
        self.exprs.iter()
    }

    pub fn defs(&self) -> impl ExactSizeIterator<Item = (DefId, &Def)> {
        self.defs.iter()
    }
}

impl ops::Index<ExprId> for Module {
    type Output = Expr;
    fn index(&self, index: ExprId) -> &Self::Output {
        &self.exprs[index]
    }
}

impl ops::Index<TypeExprId> for Module {
    type Output = TypeExpr;
    fn index(&self, index: TypeExprId) -> &Self::Output {
        &self.type_exprs[index]
    }
}

impl ops::Index<DefId> for Module {
    type Output = Def;
    fn index(&self, index: DefId) -> &Self::Output {
        &self.defs[index]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IntKind {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FloatKind {
    F32,
    F64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Int { value: i64, kind: IntKind },
    Float { value: OrderedFloat<f64>, kind: FloatKind },
    Bool(bool),
    Char(char),
    Str(SmolStr),
    Symbol(SmolStr),
    Regex(SmolStr),
    Nil,
}

/// Boolean connectives. Other binary operators in the surface syntax are
/// parsed as method calls and arrive here as `Call` nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOpKind {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct When {
    pub conds: Box<[ExprId]>,
    pub body: ExprId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub receiver: Option<ExprId>,
    pub name: SmolStr,
    pub args: Box<[ExprId]>,
    /// True whenever a block is supplied, whether inline or forwarded.
    pub has_block: bool,
    pub block_body: Option<ExprId>,
    /// Macro expansion attached by the parser. Re-visited by consumers in
    /// top-level context; never produced by anything in this workspace.
    pub expansion: Option<ExprId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: SmolStr,
    pub restriction: Option<TypeExprId>,
    pub default: Option<ExprId>,
}

/// A method definition. Defs live in their own arena: class-method
/// definitions referenced from the type table need not appear in any body
/// expression, while instance-method definitions show up as `Expr::Def`
/// statements inside their owner's body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Def {
    pub name: SmolStr,
    pub args: Box<[Param]>,
    pub splat_index: Option<usize>,
    pub block_arg: Option<Param>,
    pub return_type: Option<TypeExprId>,
    pub body: ExprId,
    /// True when the body contains a `previous_def` reference, which keeps
    /// an otherwise-shadowed earlier definition reachable.
    pub calls_previous_def: bool,
}

impl Def {
    pub const INITIALIZER: &'static str = "initialize";

    pub fn is_initializer(&self) -> bool {
        self.name == Self::INITIALIZER
    }

    pub fn accepts_block(&self) -> bool {
        self.block_arg.is_some()
    }

    /// Arity bounds for call matching: required arguments up to either the
    /// full list or unbounded past a splat.
    pub fn arg_bounds(&self) -> (usize, usize) {
        let required = self
            .args
            .iter()
            .enumerate()
            .filter(|(i, a)| a.default.is_none() && Some(*i) != self.splat_index)
            .count();
        let max = if self.splat_index.is_some() {
            usize::MAX
        } else {
            self.args.len()
        };
        (required, max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// An invalid parse. Lets consumers keep going and treat the node as
    /// contributing nothing.
    Missing,
    Nop,
    Literal(Literal),
    StringInterpolation(Box<[ExprId]>),
    Range {
        from: ExprId,
        to: ExprId,
        exclusive: bool,
    },
    ArrayLiteral {
        elements: Box<[ExprId]>,
        /// The `of T` element clause.
        of_elem: Option<TypeExprId>,
        /// Explicit constructor syntax `C {x, y}`.
        constructor: Option<TypeExprId>,
    },
    HashLiteral {
        entries: Box<[(ExprId, ExprId)]>,
        /// The `of K => V` clause.
        of_pair: Option<(TypeExprId, TypeExprId)>,
        constructor: Option<TypeExprId>,
    },
    TupleLiteral(Box<[ExprId]>),
    NamedTupleLiteral(Box<[(SmolStr, ExprId)]>),
    If {
        cond: ExprId,
        then_body: ExprId,
        else_body: Option<ExprId>,
    },
    Unless {
        cond: ExprId,
        then_body: ExprId,
        else_body: Option<ExprId>,
    },
    Case {
        subject: Option<ExprId>,
        whens: Box<[When]>,
        else_body: Option<ExprId>,
    },
    BinOp {
        op: BinOpKind,
        lhs: ExprId,
        rhs: ExprId,
    },
    Not(ExprId),
    IsA {
        receiver: ExprId,
        ty: TypeExprId,
    },
    RespondsTo {
        receiver: ExprId,
        name: SmolStr,
    },
    SizeOf(TypeExprId),
    InstanceSizeOf(TypeExprId),
    /// `e.as(T)`
    Cast {
        expr: ExprId,
        ty: TypeExprId,
    },
    /// `e.as?(T)`
    NilableCast {
        expr: ExprId,
        ty: TypeExprId,
    },
    Var(SmolStr),
    InstanceVar(SmolStr),
    ClassVar(SmolStr),
    Global(SmolStr),
    /// A constant path in expression position (`Foo::Bar`).
    Path {
        names: Box<[SmolStr]>,
        global: bool,
    },
    /// A generic type instantiation in expression position, e.g. the
    /// receiver of `Box(Int32).new`. Points at a `TypeExpr::Generic`.
    Generic(TypeExprId),
    Call(Call),
    /// An `out` argument of a foreign-library call.
    Out(ExprId),
    Assign {
        target: ExprId,
        value: ExprId,
    },
    MultiAssign {
        targets: Box<[ExprId]>,
        values: Box<[ExprId]>,
    },
    /// `v : T` or `v : T = e`.
    TypeDeclaration {
        target: ExprId,
        ty: TypeExprId,
        value: Option<ExprId>,
    },
    /// `v = uninitialized T`
    UninitializedVar {
        target: ExprId,
        ty: TypeExprId,
    },
    Def(DefId),
    ClassDef {
        class: ClassId,
        body: ExprId,
    },
    ModuleDef {
        class: ClassId,
        body: ExprId,
    },
    EnumDef {
        class: ClassId,
        body: ExprId,
    },
    LibDef {
        class: ClassId,
        body: ExprId,
    },
    Return(Option<ExprId>),
    Expressions(Box<[ExprId]>),
    MacroInvocation {
        expanded: Option<ExprId>,
    },
}

impl Expr {
    pub fn walk_child_exprs(&self, mut f: impl FnMut(ExprId)) {
        match self {
            Self::Missing
            | Self::Nop
            | Self::Literal(_)
            | Self::Var(_)
            | Self::InstanceVar(_)
            | Self::ClassVar(_)
            | Self::Global(_)
            | Self::Path { .. }
            | Self::Generic(_)
            | Self::SizeOf(_)
            | Self::InstanceSizeOf(_)
            | Self::Def(_) => {}
            Self::StringInterpolation(parts) => parts.iter().copied().for_each(f),
            Self::Range { from, to, .. } => {
                f(*from);
                f(*to);
            }
            Self::ArrayLiteral { elements, .. } => elements.iter().copied().for_each(f),
            Self::HashLiteral { entries, .. } => {
                for &(k, v) in entries.iter() {
                    f(k);
                    f(v);
                }
            }
            Self::TupleLiteral(elements) => elements.iter().copied().for_each(f),
            Self::NamedTupleLiteral(entries) => {
                for &(_, v) in entries.iter() {
                    f(v);
                }
            }
            Self::If {
                cond,
                then_body,
                else_body,
            }
            | Self::Unless {
                cond,
                then_body,
                else_body,
            } => {
                f(*cond);
                f(*then_body);
                if let &Some(e) = else_body {
                    f(e);
                }
            }
            Self::Case {
                subject,
                whens,
                else_body,
            } => {
                if let &Some(s) = subject {
                    f(s);
                }
                for w in whens.iter() {
                    w.conds.iter().copied().for_each(&mut f);
                    f(w.body);
                }
                if let &Some(e) = else_body {
                    f(e);
                }
            }
            Self::BinOp { lhs, rhs, op: _ } => {
                f(*lhs);
                f(*rhs);
            }
            Self::Not(e) | Self::Out(e) => f(*e),
            Self::IsA { receiver, ty: _ } => f(*receiver),
            Self::RespondsTo { receiver, name: _ } => f(*receiver),
            Self::Cast { expr, ty: _ } | Self::NilableCast { expr, ty: _ } => f(*expr),
            Self::Call(call) => {
                if let Some(r) = call.receiver {
                    f(r);
                }
                call.args.iter().copied().for_each(&mut f);
                if let Some(b) = call.block_body {
                    f(b);
                }
                if let Some(x) = call.expansion {
                    f(x);
                }
            }
            Self::Assign { target, value } => {
                f(*target);
                f(*value);
            }
            Self::MultiAssign { targets, values } => {
                targets.iter().copied().for_each(&mut f);
                values.iter().copied().for_each(f);
            }
            Self::TypeDeclaration {
                target,
                ty: _,
                value,
            } => {
                f(*target);
                if let &Some(v) = value {
                    f(v);
                }
            }
            Self::UninitializedVar { target, ty: _ } => f(*target),
            Self::ClassDef { body, .. }
            | Self::ModuleDef { body, .. }
            | Self::EnumDef { body, .. }
            | Self::LibDef { body, .. } => f(*body),
            Self::Return(value) => {
                if let &Some(v) = value {
                    f(v);
                }
            }
            Self::Expressions(items) => items.iter().copied().for_each(f),
            Self::MacroInvocation { expanded } => {
                if let &Some(x) = expanded {
                    f(x);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    Path {
        names: Box<[SmolStr]>,
        global: bool,
    },
    Generic {
        base: TypeExprId,
        args: Box<[TypeExprId]>,
    },
    Union(Box<[TypeExprId]>),
    Proc {
        inputs: Box<[TypeExprId]>,
        output: Option<TypeExprId>,
    },
    SelfType,
    Underscore,
    Typeof(Box<[ExprId]>),
    Metaclass(TypeExprId),
}
