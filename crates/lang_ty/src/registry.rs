// ==============================================================================
// Type registry — the symbol-table-owned arena of named types
// ==============================================================================
//
// Passes reference named types by ClassId and read their definitions here.
// The registry is populated by the declaration pass (or by test fixtures)
// before any guessing runs, and is never mutated by a pass.

use derive_more::Debug;
use lang_ast::{ClassId, DefId, ExprId, FloatKind, IntKind, TypeExprId};
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::{PrimitiveTy, Ty};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[debug("ConstId({_0})")]
pub struct ConstId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefKind {
    Class { is_abstract: bool },
    Module,
    Enum,
    Lib,
    Primitive(PrimitiveTy),
    /// The top-level program namespace.
    Program,
    /// A file wrapped in its own private namespace.
    FileModule,
}

#[derive(Debug, Clone)]
pub struct TypeDef {
    pub name: SmolStr,
    pub kind: DefKind,
    /// Lexically enclosing namespace. `None` only for the program root.
    pub parent: Option<ClassId>,
    pub superclass: Option<ClassId>,
    pub subclasses: Vec<ClassId>,
    /// Non-empty for generic classes and modules.
    pub type_params: Box<[SmolStr]>,
    pub members: FxHashMap<SmolStr, ClassId>,
    pub const_members: FxHashMap<SmolStr, ConstId>,
    /// Metaclass-side definitions: constructors and class methods.
    pub class_methods: Vec<MethodSig>,
    pub lib_funs: FxHashMap<SmolStr, LibFun>,
    pub lib_externals: FxHashMap<SmolStr, Ty>,
    /// Abstract hierarchy roots that may not appear as variable types.
    pub root_restricted: bool,
}

impl TypeDef {
    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }
}

/// What a call can match on: arity bounds (`max_args` is unbounded past a
/// splat), block presence, and an optional declared return type. `def`
/// points at the body for inference when no annotation settles the type.
#[derive(Debug, Clone)]
pub struct MethodSig {
    pub name: SmolStr,
    pub min_args: usize,
    pub max_args: usize,
    pub accepts_block: bool,
    pub return_type: Option<TypeExprId>,
    pub def: Option<DefId>,
}

/// A foreign-library function. Parameter and return types are resolved when
/// the lib declaration is processed, so they are concrete here.
#[derive(Debug, Clone)]
pub struct LibFun {
    pub name: SmolStr,
    pub params: Box<[Ty]>,
    pub ret: Ty,
}

#[derive(Debug, Clone)]
pub struct ConstDef {
    pub name: SmolStr,
    /// The initializer expression. Enum members have none.
    pub value: Option<ExprId>,
    /// Set for enum members: the enum the member belongs to.
    pub enum_parent: Option<ClassId>,
}

/// A name looked up inside a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Member {
    Type(ClassId),
    Const(ConstId),
}

#[derive(Debug, Clone)]
pub struct TypeRegistry {
    defs: Vec<TypeDef>,
    consts: Vec<ConstDef>,
    primitive_classes: FxHashMap<PrimitiveTy, ClassId>,
    program: ClassId,
    object: ClassId,
    array: ClassId,
    hash: ClassId,
    range: ClassId,
    pointer: ClassId,
}

impl TypeRegistry {
    pub fn new() -> Self {
        let mut registry = TypeRegistry {
            defs: Vec::new(),
            consts: Vec::new(),
            primitive_classes: FxHashMap::default(),
            program: ClassId(0),
            object: ClassId(0),
            array: ClassId(0),
            hash: ClassId(0),
            range: ClassId(0),
            pointer: ClassId(0),
        };
        registry.program = registry.push_def(TypeDef {
            name: "main".into(),
            kind: DefKind::Program,
            parent: None,
            superclass: None,
            subclasses: Vec::new(),
            type_params: Box::new([]),
            members: FxHashMap::default(),
            const_members: FxHashMap::default(),
            class_methods: Vec::new(),
            lib_funs: FxHashMap::default(),
            lib_externals: FxHashMap::default(),
            root_restricted: false,
        });
        registry.seed_builtins();
        registry
    }

    /// The abstract hierarchy roots and the well-known generic containers.
    /// The roots are flagged `root_restricted`: using one as a variable type
    /// is a recorded error, never a guess.
    fn seed_builtins(&mut self) {
        let program = self.program;

        self.object = self.add_root(program, "Object", None);
        let reference = self.add_root(program, "Reference", Some(self.object));
        let value = self.add_root(program, "Value", Some(self.object));
        let number = self.add_root(program, "Number", Some(value));
        let int_root = self.add_root(program, "Int", Some(number));
        let float_root = self.add_root(program, "Float", Some(number));

        let ints: [(&str, IntKind); 8] = [
            ("Int8", IntKind::I8),
            ("Int16", IntKind::I16),
            ("Int32", IntKind::I32),
            ("Int64", IntKind::I64),
            ("UInt8", IntKind::U8),
            ("UInt16", IntKind::U16),
            ("UInt32", IntKind::U32),
            ("UInt64", IntKind::U64),
        ];
        for (name, kind) in ints {
            let id = self.add_primitive(program, name, PrimitiveTy::Int(kind));
            self.link_superclass(id, int_root);
        }
        let floats: [(&str, FloatKind); 2] = [("Float32", FloatKind::F32), ("Float64", FloatKind::F64)];
        for (name, kind) in floats {
            let id = self.add_primitive(program, name, PrimitiveTy::Float(kind));
            self.link_superclass(id, float_root);
        }
        for (name, prim) in [
            ("Nil", PrimitiveTy::Nil),
            ("Bool", PrimitiveTy::Bool),
            ("Char", PrimitiveTy::Char),
            ("String", PrimitiveTy::String),
            ("Symbol", PrimitiveTy::Symbol),
            ("Regex", PrimitiveTy::Regex),
            ("Void", PrimitiveTy::Void),
        ] {
            self.add_primitive(program, name, prim);
        }

        self.array = self.add_generic_type(program, "Array", DefKind::Class { is_abstract: false }, &["T"]);
        self.link_superclass(self.array, reference);
        self.hash = self.add_generic_type(program, "Hash", DefKind::Class { is_abstract: false }, &["K", "V"]);
        self.link_superclass(self.hash, reference);
        self.range = self.add_generic_type(program, "Range", DefKind::Class { is_abstract: false }, &["B", "E"]);
        self.link_superclass(self.range, value);
        self.pointer = self.add_generic_type(program, "Pointer", DefKind::Class { is_abstract: false }, &["T"]);
        self.link_superclass(self.pointer, value);
    }

    fn add_root(&mut self, parent: ClassId, name: &str, superclass: Option<ClassId>) -> ClassId {
        let id = self.add_type(parent, name, DefKind::Class { is_abstract: true });
        self.def_mut(id).root_restricted = true;
        if let Some(sup) = superclass {
            self.link_superclass(id, sup);
        }
        id
    }

    fn add_primitive(&mut self, parent: ClassId, name: &str, prim: PrimitiveTy) -> ClassId {
        let id = self.add_type(parent, name, DefKind::Primitive(prim));
        self.primitive_classes.insert(prim, id);
        id
    }

    fn push_def(&mut self, def: TypeDef) -> ClassId {
        let id = ClassId(self.defs.len() as u32);
        self.defs.push(def);
        id
    }

    pub fn add_type(&mut self, parent: ClassId, name: &str, kind: DefKind) -> ClassId {
        self.add_generic_type(parent, name, kind, &[])
    }

    pub fn add_generic_type(
        &mut self,
        parent: ClassId,
        name: &str,
        kind: DefKind,
        type_params: &[&str],
    ) -> ClassId {
        let id = self.push_def(TypeDef {
            name: name.into(),
            kind,
            parent: Some(parent),
            superclass: None,
            subclasses: Vec::new(),
            type_params: type_params.iter().map(|p| SmolStr::from(*p)).collect(),
            members: FxHashMap::default(),
            const_members: FxHashMap::default(),
            class_methods: Vec::new(),
            lib_funs: FxHashMap::default(),
            lib_externals: FxHashMap::default(),
            root_restricted: false,
        });
        self.def_mut(parent).members.insert(name.into(), id);
        id
    }

    pub fn link_superclass(&mut self, class: ClassId, superclass: ClassId) {
        self.def_mut(class).superclass = Some(superclass);
        self.def_mut(superclass).subclasses.push(class);
    }

    pub fn add_class_method(&mut self, class: ClassId, sig: MethodSig) {
        self.def_mut(class).class_methods.push(sig);
    }

    pub fn add_lib_fun(&mut self, lib: ClassId, fun: LibFun) {
        self.def_mut(lib).lib_funs.insert(fun.name.clone(), fun);
    }

    pub fn add_lib_external(&mut self, lib: ClassId, name: &str, ty: Ty) {
        self.def_mut(lib).lib_externals.insert(name.into(), ty);
    }

    pub fn add_const(&mut self, parent: ClassId, name: &str, value: ExprId) -> ConstId {
        let id = ConstId(self.consts.len() as u32);
        self.consts.push(ConstDef {
            name: name.into(),
            value: Some(value),
            enum_parent: None,
        });
        self.def_mut(parent).const_members.insert(name.into(), id);
        id
    }

    pub fn add_enum_member(&mut self, enum_class: ClassId, name: &str) -> ConstId {
        let id = ConstId(self.consts.len() as u32);
        self.consts.push(ConstDef {
            name: name.into(),
            value: None,
            enum_parent: Some(enum_class),
        });
        self.def_mut(enum_class).const_members.insert(name.into(), id);
        id
    }

    pub fn program(&self) -> ClassId {
        self.program
    }

    pub fn array_class(&self) -> ClassId {
        self.array
    }

    pub fn hash_class(&self) -> ClassId {
        self.hash
    }

    pub fn range_class(&self) -> ClassId {
        self.range
    }

    pub fn pointer_class(&self) -> ClassId {
        self.pointer
    }

    pub fn def(&self, id: ClassId) -> &TypeDef {
        &self.defs[id.0 as usize]
    }

    fn def_mut(&mut self, id: ClassId) -> &mut TypeDef {
        &mut self.defs[id.0 as usize]
    }

    pub fn const_def(&self, id: ConstId) -> &ConstDef {
        &self.consts[id.0 as usize]
    }

    pub fn is_generic(&self, id: ClassId) -> bool {
        self.def(id).is_generic()
    }

    pub fn allows_instance_vars(&self, id: ClassId) -> bool {
        matches!(
            self.def(id).kind,
            DefKind::Class { .. } | DefKind::Module
        )
    }

    pub fn lookup_member(&self, scope: ClassId, name: &str) -> Option<Member> {
        let def = self.def(scope);
        if let Some(&id) = def.members.get(name) {
            return Some(Member::Type(id));
        }
        def.const_members.get(name).copied().map(Member::Const)
    }

    pub fn class_for_primitive(&self, prim: PrimitiveTy) -> Option<ClassId> {
        self.primitive_classes.get(&prim).copied()
    }

    /// The plain type denoted by a registry id.
    pub fn ty_for(&self, id: ClassId) -> Ty {
        match self.def(id).kind {
            DefKind::Primitive(prim) => Ty::Primitive(prim),
            _ => Ty::Class(id),
        }
    }

    /// A concrete class with descendants is referenced through its virtual
    /// type; everything else stays as-is.
    pub fn virtual_ty(&self, id: ClassId) -> Ty {
        let def = self.def(id);
        match def.kind {
            DefKind::Class { .. } if !def.subclasses.is_empty() => Ty::Virtual(id),
            _ => self.ty_for(id),
        }
    }

    /// Metaclass-side definitions named `name`, own class first, then up the
    /// superclass chain. Returns the providing class alongside each
    /// signature so annotations resolve in the right scope.
    pub fn class_methods_named<'a>(
        &'a self,
        class: ClassId,
        name: &str,
    ) -> Vec<(ClassId, &'a MethodSig)> {
        let mut found = Vec::new();
        let mut current = Some(class);
        while let Some(id) = current {
            for sig in &self.def(id).class_methods {
                if sig.name == name {
                    found.push((id, sig));
                }
            }
            current = self.def(id).superclass;
        }
        found
    }

    // -- Factories for the well-known generic containers ---------------------

    pub fn array_of(&self, elem: Ty) -> Ty {
        Ty::Instance {
            class: self.array,
            args: Box::new([elem.into()]),
        }
    }

    pub fn hash_of(&self, key: Ty, value: Ty) -> Ty {
        Ty::Instance {
            class: self.hash,
            args: Box::new([key.into(), value.into()]),
        }
    }

    pub fn range_of(&self, begin: Ty, end: Ty) -> Ty {
        Ty::Instance {
            class: self.range,
            args: Box::new([begin.into(), end.into()]),
        }
    }

    pub fn pointer_of(&self, elem: Ty) -> Ty {
        Ty::Instance {
            class: self.pointer,
            args: Box::new([elem.into()]),
        }
    }

    /// The pointed-to element type of a pointer instance.
    pub fn pointer_elem(&self, ty: &Ty) -> Option<Ty> {
        match ty {
            Ty::Instance { class, args } if *class == self.pointer && args.len() == 1 => {
                Some(args[0].clone().into_ty())
            }
            _ => None,
        }
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
