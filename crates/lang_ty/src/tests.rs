use lang_ast::{ModuleBuilder, TypeExpr};

use crate::{resolve, DefKind, Resolution, Ty, TypeRegistry};

#[test]
fn merge_of_identical_types_collapses() {
    let merged = Ty::merge([Ty::INT32, Ty::INT32]);
    assert_eq!(merged, Some(Ty::INT32));
}

#[test]
fn merge_is_order_independent() {
    let a = Ty::merge([Ty::INT32, Ty::STRING, Ty::NIL]);
    let b = Ty::merge([Ty::NIL, Ty::INT32, Ty::STRING]);
    assert_eq!(a, b);
}

#[test]
fn merge_flattens_nested_unions() {
    let inner = Ty::merge([Ty::INT32, Ty::STRING]).unwrap();
    let outer = Ty::merge([inner, Ty::NIL]).unwrap();
    let Ty::Union(members) = &outer else {
        panic!("expected a union, got {outer:?}");
    };
    assert_eq!(members.len(), 3);
    assert!(members.contains(&Ty::NIL));
}

#[test]
fn merge_of_nothing_is_none() {
    assert_eq!(Ty::merge([]), None);
}

#[test]
fn nilable_wraps_in_a_union_with_nil() {
    let ty = Ty::STRING.nilable();
    let Ty::Union(members) = &ty else {
        panic!("expected a union, got {ty:?}");
    };
    assert!(members.contains(&Ty::NIL));
    assert!(members.contains(&Ty::STRING));
}

#[test]
fn resolves_a_seeded_primitive_by_name() {
    let registry = TypeRegistry::new();
    let mut b = ModuleBuilder::new();
    let te = b.type_path(&["Int32"]);
    let entry = b.nil();
    let module = b.finish(entry);

    let resolved = resolve(&registry, &module, registry.program(), te, false);
    assert_eq!(resolved, Some(Resolution::Type(Ty::INT32)));
}

#[test]
fn lexical_lookup_climbs_enclosing_namespaces() {
    let mut registry = TypeRegistry::new();
    let outer = registry.add_type(registry.program(), "Outer", DefKind::Module);
    let helper = registry.add_type(outer, "Helper", DefKind::Class { is_abstract: false });
    let inner = registry.add_type(outer, "Inner", DefKind::Class { is_abstract: false });

    let mut b = ModuleBuilder::new();
    let te = b.type_path(&["Helper"]);
    let entry = b.nil();
    let module = b.finish(entry);

    let resolved = resolve(&registry, &module, inner, te, false);
    assert_eq!(resolved, Some(Resolution::Type(Ty::Class(helper))));
}

#[test]
fn generic_instantiation_requires_matching_arity() {
    let registry = TypeRegistry::new();
    let mut b = ModuleBuilder::new();
    let base = b.type_path(&["Array"]);
    let elem = b.type_path(&["Int32"]);
    let ok = b.alloc_type(TypeExpr::Generic {
        base,
        args: Box::new([elem]),
    });
    let base2 = b.type_path(&["Array"]);
    let elem2 = b.type_path(&["Int32"]);
    let bad = b.alloc_type(TypeExpr::Generic {
        base: base2,
        args: Box::new([elem2, elem2]),
    });
    let entry = b.nil();
    let module = b.finish(entry);

    assert_eq!(
        resolve(&registry, &module, registry.program(), ok, false),
        Some(Resolution::Type(registry.array_of(Ty::INT32)))
    );
    assert_eq!(
        resolve(&registry, &module, registry.program(), bad, false),
        None
    );
}

#[test]
fn union_type_expressions_merge_their_parts() {
    let registry = TypeRegistry::new();
    let mut b = ModuleBuilder::new();
    let int = b.type_path(&["Int32"]);
    let nil = b.type_path(&["Nil"]);
    let te = b.alloc_type(TypeExpr::Union(Box::new([int, nil])));
    let entry = b.nil();
    let module = b.finish(entry);

    assert_eq!(
        resolve(&registry, &module, registry.program(), te, false),
        Some(Resolution::Type(Ty::INT32.nilable()))
    );
}

#[test]
fn virtual_ty_only_applies_to_classes_with_descendants() {
    let mut registry = TypeRegistry::new();
    let base = registry.add_type(registry.program(), "Base", DefKind::Class { is_abstract: false });
    assert_eq!(registry.virtual_ty(base), Ty::Class(base));

    let sub = registry.add_type(registry.program(), "Sub", DefKind::Class { is_abstract: false });
    registry.link_superclass(sub, base);
    assert_eq!(registry.virtual_ty(base), Ty::Virtual(base));
    assert_eq!(registry.virtual_ty(sub), Ty::Class(sub));
}

#[test]
fn pointer_elem_unwraps_one_level() {
    let registry = TypeRegistry::new();
    let ptr = registry.pointer_of(Ty::INT32);
    assert_eq!(registry.pointer_elem(&ptr), Some(Ty::INT32));
    assert_eq!(registry.pointer_elem(&Ty::INT32), None);
}

#[test]
fn display_renders_nested_types() {
    let mut registry = TypeRegistry::new();
    let outer = registry.add_type(registry.program(), "Outer", DefKind::Module);
    let inner = registry.add_type(outer, "Inner", DefKind::Class { is_abstract: false });

    let ty = registry.array_of(Ty::Class(inner));
    assert_eq!(ty.display(&registry).to_string(), "Array(Outer::Inner)");

    let union = Ty::merge([Ty::INT32, Ty::NIL]).unwrap();
    let rendered = union.display(&registry).to_string();
    assert!(rendered.contains("Int32") && rendered.contains("Nil"));
}
