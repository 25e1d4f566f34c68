//! Property tests for the pass-level invariants: explicit declarations
//! suppress guesses, `outside_def` is sticky, traversal is deterministic,
//! and merged types do not depend on the order assignment sites appear.

use proptest::prelude::{any, prop, prop_assert, prop_assert_eq, prop_oneof, proptest, Just, Strategy};

use lang_ast::{ClassId, Def, Expr, ExprId, IntKind, Literal, Module, ModuleBuilder, NodeRef};
use lang_ty::{DefKind, Ty, TypeRegistry};

use crate::{guess_module, ExplicitDecl, GuessInputs};

fn arb_literal() -> impl Strategy<Value = (Literal, Ty)> {
    prop_oneof![
        any::<i64>().prop_map(|value| {
            (
                Literal::Int {
                    value,
                    kind: IntKind::I32,
                },
                Ty::INT32,
            )
        }),
        any::<bool>().prop_map(|value| (Literal::Bool(value), Ty::BOOL)),
        "[a-z]{1,8}".prop_map(|value| (Literal::Str(value.into()), Ty::STRING)),
        Just((Literal::Nil, Ty::NIL)),
    ]
}

/// A module that assigns each literal to the global `$g` in order.
fn global_assign_module(literals: &[Literal]) -> Module {
    let mut b = ModuleBuilder::new();
    let assigns: Vec<ExprId> = literals
        .iter()
        .map(|literal| {
            let target = b.global("$g");
            let value = b.alloc(Expr::Literal(literal.clone()));
            b.assign(target, value)
        })
        .collect();
    let entry = b.exprs(assigns);
    b.finish(entry)
}

fn single_class(registry: &mut TypeRegistry) -> ClassId {
    registry.add_type(
        registry.program(),
        "Subject",
        DefKind::Class { is_abstract: false },
    )
}

proptest! {
    // Property: the stored type equals the merge of the individually
    // guessable site types, whatever order the sites are encountered in.
    #[test]
    fn merged_type_is_independent_of_site_order(
        (literals, order) in prop::collection::vec(arb_literal(), 1..6).prop_flat_map(|literals| {
            let len = literals.len();
            (Just(literals), Just((0..len).collect::<Vec<_>>()).prop_shuffle())
        })
    ) {
        let registry = TypeRegistry::new();

        let forward: Vec<Literal> = literals.iter().map(|(lit, _)| lit.clone()).collect();
        let permuted: Vec<Literal> = order.iter().map(|&i| literals[i].0.clone()).collect();

        let first = guess_module(&global_assign_module(&forward), &registry, GuessInputs::default()).unwrap();
        let second = guess_module(&global_assign_module(&permuted), &registry, GuessInputs::default()).unwrap();

        prop_assert_eq!(&first.globals["$g"].ty, &second.globals["$g"].ty);

        let expected = Ty::merge(literals.iter().map(|(_, ty)| ty.clone())).unwrap();
        prop_assert_eq!(&first.globals["$g"].ty, &expected);
    }

    // Property: running the pass twice over the same module yields the same
    // maps, including iteration order.
    #[test]
    fn guessing_is_deterministic(
        sites in prop::collection::vec((0..4usize, arb_literal()), 1..8)
    ) {
        let registry = TypeRegistry::new();
        let mut b = ModuleBuilder::new();
        let assigns: Vec<ExprId> = sites
            .iter()
            .map(|(slot, (literal, _))| {
                let target = b.global(&format!("$g{slot}"));
                let value = b.alloc(Expr::Literal(literal.clone()));
                b.assign(target, value)
            })
            .collect();
        let entry = b.exprs(assigns);
        let module = b.finish(entry);

        let first = guess_module(&module, &registry, GuessInputs::default()).unwrap();
        let second = guess_module(&module, &registry, GuessInputs::default()).unwrap();

        prop_assert_eq!(&first, &second);
        prop_assert!(first.globals.keys().eq(second.globals.keys()));
    }

    // Property: an explicit declaration for (owner, name) means no guessed
    // entry for (owner, name), no matter which assignments exist.
    #[test]
    fn explicit_declarations_always_suppress_guesses(
        names in prop::collection::btree_set("[a-z]{1,6}", 1..6),
        mask in prop::collection::vec(any::<bool>(), 6),
    ) {
        let mut registry = TypeRegistry::new();
        let class = single_class(&mut registry);

        let mut b = ModuleBuilder::new();
        let decl_te = b.type_path(&["String"]);
        let names: Vec<String> = names.into_iter().collect();
        let assigns: Vec<ExprId> = names
            .iter()
            .map(|name| {
                let target = b.ivar(&format!("@{name}"));
                let value = b.int(1);
                b.assign(target, value)
            })
            .collect();
        let class_body = b.exprs(assigns);
        let class_def = b.alloc(Expr::ClassDef { class, body: class_body });
        let entry = b.exprs([class_def]);
        let module = b.finish(entry);

        let mut inputs = GuessInputs::default();
        let explicit: Vec<String> = names
            .iter()
            .zip(mask.iter())
            .filter(|(_, &is_explicit)| is_explicit)
            .map(|(name, _)| format!("@{name}"))
            .collect();
        for name in &explicit {
            inputs.explicit_ivars.entry(class).or_default().insert(
                name.as_str().into(),
                ExplicitDecl {
                    type_expr: decl_te,
                    location: NodeRef::Type(decl_te),
                },
            );
        }

        let result = guess_module(&module, &registry, inputs).unwrap();
        let guessed = result.instance_vars.get(&class);
        for name in &explicit {
            prop_assert!(guessed.and_then(|vars| vars.get(name.as_str())).is_none());
        }
    }

    // Property: outside_def is true iff at least one contributing site sat
    // outside a method body.
    #[test]
    fn outside_def_is_sticky(flags in prop::collection::vec(any::<bool>(), 1..6)) {
        let mut registry = TypeRegistry::new();
        let class = single_class(&mut registry);

        let mut b = ModuleBuilder::new();
        let mut items: Vec<ExprId> = Vec::new();
        for (i, &outside) in flags.iter().enumerate() {
            let target = b.ivar("@x");
            let value = b.int(1);
            let assign = b.assign(target, value);
            if outside {
                items.push(assign);
            } else {
                let body = b.exprs([assign]);
                let def = b.alloc_def(Def {
                    name: format!("m{i}").into(),
                    args: Box::new([]),
                    splat_index: None,
                    block_arg: None,
                    return_type: None,
                    body,
                    calls_previous_def: false,
                });
                items.push(b.alloc(Expr::Def(def)));
            }
        }
        let class_body = b.exprs(items);
        let class_def = b.alloc(Expr::ClassDef { class, body: class_body });
        let entry = b.exprs([class_def]);
        let module = b.finish(entry);

        let result = guess_module(&module, &registry, GuessInputs::default()).unwrap();
        let info = &result.instance_vars[&class]["@x"];
        prop_assert_eq!(info.outside_def, flags.iter().any(|&outside| outside));
    }
}
