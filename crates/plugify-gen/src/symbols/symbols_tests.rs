#![allow(non_snake_case)]

use super::*;
use crate::classes::synthesize;
use plugify_gen_manifest::load;
use test_case::test_case;

#[test]
fn Scope___claim___keeps_free_name() {
    let mut scope = Scope::new(Target::Rust, "test");

    assert_eq!(scope.claim("color").unwrap(), "color");
}

#[test]
fn Scope___claim___renames_keyword_with_underscore() {
    let mut scope = Scope::new(Target::Rust, "test");

    assert_eq!(scope.claim("type").unwrap(), "type_");
}

#[test]
fn Scope___claim___gives_independent_collisions_distinct_names() {
    let mut scope = Scope::new(Target::Python, "test");

    let first = scope.claim("lambda").unwrap();
    let second = scope.claim("lambda").unwrap();
    let third = scope.claim("lambda").unwrap();

    assert_eq!(first, "lambda_");
    assert_eq!(second, "lambda_2");
    assert_eq!(third, "lambda_3");
}

#[test]
fn Scope___claim___skips_names_already_taken() {
    let mut scope = Scope::new(Target::C, "test");
    scope.reserve("value");
    scope.reserve("value_");

    assert_eq!(scope.claim("value").unwrap(), "value_2");
}

#[test]
fn Scope___claim___exhausted_bound_is_name_collision() {
    let mut scope = Scope::new(Target::Golang, "params");
    scope.reserve("x");
    scope.reserve("x_");
    for n in 2..=MAX_RENAMES {
        scope.reserve(&format!("x_{n}"));
    }

    let err = scope.claim("x").unwrap_err();

    assert_eq!(err.error_code(), 5);
    assert!(err.to_string().contains("params"));
}

#[test_case(Case::Snake, "SetColor", "set_color")]
#[test_case(Case::Camel, "SetColor", "setColor")]
#[test_case(Case::Pascal, "set_color", "SetColor")]
#[test_case(Case::Screaming, "Red", "RED")]
#[test_case(Case::Preserve, "Set_Color", "Set_Color")]
#[test_case(Case::Snake, "__", "__" ; "unsplittable input is kept")]
fn Case___apply___converts(case: Case, input: &str, expected: &str) {
    assert_eq!(case.apply(input), expected);
}

const COLOR_MANIFEST: &str = r#"{
    "name": "my-pkg",
    "enums": [{ "name": "Color", "members": [
        { "name": "Red", "value": 0 }, { "name": "Green", "value": 1 }
    ]}],
    "callbacks": [{ "name": "OnTick", "params": [{ "name": "type", "type": "int32" }] }],
    "functions": [
        { "name": "SetColor", "params": [
            { "name": "handle", "type": "uint64" },
            { "name": "color", "type": "Color" }
        ]},
        { "name": "GetValues", "params": [{ "name": "type", "type": "int32[]" }],
          "return": { "type": "int32[]" } }
    ]
}"#;

#[test]
fn Symbols___resolve___applies_rust_conventions() {
    let pkg = load(COLOR_MANIFEST).unwrap();

    let symbols = Symbols::resolve(&pkg, &[], Target::Rust).unwrap();

    assert_eq!(symbols.module, "my_pkg");
    assert_eq!(symbols.enums[0].name, "Color");
    assert_eq!(symbols.enums[0].members, ["RED", "GREEN"]);
    assert_eq!(symbols.functions[0].name, "set_color");
    assert_eq!(symbols.functions[0].params, ["handle", "color"]);
    assert_eq!(symbols.callbacks[0].params, ["type_"]);
}

#[test]
fn Symbols___resolve___prefixes_c_enum_members() {
    let pkg = load(COLOR_MANIFEST).unwrap();

    let symbols = Symbols::resolve(&pkg, &[], Target::C).unwrap();

    assert_eq!(symbols.enums[0].members, ["Color_Red", "Color_Green"]);
    assert_eq!(symbols.functions[0].name, "SetColor");
}

#[test]
fn Symbols___resolve___names_array_companions() {
    let pkg = load(COLOR_MANIFEST).unwrap();

    let symbols = Symbols::resolve(&pkg, &[], Target::Rust).unwrap();

    let values = &symbols.functions[1];
    assert_eq!(values.params, ["type_"]);
    assert_eq!(values.lens, [Some("type_len".to_string())]);
    assert_eq!(values.out_len.as_deref(), Some("out_len"));
    assert_eq!(symbols.functions[0].lens, [None, None]);
}

#[test]
fn Symbols___resolve___companion_colliding_with_param_is_renamed() {
    let pkg = load(
        r#"{ "name": "pkg", "functions": [{ "name": "Sum", "params": [
            { "name": "items", "type": "int32[]" },
            { "name": "items_len", "type": "int32" }
        ]}]}"#,
    )
    .unwrap();

    let symbols = Symbols::resolve(&pkg, &[], Target::C).unwrap();

    assert_eq!(symbols.functions[0].params, ["items", "items_len"]);
    assert_eq!(symbols.functions[0].lens, [Some("items_len_".to_string()), None]);
}

#[test]
fn Symbols___resolve___shared_type_names_are_not_reused() {
    let pkg = load(r#"{ "name": "pkg", "enums": [{ "name": "Vec3", "members": [{ "name": "A" }] }]}"#)
        .unwrap();

    let symbols = Symbols::resolve(&pkg, &[], Target::Cpp).unwrap();

    assert_eq!(symbols.enum_name(EnumId(0)), "Vec3_");
}

#[test]
fn Symbols___resolve___class_methods_avoid_fixed_members() {
    let pkg = load(
        r#"{ "name": "pkg", "functions": [
            { "name": "GetEntityHandle", "params": [{ "name": "e", "type": "ptr64" }] },
            { "name": "SetEntityHandle", "params": [{ "name": "e", "type": "ptr64" }] },
            { "name": "Entity_Handle", "params": [{ "name": "e", "type": "ptr64" }] }
        ]}"#,
    )
    .unwrap();
    let mut classes = synthesize(&pkg).classes;
    classes[0].methods[0].name = "handle".to_string();

    let symbols = Symbols::resolve(&pkg, &classes, Target::Rust).unwrap();

    assert_eq!(symbols.classes[0].name, "Entity");
    assert_eq!(symbols.classes[0].methods[0], "handle_");
}
