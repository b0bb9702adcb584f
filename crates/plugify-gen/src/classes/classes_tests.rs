#![allow(non_snake_case)]

use super::*;
use plugify_gen_manifest::load;

fn package(functions: &str) -> Package {
    load(&format!(r#"{{ "name": "pkg", "functions": [{functions}] }}"#)).unwrap()
}

fn function_names(pkg: &Package, class: &ClassModel) -> Vec<String> {
    class
        .methods
        .iter()
        .map(|m| pkg.functions[m.function].name.clone())
        .collect()
}

const ENTITY_FUNCTIONS: &str = r#"
    { "name": "GetEntityHealth", "params": [{ "name": "entity", "type": "ptr64" }],
      "return": { "type": "int32" } },
    { "name": "SetEntityHealth", "params": [{ "name": "entity", "type": "ptr64" },
      { "name": "hp", "type": "int32" }] },
    { "name": "DestroyEntity", "params": [{ "name": "entity", "type": "ptr64" }] }
"#;

#[test]
fn synthesize___handle_family___groups_into_owned_class() {
    let pkg = package(ENTITY_FUNCTIONS);

    let synthesis = synthesize(&pkg);

    assert_eq!(synthesis.classes.len(), 1);
    let class = &synthesis.classes[0];
    assert_eq!(class.name, "Entity");
    assert_eq!(class.receiver, Receiver::Owned);
    assert_eq!(class.destructor, Some(2));
    assert!(class.synthesized);
    let methods: Vec<_> = class.methods.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(methods, ["GetHealth", "SetHealth"]);
    assert!(synthesis.warnings.is_empty());
}

#[test]
fn synthesize___without_destructor___borrows_receiver() {
    let pkg = package(
        r#"
        { "name": "GetPlayerName", "params": [{ "name": "player", "type": "int64" }],
          "return": { "type": "string" } },
        { "name": "KickPlayer", "params": [{ "name": "player", "type": "int64" }] },
        { "name": "GetPlayerScore", "params": [{ "name": "player", "type": "int64" }],
          "return": { "type": "int32" } }
        "#,
    );

    let synthesis = synthesize(&pkg);

    assert_eq!(synthesis.classes.len(), 1);
    let class = &synthesis.classes[0];
    assert_eq!(class.name, "Player");
    assert_eq!(class.receiver, Receiver::Borrowed);
    assert_eq!(class.handle, TypeRef::int(64, true));
    assert_eq!(function_names(&pkg, class), ["GetPlayerName", "GetPlayerScore"]);
}

#[test]
fn synthesize___single_function___forms_no_class() {
    let pkg = package(
        r#"{ "name": "GetEntityHealth", "params": [{ "name": "entity", "type": "ptr64" }],
             "return": { "type": "int32" } }"#,
    );

    assert!(synthesize(&pkg).classes.is_empty());
}

#[test]
fn synthesize___ineligible_receiver___forms_no_class() {
    let pkg = package(
        r#"
        { "name": "GetEntityHealth", "params": [{ "name": "entity", "type": "int32" }] },
        { "name": "SetEntityHealth", "params": [{ "name": "entity", "type": "int32" }] },
        { "name": "GetEntityName", "params": [{ "name": "entity", "type": "ptr64", "ref": true }] },
        { "name": "SetEntityName", "params": [{ "name": "entity", "type": "ptr64", "ref": true }] }
        "#,
    );

    assert!(synthesize(&pkg).classes.is_empty());
}

#[test]
fn synthesize___different_receiver_types___are_not_merged() {
    let pkg = package(
        r#"
        { "name": "GetEntityHealth", "params": [{ "name": "entity", "type": "ptr64" }] },
        { "name": "SetEntityHealth", "params": [{ "name": "entity", "type": "uint64" }] }
        "#,
    );

    assert!(synthesize(&pkg).classes.is_empty());
}

#[test]
fn synthesize___nested_prefixes___prefers_longest_and_warns() {
    let pkg = package(
        r#"
        { "name": "GetPlayerWeaponAmmo", "params": [{ "name": "p", "type": "ptr64" }] },
        { "name": "SetPlayerWeaponAmmo", "params": [{ "name": "p", "type": "ptr64" }] },
        { "name": "GetPlayerName", "params": [{ "name": "p", "type": "ptr64" }] }
        "#,
    );

    let synthesis = synthesize(&pkg);

    let names: Vec<_> = synthesis.classes.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["PlayerWeapon", "Player"]);
    let weapon = &synthesis.classes[0];
    let methods: Vec<_> = weapon.methods.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(methods, ["GetAmmo", "SetAmmo"]);
    assert_eq!(function_names(&pkg, &synthesis.classes[1]), ["GetPlayerName"]);
    assert_eq!(synthesis.warnings.len(), 2);
    assert!(synthesis.warnings[0].contains("`GetPlayerWeaponAmmo`"));
    assert!(synthesis.warnings[0].contains("`Player`, `PlayerWeapon`"));
}

#[test]
fn synthesize___colliding_method_names___fall_back_to_function_name() {
    let pkg = package(
        r#"
        { "name": "GetEntityHealth", "params": [{ "name": "e", "type": "ptr64" }] },
        { "name": "Get_Entity_Health", "params": [{ "name": "e", "type": "ptr64" }] }
        "#,
    );

    let synthesis = synthesize(&pkg);

    let methods: Vec<_> = synthesis.classes[0]
        .methods
        .iter()
        .map(|m| m.name.as_str())
        .collect();
    assert_eq!(methods, ["GetHealth", "Get_Entity_Health"]);
}

#[test]
fn synthesize___declared_class___comes_first_and_claims_its_functions() {
    let pkg = load(
        r#"{
        "name": "pkg",
        "functions": [
            { "name": "CreateWidget", "return": { "type": "ptr64" } },
            { "name": "DestroyWidget", "params": [{ "name": "w", "type": "ptr64" }] },
            { "name": "GetWidgetSize", "params": [{ "name": "w", "type": "ptr64" }],
              "return": { "type": "int32" } },
            { "name": "GetWidgetName", "params": [{ "name": "w", "type": "ptr64" }],
              "return": { "type": "string" } }
        ],
        "classes": [
            { "name": "Widget", "handleType": "ptr64", "constructors": ["CreateWidget"],
              "destructor": "DestroyWidget",
              "bindings": [{ "name": "Size", "method": "GetWidgetSize", "bindSelf": true }] }
        ]
    }"#,
    )
    .unwrap();

    let synthesis = synthesize(&pkg);

    assert_eq!(synthesis.classes.len(), 1);
    let class = &synthesis.classes[0];
    assert!(!class.synthesized);
    assert_eq!(class.receiver, Receiver::Owned);
    assert_eq!(class.constructors, [0]);
    assert_eq!(class.methods[0].name, "Size");
}

#[test]
fn synthesize___permuted_function_vector___assigns_identically() {
    let pkg = package(
        r#"
        { "name": "GetPlayerWeaponAmmo", "params": [{ "name": "p", "type": "ptr64" }] },
        { "name": "GetEntityHealth", "params": [{ "name": "e", "type": "ptr64" }] },
        { "name": "SetPlayerWeaponAmmo", "params": [{ "name": "p", "type": "ptr64" }] },
        { "name": "DestroyEntity", "params": [{ "name": "e", "type": "ptr64" }] },
        { "name": "GetPlayerName", "params": [{ "name": "p", "type": "ptr64" }] },
        { "name": "SetEntityHealth", "params": [{ "name": "e", "type": "ptr64" }] }
        "#,
    );
    let mut permuted = pkg.clone();
    permuted.functions.reverse();

    let a = synthesize(&pkg);
    let b = synthesize(&permuted);

    let summary = |pkg: &Package, s: &Synthesis| -> Vec<(String, Vec<String>)> {
        s.classes
            .iter()
            .map(|c| (c.name.clone(), function_names(pkg, c)))
            .collect()
    };
    assert_eq!(summary(&pkg, &a), summary(&permuted, &b));
    assert_eq!(a.warnings, b.warnings);
}
