#![allow(non_snake_case)]

use super::*;
use plugify_gen_manifest::load;
use test_case::test_case;

fn with_callback(callback: &str) -> Package {
    load(&format!(r#"{{ "name": "pkg", "callbacks": [{callback}] }}"#)).unwrap()
}

#[test]
fn check___plain_callback___is_supported_everywhere() {
    let pkg = with_callback(
        r#"{ "name": "OnTick", "params": [{ "name": "dt", "type": "float" }],
             "return": { "type": "bool" } }"#,
    );

    for target in Target::ALL {
        check(&pkg, target).unwrap();
    }
}

#[test_case("int32[]" ; "array")]
#[test_case("string" ; "owned string")]
fn check___allocating_return___is_rejected_everywhere(ret: &str) {
    let pkg = with_callback(&format!(
        r#"{{ "name": "Produce", "return": {{ "type": "{ret}" }} }}"#
    ));

    for target in Target::ALL {
        let err = check(&pkg, target).unwrap_err();
        assert_eq!(err.error_code(), 4);
        assert!(err.to_string().contains("Produce"));
    }
}

#[test_case(Target::C, true)]
#[test_case(Target::Cpp, true)]
#[test_case(Target::DLang, true)]
#[test_case(Target::Rust, true)]
#[test_case(Target::DotNet, false)]
#[test_case(Target::Golang, false)]
#[test_case(Target::Lua, false)]
#[test_case(Target::Python, false)]
fn check___borrowed_string_return___needs_native_pointers(target: Target, supported: bool) {
    let pkg = with_callback(
        r#"{ "name": "Label", "return": { "type": "string", "ownership": "borrowed" } }"#,
    );

    assert_eq!(check(&pkg, target).is_ok(), supported);
}

#[test_case(Target::Python, false)]
#[test_case(Target::Lua, false)]
#[test_case(Target::DotNet, true)]
#[test_case(Target::Golang, true)]
fn check___shared_return___depends_on_target(target: Target, supported: bool) {
    let pkg = with_callback(r#"{ "name": "Where", "return": { "type": "vec3" } }"#);

    assert_eq!(check(&pkg, target).is_ok(), supported);
}

#[test]
fn check___shared_param___is_rejected_for_lua_only() {
    let pkg = with_callback(r#"{ "name": "OnMove", "params": [{ "name": "to", "type": "vec2" }] }"#);

    assert!(check(&pkg, Target::Lua).is_err());
    assert!(check(&pkg, Target::Python).is_ok());
}

#[test]
fn check___by_ref_param___is_rejected_for_scripted_targets() {
    let pkg = with_callback(
        r#"{ "name": "OnAdjust", "params": [{ "name": "value", "type": "int32", "ref": true }] }"#,
    );

    assert!(check(&pkg, Target::Python).is_err());
    assert!(check(&pkg, Target::Lua).is_err());
    assert!(check(&pkg, Target::Cpp).is_ok());
}

#[test]
fn check___callback_param___needs_native_pointers() {
    let pkg = load(
        r#"{ "name": "pkg", "callbacks": [
            { "name": "Inner" },
            { "name": "Outer", "params": [{ "name": "inner", "type": "Inner" }] }
        ]}"#,
    )
    .unwrap();

    assert!(check(&pkg, Target::Rust).is_ok());
    let err = check(&pkg, Target::DotNet).unwrap_err();
    assert!(err.to_string().contains("Outer"));
}

#[test]
fn emission_order___places_referenced_callbacks_first() {
    let pkg = load(
        r#"{ "name": "pkg", "callbacks": [
            { "name": "Outer", "params": [{ "name": "inner", "type": "Inner" }] },
            { "name": "Plain" },
            { "name": "Inner" }
        ]}"#,
    )
    .unwrap();

    let order: Vec<_> = emission_order(&pkg)
        .into_iter()
        .map(|id| pkg.callback(id).name.as_str())
        .collect();

    assert_eq!(order, ["Plain", "Inner", "Outer"]);
}

#[test]
fn emission_order___without_references___keeps_manifest_order() {
    let pkg = with_callback(r#"{ "name": "B" }, { "name": "A" }"#);

    assert_eq!(emission_order(&pkg), [CallbackId(0), CallbackId(1)]);
}
