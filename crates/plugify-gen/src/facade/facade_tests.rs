#![allow(non_snake_case)]

use super::*;
use test_case::test_case;

const ENTITY: &str = r#"{
    "name": "world",
    "version": "2.0.0",
    "functions": [
        { "name": "GetEntityHealth", "params": [{ "name": "entity", "type": "ptr64" }],
          "return": { "type": "int32" } },
        { "name": "SetEntityHealth", "params": [{ "name": "entity", "type": "ptr64" },
          { "name": "hp", "type": "int32" }] },
        { "name": "DestroyEntity", "params": [{ "name": "entity", "type": "ptr64" }] }
    ]
}"#;

#[test]
fn convert___valid_manifest___returns_files() {
    let conversion = convert(ENTITY, "rust", &GeneratorOptions::default()).unwrap();

    assert_eq!(conversion.files.keys().collect::<Vec<_>>(), ["world.rs"]);
    assert!(conversion.warnings.is_empty());
    assert!(conversion.files["world.rs"].contains("pub struct Entity"));
}

#[test_case("golang", &["world_export.go"] ; "go without callbacks")]
#[test_case("rust", &[] ; "rust")]
fn convert___omitted_optional_files___are_reported_stale(target: &str, expected: &[&str]) {
    let conversion = convert(ENTITY, target, &GeneratorOptions::default()).unwrap();

    assert_eq!(conversion.stale_files, expected);
}

#[test]
fn convert___go_with_callbacks___has_no_stale_files() {
    let manifest = r#"{
        "name": "world",
        "version": "2.0.0",
        "callbacks": [{ "name": "OnTick", "params": [{ "name": "tick", "type": "int32" }] }],
        "functions": [
            { "name": "Every", "params": [{ "name": "cb", "type": "OnTick" }] }
        ]
    }"#;

    let conversion = convert(manifest, "golang", &GeneratorOptions::default()).unwrap();

    assert!(conversion.files.contains_key("world_export.go"));
    assert!(conversion.stale_files.is_empty());
}

#[test]
fn convert___classes_disabled___emits_flat_api_only() {
    let options = GeneratorOptions::default().with_classes(false);

    let conversion = convert(ENTITY, "python", &options).unwrap();

    let code = &conversion.files["world.py"];
    assert!(code.contains("def get_entity_health("));
    assert!(!code.contains("class Entity"));
}

#[test]
fn convert___target_alias___is_accepted() {
    let conversion = convert(ENTITY, "C#", &GeneratorOptions::default()).unwrap();

    assert!(conversion.files.contains_key("World.cs"));
}

#[test]
fn convert___unknown_target___is_unsupported_target_error() {
    let err = convert(ENTITY, "fortran", &GeneratorOptions::default()).unwrap_err();

    assert_eq!(err.kind(), "UnsupportedTargetError");
}

#[test]
fn convert___malformed_json___is_parse_error() {
    let err = convert("{ \"name\": ", "c", &GeneratorOptions::default()).unwrap_err();

    assert_eq!(err.kind(), "ManifestParseError");
}

#[test]
fn convert___unknown_type___is_validation_error() {
    let text = r#"{ "name": "pkg", "functions": [{ "name": "F", "params": [{ "name": "v", "type": "quaternion" }] }] }"#;

    let err = convert(text, "c", &GeneratorOptions::default()).unwrap_err();

    assert_eq!(err.kind(), "ManifestValidationError");
    assert!(err.to_string().contains("functions[0].params[0]"));
}

#[test_case(0)]
#[test_case(257)]
fn convert___slot_count_out_of_range___is_invalid_options(slots: usize) {
    let options = GeneratorOptions::default().with_callback_slots(slots);

    let err = convert(ENTITY, "c", &options).unwrap_err();

    assert_eq!(err.kind(), "InvalidOptionsError");
}

#[test]
fn convert___c_target___ignores_class_option() {
    let conversion = convert(ENTITY, "c", &GeneratorOptions::default()).unwrap();

    assert!(conversion.warnings.is_empty());
    assert!(!conversion.files["world.h"].contains("Entity_GetHealth"));
}

#[test]
fn convert_to_json___success___has_files_and_no_error() {
    let json = convert_to_json(ENTITY, "lua", "");

    let result: ConvertResult = serde_json::from_str(&json).unwrap();
    assert!(result.success);
    assert!(result.error.is_none());
    assert!(result.files.contains_key("world.lua"));
}

#[test]
fn convert_to_json___failure___has_error_and_no_files() {
    let json = convert_to_json(ENTITY, "cobol", "");

    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["success"], false);
    assert!(value["error"].as_str().unwrap().contains("cobol"));
    assert!(value.get("files").is_none());
}

#[test]
fn convert_to_json___camel_case_options___are_applied() {
    let json = convert_to_json(ENTITY, "python", r#"{ "generateClasses": false }"#);

    let result: ConvertResult = serde_json::from_str(&json).unwrap();
    assert!(!result.files["world.py"].contains("class Entity"));
}

#[test]
fn convert_to_json___malformed_options___is_reported() {
    let json = convert_to_json(ENTITY, "python", "{ not json");

    let result: ConvertResult = serde_json::from_str(&json).unwrap();
    assert!(!result.success);
    assert!(result.error.unwrap().starts_with("invalid options"));
}

#[test]
fn supported_targets___lists_every_target() {
    assert_eq!(
        supported_targets(),
        ["c", "cpp", "dlang", "dotnet", "golang", "lua", "python", "rust"]
    );
}

#[test]
fn version___matches_crate_version() {
    assert_eq!(version(), env!("CARGO_PKG_VERSION"));
}
