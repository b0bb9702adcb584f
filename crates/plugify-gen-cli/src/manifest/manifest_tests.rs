#![allow(non_snake_case)]

use super::*;
use std::fs;
use tempfile::TempDir;

const GAME: &str = r#"{
    "name": "game",
    "version": "1.2.0",
    "callbacks": [{ "name": "OnHit", "params": [{ "name": "damage", "type": "int32", "ref": true }] }],
    "functions": [
        { "name": "GetEntityHealth", "params": [{ "name": "entity", "type": "ptr64" }],
          "return": { "type": "int32" } },
        { "name": "DestroyEntity", "params": [{ "name": "entity", "type": "ptr64" }] },
        { "name": "SetHitCallback", "params": [{ "name": "callback", "type": "OnHit" }] }
    ]
}"#;

#[test]
fn CheckReport___inspect___counts_declarations() {
    let report = CheckReport::inspect(GAME).unwrap();

    assert_eq!(report.name, "game");
    assert_eq!(report.version, "1.2.0");
    assert_eq!(report.enums, 0);
    assert_eq!(report.callbacks, 1);
    assert_eq!(report.functions, 3);
    assert_eq!(report.declared_classes, 0);
    assert_eq!(report.synthesized_classes, 1);
}

#[test]
fn CheckReport___inspect___reports_every_target() {
    let report = CheckReport::inspect(GAME).unwrap();

    let targets: Vec<_> = report.targets.iter().map(|(t, _)| *t).collect();
    assert_eq!(targets, Target::ALL);
}

#[test]
fn CheckReport___inspect___by_ref_callback_param_fails_scripting_targets_only() {
    let report = CheckReport::inspect(GAME).unwrap();

    for (target, outcome) in &report.targets {
        match target {
            Target::Python | Target::Lua => assert!(outcome.is_err(), "{target}"),
            Target::Rust | Target::C | Target::Cpp => assert!(outcome.is_ok(), "{target}"),
            _ => {}
        }
    }
}

#[test]
fn CheckReport___inspect___invalid_manifest_is_error() {
    let err = CheckReport::inspect(r#"{ "version": "1.0.0" }"#).unwrap_err();

    assert!(format!("{err:#}").starts_with("Manifest is invalid"));
}

#[test]
fn check___valid_file___succeeds() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("game.pplugin");
    fs::write(&path, GAME).unwrap();

    assert!(check(&path).is_ok());
}

#[test]
fn check___missing_file___names_path() {
    let dir = TempDir::new().unwrap();

    let err = check(&dir.path().join("absent.pplugin")).unwrap_err();

    assert!(format!("{err:#}").contains("absent.pplugin"));
}
