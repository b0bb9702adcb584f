#![allow(non_snake_case)]

use super::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn CliConfig___from_str___parses_generate_section() {
    let toml = r#"
[generate]
classes = false
callback_slots = 32
overwrite = true
output = "bindings"
"#;

    let config = CliConfig::from_str(toml).unwrap();

    assert_eq!(config.generate.classes, Some(false));
    assert_eq!(config.generate.callback_slots, Some(32));
    assert_eq!(config.generate.overwrite, Some(true));
    assert_eq!(config.generate.output, Some(PathBuf::from("bindings")));
}

#[test]
fn CliConfig___from_str___empty_file_is_default() {
    let config = CliConfig::from_str("").unwrap();

    assert_eq!(config, CliConfig::default());
}

#[test]
fn CliConfig___from_str___rejects_unknown_keys() {
    let result = CliConfig::from_str("[generate]\nslots = 4\n");

    assert!(result.is_err());
}

#[test]
fn CliConfig___from_str___rejects_wrong_value_type() {
    let result = CliConfig::from_str("[generate]\nclasses = \"yes\"\n");

    assert!(result.is_err());
}

#[test]
fn CliConfig___load___none_is_default() {
    let config = CliConfig::load(None).unwrap();

    assert_eq!(config, CliConfig::default());
}

#[test]
fn CliConfig___load___reads_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("plugify-gen.toml");
    fs::write(&path, "[generate]\ncallback_slots = 8\n").unwrap();

    let config = CliConfig::load(Some(&path)).unwrap();

    assert_eq!(config.generate.callback_slots, Some(8));
}

#[test]
fn CliConfig___load___missing_file_names_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");

    let err = CliConfig::load(Some(&path)).unwrap_err();

    assert!(format!("{err:#}").contains("absent.toml"));
}
