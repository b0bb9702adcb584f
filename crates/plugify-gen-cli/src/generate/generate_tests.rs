#![allow(non_snake_case)]

use super::*;
use crate::config::GenerateSection;
use tempfile::TempDir;

const MANIFEST: &str = r#"{
    "name": "demo",
    "version": "1.0.0",
    "functions": [
        { "name": "Add", "params": [{ "name": "a", "type": "int32" }, { "name": "b", "type": "int32" }],
          "return": { "type": "int32" } }
    ]
}"#;

fn write_manifest(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("demo.pplugin");
    fs::write(&path, MANIFEST).unwrap();
    path
}

fn args(manifest: PathBuf, lang: &str, output: PathBuf) -> GenerateArgs {
    GenerateArgs {
        manifest,
        lang: lang.to_string(),
        output: Some(output),
        ..GenerateArgs::default()
    }
}

// Settings::resolve tests

#[test]
fn Settings___resolve___defaults_without_config() {
    let args = args(PathBuf::from("m.json"), "c", PathBuf::from("out"));

    let settings = Settings::resolve(&args, &CliConfig::default()).unwrap();

    assert_eq!(settings.output, PathBuf::from("out"));
    assert!(!settings.overwrite);
    assert_eq!(settings.options, GeneratorOptions::default());
}

#[test]
fn Settings___resolve___config_fills_missing_flags() {
    let args = GenerateArgs {
        lang: "c".to_string(),
        ..GenerateArgs::default()
    };
    let config = CliConfig {
        generate: GenerateSection {
            classes: Some(false),
            callback_slots: Some(4),
            overwrite: Some(true),
            output: Some(PathBuf::from("from-config")),
        },
    };

    let settings = Settings::resolve(&args, &config).unwrap();

    assert_eq!(settings.output, PathBuf::from("from-config"));
    assert!(settings.overwrite);
    assert!(!settings.options.generate_classes);
    assert_eq!(settings.options.callback_slots, 4);
}

#[test]
fn Settings___resolve___flags_override_config() {
    let args = GenerateArgs {
        output: Some(PathBuf::from("from-flag")),
        callback_slots: Some(9),
        no_classes: true,
        ..GenerateArgs::default()
    };
    let config = CliConfig {
        generate: GenerateSection {
            classes: Some(true),
            callback_slots: Some(4),
            overwrite: None,
            output: Some(PathBuf::from("from-config")),
        },
    };

    let settings = Settings::resolve(&args, &config).unwrap();

    assert_eq!(settings.output, PathBuf::from("from-flag"));
    assert!(!settings.options.generate_classes);
    assert_eq!(settings.options.callback_slots, 9);
}

#[test]
fn Settings___resolve___missing_output_is_error() {
    let result = Settings::resolve(&GenerateArgs::default(), &CliConfig::default());

    assert!(result.is_err());
}

// write_files tests

#[test]
fn write_files___new_directory___creates_it() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("nested").join("bindings");
    let files = Files::from([("a.h".to_string(), "// a\n".to_string())]);

    let written = write_files(&files, &out, false).unwrap();

    assert_eq!(written, [out.join("a.h")]);
    assert_eq!(fs::read_to_string(out.join("a.h")).unwrap(), "// a\n");
}

#[test]
fn write_files___existing_file___refuses_and_writes_nothing() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("b.h"), "keep").unwrap();
    let files = Files::from([
        ("a.h".to_string(), "new a".to_string()),
        ("b.h".to_string(), "new b".to_string()),
    ]);

    let err = write_files(&files, dir.path(), false).unwrap_err();

    assert!(err.to_string().contains("b.h"));
    assert!(!dir.path().join("a.h").exists());
    assert_eq!(fs::read_to_string(dir.path().join("b.h")).unwrap(), "keep");
}

#[test]
fn write_files___existing_file_with_overwrite___replaces_it() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("b.h"), "old").unwrap();
    let files = Files::from([("b.h".to_string(), "new".to_string())]);

    write_files(&files, dir.path(), true).unwrap();

    assert_eq!(fs::read_to_string(dir.path().join("b.h")).unwrap(), "new");
}

// clean_stale_files tests

#[test]
fn clean_stale_files___overwrite___removes_existing_leftovers() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("demo_export.go"), "old").unwrap();
    let names = ["demo_export.go".to_string(), "absent.go".to_string()];

    let stale = clean_stale_files(&names, dir.path(), true).unwrap();

    assert_eq!(stale.removed, [dir.path().join("demo_export.go")]);
    assert!(stale.kept.is_empty());
    assert!(!dir.path().join("demo_export.go").exists());
}

#[test]
fn clean_stale_files___without_overwrite___reports_and_keeps() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("demo_export.go"), "old").unwrap();
    let names = ["demo_export.go".to_string()];

    let stale = clean_stale_files(&names, dir.path(), false).unwrap();

    assert!(stale.removed.is_empty());
    assert_eq!(stale.kept, [dir.path().join("demo_export.go")]);
    assert_eq!(fs::read_to_string(dir.path().join("demo_export.go")).unwrap(), "old");
}

#[test]
fn run___go_rerun_with_overwrite___removes_export_file_no_longer_generated() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(&dir);
    let out = dir.path().join("go");
    fs::create_dir_all(&out).unwrap();
    fs::write(out.join("demo_export.go"), "package demo\n").unwrap();
    let args = GenerateArgs {
        overwrite: true,
        ..args(manifest, "golang", out.clone())
    };

    run(args).unwrap();

    assert!(out.join("demo.go").exists());
    assert!(out.join("demo.h").exists());
    assert!(!out.join("demo_export.go").exists());
}

// run tests

#[test]
fn run___python_target___writes_module() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(&dir);
    let out = dir.path().join("py");

    run(args(manifest, "python", out.clone())).unwrap();

    let code = fs::read_to_string(out.join("demo.py")).unwrap();
    assert!(code.contains("def add(a: int, b: int) -> int:"));
}

#[test]
fn run___c_target___writes_header_and_source() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(&dir);
    let out = dir.path().join("c");

    run(args(manifest, "c", out.clone())).unwrap();

    assert!(out.join("demo.h").exists());
    assert!(out.join("demo.c").exists());
}

#[test]
fn run___second_run_without_overwrite___fails() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(&dir);
    let out = dir.path().join("lua");

    run(args(manifest.clone(), "lua", out.clone())).unwrap();
    let second = run(args(manifest.clone(), "lua", out.clone()));

    assert!(second.is_err());
    let mut again = args(manifest, "lua", out);
    again.overwrite = true;
    assert!(run(again).is_ok());
}

#[test]
fn run___unknown_target___fails_before_writing() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(&dir);
    let out = dir.path().join("none");

    let err = run(args(manifest, "fortran", out.clone())).unwrap_err();

    assert!(format!("{err:#}").contains("fortran"));
    assert!(!out.exists());
}

#[test]
fn run___missing_manifest___names_path() {
    let dir = TempDir::new().unwrap();

    let err = run(args(dir.path().join("absent.json"), "c", dir.path().join("out"))).unwrap_err();

    assert!(format!("{err:#}").contains("absent.json"));
}

#[test]
fn run___invalid_slot_count_from_config___fails() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(&dir);
    let config = dir.path().join("plugify-gen.toml");
    fs::write(&config, "[generate]\ncallback_slots = 0\n").unwrap();
    let mut args = args(manifest, "rust", dir.path().join("rs"));
    args.config = Some(config);

    let err = run(args).unwrap_err();

    assert!(format!("{err:#}").contains("callbackSlots"));
}
