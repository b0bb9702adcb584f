#![allow(non_snake_case)]

use super::*;

#[test]
fn ManifestError___parse___display_includes_position() {
    let err = ManifestError::Parse {
        line: 3,
        column: 7,
        message: "expected value".to_string(),
    };

    assert_eq!(
        err.to_string(),
        "manifest parse error at line 3, column 7: expected value"
    );
}

#[test]
fn ManifestError___validation___display_includes_path() {
    let err = ManifestError::validation("functions[1].params[0]", "unknown type `Colour`");

    assert_eq!(
        err.to_string(),
        "manifest validation error at functions[1].params[0]: unknown type `Colour`"
    );
}

#[test]
fn ManifestError___error_code___distinguishes_kinds() {
    let parse = ManifestError::Parse {
        line: 1,
        column: 1,
        message: String::new(),
    };
    let validation = ManifestError::validation("name", "empty");

    assert_eq!(parse.error_code(), 1);
    assert_eq!(validation.error_code(), 2);
}

#[test]
fn ManifestError___from_serde_json___strips_duplicate_position() {
    let json_err = serde_json::from_str::<serde_json::Value>("{\n  \"a\": }").unwrap_err();

    let err = ManifestError::from(json_err);

    match err {
        ManifestError::Parse {
            line,
            column,
            message,
        } => {
            assert_eq!(line, 2);
            assert!(column > 0);
            assert!(!message.contains(" at line "), "message: {message}");
        }
        other => panic!("expected parse error, got {other:?}"),
    }
}
