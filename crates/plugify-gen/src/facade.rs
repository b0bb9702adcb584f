//! Generator facade: manifest text in, file map out.

use crate::classes::{Synthesis, synthesize};
use crate::codegen::{self, Files, VERSION};
use crate::error::{GenError, GenResult};
use crate::naming::sanitize_identifier;
use crate::options::GeneratorOptions;
use crate::target::Target;
use plugify_gen_manifest::load;
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span};

/// Output of a successful conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    /// Generated files keyed by file name
    pub files: Files,

    /// Non-fatal notes, such as ambiguous class grouping
    pub warnings: Vec<String>,

    /// Files the target can emit for this package that this run left out; copies from an
    /// earlier run are stale
    pub stale_files: Vec<String>,
}

/// Convert `manifest_text` into bindings for `target`.
///
/// Identical inputs produce byte-identical output. The first fatal error stops the
/// conversion; no partial file map is ever returned.
pub fn convert(
    manifest_text: &str,
    target: &str,
    options: &GeneratorOptions,
) -> GenResult<Conversion> {
    let span = debug_span!("convert", target = %target);
    let _guard = span.enter();

    options.validate()?;
    let target: Target = target.parse()?;
    let pkg = load(manifest_text)?;

    let Synthesis { classes, warnings } = if options.generate_classes && target.supports_classes() {
        synthesize(&pkg)
    } else {
        Synthesis::default()
    };

    let files = codegen::generate(&pkg, &classes, target, options)?;
    let stale_files: Vec<String> = target
        .optional_files(&sanitize_identifier(&pkg.name))
        .into_iter()
        .filter(|name| !files.contains_key(name))
        .collect();
    debug!(
        package = %pkg.name,
        files = files.len(),
        warnings = warnings.len(),
        stale = stale_files.len(),
        "conversion finished"
    );
    Ok(Conversion {
        files,
        warnings,
        stale_files,
    })
}

/// Boundary form of a conversion, serialized as JSON by [`convert_to_json`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertResult {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Files::is_empty")]
    pub files: Files,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ConvertResult {
    pub fn ok(conversion: Conversion) -> Self {
        Self {
            success: true,
            files: conversion.files,
            error: None,
            warnings: conversion.warnings,
        }
    }

    pub fn failed(error: &GenError) -> Self {
        Self {
            success: false,
            files: Files::new(),
            error: Some(error.to_string()),
            warnings: Vec::new(),
        }
    }
}

impl From<GenResult<Conversion>> for ConvertResult {
    fn from(result: GenResult<Conversion>) -> Self {
        match result {
            Ok(conversion) => Self::ok(conversion),
            Err(err) => Self::failed(&err),
        }
    }
}

/// Convert with JSON options and return the JSON-encoded [`ConvertResult`].
///
/// Malformed options are reported in the result like any other failure.
pub fn convert_to_json(manifest_text: &str, target: &str, options_json: &str) -> String {
    let result: ConvertResult = GeneratorOptions::from_json(options_json.as_bytes())
        .and_then(|options| convert(manifest_text, target, &options))
        .into();
    match serde_json::to_string(&result) {
        Ok(json) => json,
        // unreachable for a map of strings
        Err(err) => format!(
            r#"{{"success":false,"error":{}}}"#,
            serde_json::Value::String(err.to_string())
        ),
    }
}

/// Identifiers accepted by [`convert`].
pub fn supported_targets() -> Vec<&'static str> {
    crate::target::supported_targets()
}

/// Generator version.
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
#[path = "facade/facade_tests.rs"]
mod facade_tests;
