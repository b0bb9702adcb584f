//! `check` command: manifest validation and per-target compatibility

use anyhow::{Context, Result};
use plugify_gen::{GeneratorOptions, Target, convert, synthesize};
use plugify_gen_manifest::{Package, load};
use std::path::Path;

/// What `check` reports about a valid manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub name: String,
    pub version: String,
    pub enums: usize,
    pub callbacks: usize,
    pub functions: usize,
    pub declared_classes: usize,
    pub synthesized_classes: usize,
    pub warnings: Vec<String>,
    /// Conversion outcome per target; `Err` holds the reason it fails
    pub targets: Vec<(Target, Result<(), String>)>,
}

impl CheckReport {
    /// Validate `text` and try it against every target.
    pub fn inspect(text: &str) -> Result<Self> {
        let pkg: Package = load(text).context("Manifest is invalid")?;
        let synthesis = synthesize(&pkg);

        let options = GeneratorOptions::default();
        let targets = Target::ALL
            .into_iter()
            .map(|target| {
                let outcome = convert(text, target.id(), &options)
                    .map(drop)
                    .map_err(|e| e.to_string());
                (target, outcome)
            })
            .collect();

        Ok(Self {
            name: pkg.name,
            version: pkg.version,
            enums: pkg.enums.len(),
            callbacks: pkg.callbacks.len(),
            functions: pkg.functions.len(),
            declared_classes: pkg.classes.len(),
            synthesized_classes: synthesis
                .classes
                .iter()
                .filter(|class| class.synthesized)
                .count(),
            warnings: synthesis.warnings,
            targets,
        })
    }
}

/// Check command implementation
pub fn check(manifest_path: &Path) -> Result<()> {
    println!("Checking manifest: {}", manifest_path.display());

    let text = std::fs::read_to_string(manifest_path)
        .with_context(|| format!("Failed to read manifest: {manifest_path:?}"))?;
    let report = CheckReport::inspect(&text)?;

    println!("✓ Package: {} v{}", report.name, report.version);
    println!("✓ Enums: {}", report.enums);
    println!("✓ Callbacks: {}", report.callbacks);
    println!("✓ Functions: {}", report.functions);
    println!(
        "✓ Classes: {} declared, {} synthesized",
        report.declared_classes, report.synthesized_classes
    );
    for warning in &report.warnings {
        println!("⚠ {warning}");
    }

    println!("\nTargets:");
    for (target, outcome) in &report.targets {
        match outcome {
            Ok(()) => println!("  ✓ {target}"),
            Err(reason) => println!("  ✗ {target}: {reason}"),
        }
    }
    println!("\nManifest is valid!");

    Ok(())
}

#[cfg(test)]
#[path = "manifest/manifest_tests.rs"]
mod manifest_tests;
