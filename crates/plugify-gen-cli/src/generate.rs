//! `generate` command: convert a manifest and write the file map to disk

use crate::config::CliConfig;
use anyhow::{Context, Result};
use plugify_gen::{DEFAULT_CALLBACK_SLOTS, Files, GeneratorOptions, Target, convert};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Arguments of the `generate` command as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct GenerateArgs {
    pub manifest: PathBuf,
    pub lang: String,
    pub output: Option<PathBuf>,
    pub overwrite: bool,
    pub no_classes: bool,
    pub callback_slots: Option<usize>,
    pub config: Option<PathBuf>,
}

/// Command-line flags merged over the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub output: PathBuf,
    pub overwrite: bool,
    pub options: GeneratorOptions,
}

impl Settings {
    pub fn resolve(args: &GenerateArgs, config: &CliConfig) -> Result<Self> {
        let section = &config.generate;

        let output = args
            .output
            .clone()
            .or_else(|| section.output.clone())
            .context("No output directory: pass --output or set `output` under [generate]")?;

        let classes = !args.no_classes && section.classes.unwrap_or(true);
        let slots = args
            .callback_slots
            .or(section.callback_slots)
            .unwrap_or(DEFAULT_CALLBACK_SLOTS);

        Ok(Self {
            output,
            overwrite: args.overwrite || section.overwrite.unwrap_or(false),
            options: GeneratorOptions::new()
                .with_classes(classes)
                .with_callback_slots(slots),
        })
    }
}

/// Generate command implementation
pub fn run(args: GenerateArgs) -> Result<()> {
    let config = CliConfig::load(args.config.as_deref())?;
    let settings = Settings::resolve(&args, &config)?;
    let target: Target = args.lang.parse()?;

    println!("Generating {} bindings from {:?}", target, args.manifest);

    let text = fs::read_to_string(&args.manifest)
        .with_context(|| format!("Failed to read manifest: {:?}", args.manifest))?;

    let conversion = convert(&text, target.id(), &settings.options)
        .with_context(|| format!("Failed to generate {target} bindings"))?;

    for warning in &conversion.warnings {
        warn!("{warning}");
        println!("⚠ {warning}");
    }

    let written = write_files(&conversion.files, &settings.output, settings.overwrite)?;
    for path in &written {
        println!("✓ {}", path.display());
    }

    let stale = clean_stale_files(&conversion.stale_files, &settings.output, settings.overwrite)?;
    for path in &stale.removed {
        println!("✗ removed stale {}", path.display());
    }
    for path in &stale.kept {
        println!("⚠ stale file left in place: {} (pass --overwrite)", path.display());
    }
    println!(
        "\nWrote {} file(s) to {}",
        written.len(),
        settings.output.display()
    );

    Ok(())
}

/// Write every file under `dir`, creating directories as needed.
///
/// Existing files are only replaced with `overwrite`; the check covers the whole map before
/// anything is written.
pub fn write_files(files: &Files, dir: &Path, overwrite: bool) -> Result<Vec<PathBuf>> {
    let paths: Vec<PathBuf> = files.keys().map(|name| dir.join(name)).collect();

    if !overwrite {
        let existing: Vec<String> = paths
            .iter()
            .filter(|p| p.exists())
            .map(|p| p.display().to_string())
            .collect();
        if !existing.is_empty() {
            anyhow::bail!(
                "Refusing to overwrite existing file(s): {} (pass --overwrite)",
                existing.join(", ")
            );
        }
    }

    for (path, contents) in paths.iter().zip(files.values()) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {parent:?}"))?;
        }
        fs::write(path, contents).with_context(|| format!("Failed to write {path:?}"))?;
        debug!(path = %path.display(), bytes = contents.len(), "wrote file");
    }

    Ok(paths)
}

/// Outcome of [`clean_stale_files`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct StaleFiles {
    pub removed: Vec<PathBuf>,
    pub kept: Vec<PathBuf>,
}

/// Deal with leftovers from an earlier run that this run no longer produces.
///
/// With `overwrite` they are deleted; otherwise they are only reported.
pub fn clean_stale_files(names: &[String], dir: &Path, overwrite: bool) -> Result<StaleFiles> {
    let mut stale = StaleFiles::default();
    for path in names.iter().map(|name| dir.join(name)).filter(|p| p.exists()) {
        if overwrite {
            fs::remove_file(&path).with_context(|| format!("Failed to remove {path:?}"))?;
            debug!(path = %path.display(), "removed stale file");
            stale.removed.push(path);
        } else {
            warn!(path = %path.display(), "stale file left in place");
            stale.kept.push(path);
        }
    }
    Ok(stale)
}

#[cfg(test)]
#[path = "generate/generate_tests.rs"]
mod generate_tests;
