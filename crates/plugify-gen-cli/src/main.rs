//! plugify-gen CLI - Manifest to bindings generator
//!
//! Commands:
//! - `plugify-gen generate` - Write bindings for one target language
//! - `plugify-gen check` - Validate a manifest and report per-target compatibility
//! - `plugify-gen targets` - List supported target languages

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod config;
mod generate;
mod manifest;

#[derive(Parser)]
#[command(name = "plugify-gen")]
#[command(author, version, about = "Generate language bindings from plugin manifests", long_about = None)]
struct Cli {
    /// Log pipeline stages (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate bindings for a target language
    Generate {
        /// Path to the plugin manifest
        #[arg(short, long)]
        manifest: PathBuf,

        /// Target language (c, cpp, dlang, dotnet, golang, lua, python, rust)
        #[arg(short, long)]
        lang: String,

        /// Output directory (falls back to `output` in the config file)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Replace files that already exist
        #[arg(long)]
        overwrite: bool,

        /// Emit the flat function API only
        #[arg(long)]
        no_classes: bool,

        /// Trampolines generated per callback type
        #[arg(long)]
        callback_slots: Option<usize>,

        /// Path to a plugify-gen.toml config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Validate a manifest
    Check {
        /// Path to the plugin manifest
        #[arg(short, long)]
        manifest: PathBuf,
    },

    /// List supported target languages
    Targets,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Generate {
            manifest,
            lang,
            output,
            overwrite,
            no_classes,
            callback_slots,
            config,
        } => {
            generate::run(generate::GenerateArgs {
                manifest,
                lang,
                output,
                overwrite,
                no_classes,
                callback_slots,
                config,
            })?;
        }
        Commands::Check { manifest } => {
            manifest::check(&manifest)?;
        }
        Commands::Targets => {
            for target in plugify_gen::supported_targets() {
                println!("{target}");
            }
        }
    }

    Ok(())
}
