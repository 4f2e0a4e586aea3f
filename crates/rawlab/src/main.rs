//! rawlab CLI - batch photo adjustments with live preview.
//!
//! # Usage
//!
//! ```bash
//! # Export a folder with a preset and one tweak
//! rawlab process ./shoot --preset warm.json --set exposure=0.5 -o ./edited
//!
//! # Render a single preview frame
//! rawlab preview IMG_0042.jpg --set clarity=30 -o preview.png
//!
//! # Inspect the adjustment parameters
//! rawlab preset show
//!
//! # View configuration
//! rawlab config show
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use rawlab_core::Config;
use std::path::{Path, PathBuf};

mod cli;
mod logging;

/// rawlab - non-destructive batch photo adjustments.
#[derive(Parser, Debug)]
#[command(name = "rawlab")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true, env = "RAWLAB_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply adjustments to images and export them
    Process(cli::process::ProcessArgs),

    /// Render one preview frame of an image
    Preview(cli::preview::PreviewArgs),

    /// Inspect, validate and create adjustment presets
    Preset(cli::preset::PresetArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // `config init` may be pointed at a file that doesn't exist yet.
    let allow_missing = matches!(cli.command, Commands::Config(_));
    let config = load_config(cli.config.as_deref(), allow_missing)?;
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("rawlab v{}", rawlab_core::VERSION);

    match cli.command {
        Commands::Process(args) => cli::process::execute(args, config).await,
        Commands::Preview(args) => cli::preview::execute(args, config).await,
        Commands::Preset(args) => cli::preset::execute(args).await,
        Commands::Config(args) => cli::config::execute(args, cli.config).await,
    }
}

/// Load the configuration. A file named with `--config` must parse; only the
/// default location falls back to built-in defaults.
fn load_config(explicit: Option<&Path>, allow_missing: bool) -> anyhow::Result<Config> {
    match explicit {
        Some(path) if !path.exists() && allow_missing => Ok(Config::default()),
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(Config::load().unwrap_or_else(|e| {
            // Logging isn't initialized yet.
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `rawlab config path`."
            );
            Config::default()
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_config_must_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[export\nquality = ").unwrap();
        assert!(load_config(Some(&path), false).is_err());
        assert!(load_config(Some(&path), true).is_err());

        std::fs::write(&path, "[export]\nquality = 70\n").unwrap();
        assert_eq!(load_config(Some(&path), false).unwrap().export.quality, 70);
    }

    #[test]
    fn test_missing_explicit_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(load_config(Some(&path), false).is_err());
        assert_eq!(load_config(Some(&path), true).unwrap().export.quality, 90);
    }
}
