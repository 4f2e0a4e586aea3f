//! The `rawlab preset` command: parameter table, preset validation and
//! creation.

use anyhow::Context;
use clap::{Args, Subcommand};
use rawlab_core::adjust::{load_preset, save_preset};
use rawlab_core::{AdjustmentSpec, Config};
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::{build_spec, expand_path};

/// Arguments for the `preset` command.
#[derive(Args, Debug)]
pub struct PresetArgs {
    #[command(subcommand)]
    pub command: PresetCommand,
}

/// Subcommands for preset management.
#[derive(Subcommand, Debug)]
pub enum PresetCommand {
    /// List every adjustment with its range and default, or a preset's values
    Show {
        /// Preset to display (defaults only when omitted)
        preset: Option<PathBuf>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that a preset file is valid
    Validate {
        /// Preset file
        preset: PathBuf,
    },

    /// Write a new preset from --set assignments
    Create {
        /// Preset name or path; bare names go to the presets directory
        name: PathBuf,

        /// Existing preset to start from
        #[arg(long)]
        from: Option<PathBuf>,

        /// Set an adjustment, e.g. --set vibrance=20 (repeatable)
        #[arg(short, long = "set", value_name = "NAME=VALUE")]
        sets: Vec<String>,

        /// Overwrite an existing preset
        #[arg(long)]
        force: bool,
    },
}

#[derive(Serialize)]
struct ParameterRow {
    name: &'static str,
    value: f32,
    default: f32,
    min: f32,
    max: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit: Option<&'static str>,
}

fn rows(spec: &AdjustmentSpec) -> Vec<ParameterRow> {
    spec.iter()
        .map(|(adj, value)| {
            let (min, max) = adj.range();
            ParameterRow {
                name: adj.name(),
                value,
                default: adj.default_value(),
                min,
                max,
                unit: adj.unit(),
            }
        })
        .collect()
}

/// Resolve a preset argument: bare names live in the presets directory.
fn preset_path(name: &Path) -> PathBuf {
    let expanded = expand_path(name);
    if expanded.components().count() > 1 {
        return expanded;
    }
    let mut path = Config::presets_dir().join(expanded);
    if path.extension().is_none() {
        path.set_extension("json");
    }
    path
}

/// Execute the preset command.
pub async fn execute(args: PresetArgs) -> anyhow::Result<()> {
    match args.command {
        PresetCommand::Show { preset, json } => {
            let spec = match preset {
                Some(path) => {
                    let path = preset_path(&path);
                    load_preset(&path)
                        .with_context(|| format!("Failed to load preset {}", path.display()))?
                }
                None => AdjustmentSpec::default(),
            };
            let table = rows(&spec);
            if json {
                println!("{}", serde_json::to_string_pretty(&table)?);
            } else {
                print_table(&table);
            }
        }

        PresetCommand::Validate { preset } => {
            let path = preset_path(&preset);
            let spec = load_preset(&path)
                .with_context(|| format!("Invalid preset {}", path.display()))?;
            let changed: Vec<String> = spec
                .iter()
                .filter(|(adj, _)| !spec.is_neutral(*adj))
                .map(|(adj, value)| format!("{adj}={value}"))
                .collect();
            if changed.is_empty() {
                println!("{} is valid (no changes from defaults)", path.display());
            } else {
                println!("{} is valid: {}", path.display(), changed.join(", "));
            }
        }

        PresetCommand::Create {
            name,
            from,
            sets,
            force,
        } => {
            let path = preset_path(&name);
            if path.exists() && !force {
                anyhow::bail!(
                    "Preset already exists at: {}\nUse --force to overwrite.",
                    path.display()
                );
            }
            let base = from.as_deref().map(preset_path);
            let spec = build_spec(base.as_deref(), &sets)?;
            save_preset(&path, &spec)?;
            println!("Preset written to {}", path.display());
        }
    }

    Ok(())
}

fn print_table(rows: &[ParameterRow]) {
    println!(
        "  {:<12} {:>9} {:>9} {:>18}  unit",
        "name", "value", "default", "range"
    );
    println!("  {}", "-".repeat(56));
    for row in rows {
        let marker = if row.value != row.default { "*" } else { " " };
        println!(
            "{} {:<12} {:>9} {:>9} {:>18}  {}",
            marker,
            row.name,
            row.value,
            row.default,
            format!("[{}, {}]", row.min, row.max),
            row.unit.unwrap_or("")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rawlab_core::Adjustment;

    #[test]
    fn test_rows_follow_pipeline_order() {
        let spec = AdjustmentSpec::from_pairs([("exposure", 1.5)]).unwrap();
        let table = rows(&spec);
        assert_eq!(table.len(), 13);
        assert_eq!(table[0].name, "temperature");
        assert_eq!(table[0].unit, Some("K"));
        assert_eq!(table[2].value, 1.5);
        assert_eq!(table[12].name, "saturation");
    }

    #[test]
    fn test_preset_path_keeps_explicit_paths() {
        let explicit = Path::new("/tmp/looks/warm.json");
        assert_eq!(preset_path(explicit), explicit);

        let bare = preset_path(Path::new("warm"));
        assert_eq!(bare, Config::presets_dir().join("warm.json"));
    }

    #[tokio::test]
    async fn test_create_then_validate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("punchy.json");

        execute(PresetArgs {
            command: PresetCommand::Create {
                name: path.clone(),
                from: None,
                sets: vec!["contrast=25".to_string(), "vibrance=15".to_string()],
                force: false,
            },
        })
        .await
        .unwrap();

        let spec = load_preset(&path).unwrap();
        assert_eq!(spec.get(Adjustment::Contrast), 25.0);

        let again = execute(PresetArgs {
            command: PresetCommand::Create {
                name: path.clone(),
                from: None,
                sets: vec![],
                force: false,
            },
        })
        .await;
        assert!(again.is_err());

        execute(PresetArgs {
            command: PresetCommand::Validate { preset: path },
        })
        .await
        .unwrap();
    }
}
