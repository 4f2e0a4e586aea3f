//! Command implementations.

pub mod config;
pub mod preset;
pub mod preview;
pub mod process;

use anyhow::Context;
use rawlab_core::{Adjustment, AdjustmentSpec};
use std::path::{Path, PathBuf};

/// Expand `~` in a user-supplied path.
pub(crate) fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
}

/// Parse one `name=value` assignment from `--set`.
pub(crate) fn parse_assignment(s: &str) -> anyhow::Result<(Adjustment, f32)> {
    let (name, value) = s
        .split_once('=')
        .with_context(|| format!("Expected name=value, got '{s}'"))?;
    let adj = Adjustment::from_name(name.trim())?;
    let value: f32 = value
        .trim()
        .parse()
        .with_context(|| format!("Invalid number for {adj}: '{}'", value.trim()))?;
    Ok((adj, value))
}

/// Start from a preset (or defaults) and apply `--set` assignments in order.
pub(crate) fn build_spec(preset: Option<&Path>, sets: &[String]) -> anyhow::Result<AdjustmentSpec> {
    let mut spec = match preset {
        Some(path) => {
            let path = expand_path(path);
            rawlab_core::adjust::load_preset(&path)
                .with_context(|| format!("Failed to load preset {}", path.display()))?
        }
        None => AdjustmentSpec::default(),
    };
    for assignment in sets {
        let (adj, value) = parse_assignment(assignment)?;
        spec.set(adj, value)?;
    }
    Ok(spec)
}
