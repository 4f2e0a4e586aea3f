//! Adjustment presets stored as flat JSON objects (`{"exposure": 0.5, ...}`).

use std::path::Path;

use super::AdjustmentSpec;
use crate::error::Result;

/// Write `spec` to `path` as pretty-printed JSON, creating parent dirs.
pub fn save_preset(path: &Path, spec: &AdjustmentSpec) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(spec)?;
    std::fs::write(path, json)?;
    tracing::info!("Preset saved to {:?}", path);
    Ok(())
}

/// Read and validate a preset. Names absent from the file take defaults.
pub fn load_preset(path: &Path) -> Result<AdjustmentSpec> {
    let content = std::fs::read_to_string(path)?;
    let spec: AdjustmentSpec = serde_json::from_str(&content)?;
    tracing::debug!("Preset loaded from {:?}", path);
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adjust::Adjustment;
    use crate::error::RawlabError;

    #[test]
    fn test_preset_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("presets").join("warm.json");
        let spec = AdjustmentSpec::from_pairs([("temperature", 6500.0), ("vibrance", 20.0)]).unwrap();

        save_preset(&path, &spec).unwrap();
        let loaded = load_preset(&path).unwrap();
        assert_eq!(loaded, spec);
        assert_eq!(loaded.get(Adjustment::Vibrance), 20.0);
    }

    #[test]
    fn test_load_preset_rejects_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"exposure": 9.0}"#).unwrap();
        assert!(matches!(load_preset(&path), Err(RawlabError::Json(_))));
    }

    #[test]
    fn test_load_missing_preset_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_preset(&dir.path().join("nope.json"));
        assert!(matches!(result, Err(RawlabError::Io(_))));
    }
}
