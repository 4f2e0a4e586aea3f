//! Configuration management for rawlab.
//!
//! Configuration is loaded from the platform config directory
//! (`config.toml`) and falls back to defaults for anything not set.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for rawlab.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Batch processing settings
    pub processing: ProcessingConfig,

    /// Interactive preview settings
    pub preview: PreviewConfig,

    /// Resource limits
    pub limits: LimitsConfig,

    /// Export settings
    pub export: ExportConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// - macOS: ~/Library/Application Support/com.rawlab.rawlab/config.toml
    /// - Linux: ~/.config/rawlab/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\rawlab\rawlab\config\config.toml
    ///
    /// Falls back to ~/.rawlab/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "rawlab", "rawlab")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".rawlab").join("config.toml")
            })
    }

    /// Directory where presets live by default, next to the config file.
    pub fn presets_dir() -> PathBuf {
        let path = Self::default_path();
        path.parent()
            .map(|p| p.join("presets"))
            .unwrap_or_else(|| PathBuf::from("presets"))
    }

    /// Resolved export directory (with ~ expansion).
    pub fn output_dir(&self) -> PathBuf {
        let path_str = self.export.output_dir.to_string_lossy();
        let expanded = shellexpand::tilde(&path_str);
        PathBuf::from(expanded.into_owned())
    }

    /// Whether `ext` (without dot, any case) is an accepted input extension.
    pub fn is_supported_extension(&self, ext: &str) -> bool {
        let ext = ext.to_lowercase();
        self.processing.supported_formats.iter().any(|f| *f == ext)
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}
