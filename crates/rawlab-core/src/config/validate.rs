//! Configuration validation with range checks.

use crate::batch::NamingRule;
use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.processing.parallel_workers == 0 {
            return Err(ConfigError::ValidationError(
                "processing.parallel_workers must be > 0".into(),
            ));
        }
        if self.preview.max_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "preview.max_dimension must be > 0".into(),
            ));
        }
        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_file_size_mb must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.limits.decode_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.decode_timeout_ms must be > 0".into(),
            ));
        }
        if !(1..=100).contains(&self.export.quality) {
            return Err(ConfigError::ValidationError(
                "export.quality must be between 1 and 100".into(),
            ));
        }
        if let Err(e) = NamingRule::parse(&self.export.naming_template) {
            return Err(ConfigError::ValidationError(format!(
                "export.naming_template: {e}"
            )));
        }
        if let Some(resize) = &self.export.resize {
            if resize.width == 0 || resize.height == 0 {
                return Err(ConfigError::ValidationError(
                    "export.resize width and height must be > 0".into(),
                ));
            }
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::ValidationError(
                "logging.format must be \"pretty\" or \"json\"".into(),
            ));
        }
        Ok(())
    }
}
