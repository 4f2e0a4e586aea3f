//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::batch::ConflictPolicy;
use crate::buffer::ColorSpace;
use crate::export::{OutputFormat, Resize, Sharpening};

/// Processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Number of parallel batch workers
    pub parallel_workers: usize,

    /// Supported input formats (lowercase extensions)
    pub supported_formats: Vec<String>,

    /// Color space decoded sources are tagged with. Selects the transfer
    /// curve used by white balance and exposure.
    pub color_space: ColorSpace,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        let formats = [
            // Raster
            "jpg", "jpeg", "png", "tif", "tiff", "webp",
            // Camera RAW
            "nef", "cr2", "crw", "raf", "dng", "dcr", "mrw", "orf", "pef", "srf", "arw",
        ];
        Self {
            parallel_workers: 4,
            supported_formats: formats.iter().map(|s| s.to_string()).collect(),
            color_space: ColorSpace::Srgb,
        }
    }
}

/// Interactive preview settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Longest side of the downsampled working copy
    pub max_dimension: u32,

    /// Quiet period the worker waits for before picking up the latest
    /// request; every new request restarts it. 0 disables debouncing.
    pub debounce_ms: u64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            max_dimension: 1024,
            debounce_ms: 0,
        }
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum file size in megabytes
    pub max_file_size_mb: u64,

    /// Maximum image dimension (width or height)
    pub max_image_dimension: u32,

    /// Decode timeout in milliseconds
    pub decode_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 200,
            max_image_dimension: 20000,
            decode_timeout_ms: 30000,
        }
    }
}

/// Export settings applied to every batch job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Destination directory (supports `~`)
    pub output_dir: PathBuf,

    /// Output file name template (`{stem}`, `{index}`, `{ext}`)
    pub naming_template: String,

    /// Output encoding
    pub format: OutputFormat,

    /// JPEG quality, 1-100
    pub quality: u8,

    /// What to do when the destination already exists
    pub conflict_policy: ConflictPolicy,

    /// Output sharpening strength
    pub sharpening: Sharpening,

    /// Optional exact output size
    pub resize: Option<Resize>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./edited"),
            naming_template: "{stem}_edited".to_string(),
            format: OutputFormat::Jpeg,
            quality: 90,
            conflict_policy: ConflictPolicy::AutoRename,
            sharpening: Sharpening::None,
            resize: None,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
