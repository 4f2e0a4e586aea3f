//! Error types for the rawlab adjustment pipeline.
//!
//! Errors are organized by layer: buffer construction, adjustment parameters
//! and pixel stages, per-file batch work, and configuration. Per-file errors
//! carry the path they concern so batch summaries stay actionable.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for rawlab operations.
#[derive(Error, Debug)]
pub enum RawlabError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Per-file pipeline errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Adjustment parameter or stage errors
    #[error("Adjustment error: {0}")]
    Adjust(#[from] AdjustError),

    /// Malformed image buffers
    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),

    /// Invalid output naming templates
    #[error("Naming error: {0}")]
    Naming(#[from] NamingError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A background task panicked or was cancelled
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Errors raised while constructing an [`ImageBuffer`](crate::buffer::ImageBuffer).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    #[error("Image dimensions must be non-zero (got {width}x{height})")]
    ZeroDimension { width: u32, height: u32 },

    #[error("Unsupported channel count: {0} (expected 1-4)")]
    Channels(u8),

    #[error("Pixel data length {actual} does not match {expected} samples")]
    DataLength { expected: usize, actual: usize },
}

/// Errors from adjustment parameters and pixel stages.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdjustError {
    /// The name is not one of the recognized adjustments
    #[error("Unknown adjustment parameter: {0}")]
    UnknownParameter(String),

    /// The value is non-finite or outside the declared range
    #[error("Invalid value {value} for {name} (allowed {min} to {max})")]
    InvalidParameter {
        name: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },

    /// The pipeline cannot process this channel layout or bit depth
    #[error("Unsupported buffer: {channels} channel(s) at {bit_depth}-bit")]
    UnsupportedBuffer { channels: u8, bit_depth: u8 },
}

/// Invalid output naming templates.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NamingError {
    #[error("Naming template must not be empty")]
    Empty,

    #[error("Naming template must not contain path separators: {0}")]
    PathSeparator(String),

    #[error("Unknown token {{{token}}} in naming template")]
    UnknownToken { token: String },

    #[error("Unclosed '{{' in naming template: {0}")]
    Unclosed(String),
}

/// Per-file pipeline errors, organized by stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Image decoding failed
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// Encoding or writing the output failed
    #[error("Encode error for {path}: {message}")]
    Encode { path: PathBuf, message: String },

    /// The adjustment pipeline rejected the image or spec
    #[error("Adjustment failed for {path}: {source}")]
    Adjust {
        path: PathBuf,
        #[source]
        source: AdjustError,
    },

    /// The destination exists and the conflict policy forbids writing
    #[error("Destination already exists: {0}")]
    DestinationConflict(PathBuf),

    /// Operation timed out
    #[error("Timeout in {stage} stage for {path} after {timeout_ms}ms")]
    Timeout {
        path: PathBuf,
        stage: String,
        timeout_ms: u64,
    },

    /// File exceeds size limit
    #[error("File too large: {path} ({size_mb}MB > {max_mb}MB)")]
    FileTooLarge {
        path: PathBuf,
        size_mb: u64,
        max_mb: u64,
    },

    /// Image dimensions exceed limit
    #[error("Image too large: {path} ({width}x{height} > {max_dim})")]
    ImageTooLarge {
        path: PathBuf,
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// Unsupported image format
    #[error("Unsupported format for {path}: {format}")]
    UnsupportedFormat { path: PathBuf, format: String },

    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
}

impl PipelineError {
    /// Short machine-readable label for reports and summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Decode { .. } => "decode",
            PipelineError::Encode { .. } => "encode",
            PipelineError::Adjust { .. } => "adjust",
            PipelineError::DestinationConflict(_) => "destination_conflict",
            PipelineError::Timeout { .. } => "timeout",
            PipelineError::FileTooLarge { .. } => "file_too_large",
            PipelineError::ImageTooLarge { .. } => "image_too_large",
            PipelineError::UnsupportedFormat { .. } => "unsupported_format",
            PipelineError::FileNotFound(_) => "file_not_found",
        }
    }
}

/// Convenience type alias for rawlab results.
pub type Result<T> = std::result::Result<T, RawlabError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameter_message_names_range() {
        let err = AdjustError::InvalidParameter {
            name: "exposure",
            value: 7.0,
            min: -5.0,
            max: 5.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("exposure"));
        assert!(msg.contains("-5"));
    }

    #[test]
    fn test_pipeline_error_kind() {
        let err = PipelineError::DestinationConflict(PathBuf::from("/out/a.jpg"));
        assert_eq!(err.kind(), "destination_conflict");
        assert!(err.to_string().contains("/out/a.jpg"));
    }

    #[test]
    fn test_unknown_token_message() {
        let err = NamingError::UnknownToken {
            token: "date".into(),
        };
        assert_eq!(err.to_string(), "Unknown token {date} in naming template");
    }
}
