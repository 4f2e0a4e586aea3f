//! Export-time options and the stages applied after the adjustment pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::adjust::filters::gaussian_blur;
use crate::buffer::ImageBuffer;

/// Encoded output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    #[serde(alias = "jpg")]
    Jpeg,
    Png,
    #[serde(alias = "tif")]
    Tiff,
}

impl OutputFormat {
    /// Parse format from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "tiff" | "tif" => Some(Self::Tiff),
            _ => None,
        }
    }

    /// File extension written for this format.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Tiff => "tif",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Tiff => "tiff",
        })
    }
}

/// Output sharpening preset (unsharp mask strength).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sharpening {
    #[default]
    None,
    Low,
    Standard,
    High,
}

impl Sharpening {
    pub fn amount(self) -> f32 {
        match self {
            Sharpening::None => 0.0,
            Sharpening::Low => 0.5,
            Sharpening::Standard => 1.0,
            Sharpening::High => 1.5,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" | "off" => Some(Self::None),
            "low" => Some(Self::Low),
            "standard" => Some(Self::Standard),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// Exact output dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resize {
    pub width: u32,
    pub height: u32,
}

/// Per-job export settings. Encoder settings such as JPEG quality belong to
/// the [`ImageEncoder`](crate::codec::ImageEncoder) instead.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    pub format: OutputFormat,
    pub resize: Option<Resize>,
    pub sharpening: Sharpening,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Jpeg,
            resize: None,
            sharpening: Sharpening::None,
        }
    }
}

impl From<&crate::config::ExportConfig> for ExportOptions {
    fn from(config: &crate::config::ExportConfig) -> Self {
        Self {
            format: config.format,
            resize: config.resize,
            sharpening: config.sharpening,
        }
    }
}

impl ExportOptions {
    /// Run resize then sharpening. Returns the input unchanged when neither
    /// is configured.
    pub fn apply(&self, image: &ImageBuffer) -> ImageBuffer {
        let mut out = match self.resize {
            Some(size) => image.resized(size.width, size.height),
            None => image.clone(),
        };
        if self.sharpening != Sharpening::None {
            out = unsharp_mask(&out, self.sharpening.amount());
        }
        out
    }
}

/// `v + amount * (v - gauss_σ1(v))` on color channels; alpha is kept.
pub fn unsharp_mask(image: &ImageBuffer, amount: f32) -> ImageBuffer {
    let channels = image.channels() as usize;
    let color_channels = if image.has_alpha() {
        channels - 1
    } else {
        channels
    };
    let samples = image.to_unit_f32();
    let blurred = gaussian_blur(
        &samples,
        image.width() as usize,
        image.height() as usize,
        channels,
        1.0,
    );
    let sharpened: Vec<f32> = samples
        .iter()
        .zip(&blurred)
        .enumerate()
        .map(|(i, (&v, &b))| {
            if i % channels < color_channels {
                (v + amount * (v - b)).clamp(0.0, 1.0)
            } else {
                v
            }
        })
        .collect();
    image.with_unit_f32(&sharpened)
}
