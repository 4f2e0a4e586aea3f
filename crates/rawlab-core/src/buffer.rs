//! Immutable decoded-pixel container shared by preview and batch paths.
//!
//! An [`ImageBuffer`] owns its samples behind an `Arc`, so cloning is cheap
//! and the same source can be handed to the preview worker and batch workers
//! at once. Nothing mutates a buffer after construction: every adjustment
//! stage produces a new one.

use image::imageops::FilterType;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::BufferError;

/// Sample bit depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitDepth {
    Eight,
    Sixteen,
}

impl BitDepth {
    /// Number of bits per sample.
    pub fn bits(self) -> u8 {
        match self {
            BitDepth::Eight => 8,
            BitDepth::Sixteen => 16,
        }
    }

    /// Largest representable sample value.
    pub fn max_value(self) -> f32 {
        match self {
            BitDepth::Eight => u8::MAX as f32,
            BitDepth::Sixteen => u16::MAX as f32,
        }
    }
}

/// Color space tag carried with the pixels.
///
/// Only the transfer curve is used (to linearize for exposure and white
/// balance); no gamut conversion happens anywhere in the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    #[default]
    Srgb,
    #[serde(alias = "adobe")]
    AdobeRgb,
    ProPhoto,
    Linear,
}

impl ColorSpace {
    /// Parse a user-facing name (`srgb`, `adobe`, `prophoto`, `linear`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "srgb" => Some(ColorSpace::Srgb),
            "adobe" | "adobergb" => Some(ColorSpace::AdobeRgb),
            "prophoto" | "prophotorgb" => Some(ColorSpace::ProPhoto),
            "linear" => Some(ColorSpace::Linear),
            _ => None,
        }
    }

    /// Convert an encoded value in [0, 1] to linear light.
    #[inline]
    pub fn to_linear(self, v: f32) -> f32 {
        match self {
            ColorSpace::Srgb => {
                if v <= 0.04045 {
                    v / 12.92
                } else {
                    ((v + 0.055) / 1.055).powf(2.4)
                }
            }
            ColorSpace::AdobeRgb => v.max(0.0).powf(563.0 / 256.0),
            ColorSpace::ProPhoto => {
                if v < 16.0 / 512.0 {
                    v / 16.0
                } else {
                    v.powf(1.8)
                }
            }
            ColorSpace::Linear => v,
        }
    }

    /// Convert a linear-light value in [0, 1] back to the encoded curve.
    #[inline]
    pub fn from_linear(self, v: f32) -> f32 {
        match self {
            ColorSpace::Srgb => {
                if v <= 0.003_130_8 {
                    v * 12.92
                } else {
                    1.055 * v.powf(1.0 / 2.4) - 0.055
                }
            }
            ColorSpace::AdobeRgb => v.max(0.0).powf(256.0 / 563.0),
            ColorSpace::ProPhoto => {
                if v < 1.0 / 512.0 {
                    v * 16.0
                } else {
                    v.powf(1.0 / 1.8)
                }
            }
            ColorSpace::Linear => v,
        }
    }
}

/// Raw sample storage, one variant per supported bit depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PixelData {
    U8(Arc<[u8]>),
    U16(Arc<[u16]>),
}

impl PixelData {
    fn len(&self) -> usize {
        match self {
            PixelData::U8(d) => d.len(),
            PixelData::U16(d) => d.len(),
        }
    }
}

/// Decoded image: dimensions, channel layout, bit depth, color space, pixels.
///
/// Pixels are row-major and interleaved (`RGBRGB…`). Channel counts 1 (gray),
/// 2 (gray + alpha), 3 (RGB) and 4 (RGBA) can be represented; the adjustment
/// pipeline itself accepts only RGB and RGBA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBuffer {
    width: u32,
    height: u32,
    channels: u8,
    color_space: ColorSpace,
    data: PixelData,
}

impl ImageBuffer {
    /// Build an 8-bit buffer.
    pub fn new_u8(
        width: u32,
        height: u32,
        channels: u8,
        color_space: ColorSpace,
        data: Vec<u8>,
    ) -> Result<Self, BufferError> {
        Self::new(width, height, channels, color_space, PixelData::U8(data.into()))
    }

    /// Build a 16-bit buffer.
    pub fn new_u16(
        width: u32,
        height: u32,
        channels: u8,
        color_space: ColorSpace,
        data: Vec<u16>,
    ) -> Result<Self, BufferError> {
        Self::new(
            width,
            height,
            channels,
            color_space,
            PixelData::U16(data.into()),
        )
    }

    fn new(
        width: u32,
        height: u32,
        channels: u8,
        color_space: ColorSpace,
        data: PixelData,
    ) -> Result<Self, BufferError> {
        if width == 0 || height == 0 {
            return Err(BufferError::ZeroDimension { width, height });
        }
        if !(1..=4).contains(&channels) {
            return Err(BufferError::Channels(channels));
        }
        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(BufferError::DataLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            color_space,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    pub fn bit_depth(&self) -> BitDepth {
        match self.data {
            PixelData::U8(_) => BitDepth::Eight,
            PixelData::U16(_) => BitDepth::Sixteen,
        }
    }

    pub fn data(&self) -> &PixelData {
        &self.data
    }

    /// Number of pixels (`width * height`).
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Whether the last channel is alpha.
    pub fn has_alpha(&self) -> bool {
        self.channels == 2 || self.channels == 4
    }

    /// Read one sample widened to `u16`.
    ///
    /// Returns `None` when the coordinates or channel are out of bounds.
    pub fn sample(&self, x: u32, y: u32, channel: u8) -> Option<u16> {
        if x >= self.width || y >= self.height || channel >= self.channels {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * self.channels as usize
            + channel as usize;
        Some(match &self.data {
            PixelData::U8(d) => d[idx] as u16,
            PixelData::U16(d) => d[idx],
        })
    }

    /// All samples normalized to `[0, 1]`.
    pub(crate) fn to_unit_f32(&self) -> Vec<f32> {
        match &self.data {
            PixelData::U8(d) => {
                let scale = 1.0 / BitDepth::Eight.max_value();
                d.iter().map(|&v| v as f32 * scale).collect()
            }
            PixelData::U16(d) => {
                let scale = 1.0 / BitDepth::Sixteen.max_value();
                d.iter().map(|&v| v as f32 * scale).collect()
            }
        }
    }

    /// Quantize normalized samples back into a buffer with this buffer's
    /// dimensions, layout, depth and color space.
    ///
    /// Values are clamped to `[0, 1]` and rounded to nearest.
    pub(crate) fn with_unit_f32(&self, samples: &[f32]) -> Self {
        debug_assert_eq!(samples.len(), self.data.len());
        let data = match self.bit_depth() {
            BitDepth::Eight => {
                let max = BitDepth::Eight.max_value();
                PixelData::U8(
                    samples
                        .iter()
                        .map(|&v| (v.clamp(0.0, 1.0) * max).round() as u8)
                        .collect(),
                )
            }
            BitDepth::Sixteen => {
                let max = BitDepth::Sixteen.max_value();
                PixelData::U16(
                    samples
                        .iter()
                        .map(|&v| (v.clamp(0.0, 1.0) * max).round() as u16)
                        .collect(),
                )
            }
        };
        Self {
            width: self.width,
            height: self.height,
            channels: self.channels,
            color_space: self.color_space,
            data,
        }
    }

    /// Wrap a decoded `image` crate raster, keeping its channel layout.
    ///
    /// Float rasters are reduced to 16-bit.
    pub fn from_dynamic(img: DynamicImage, color_space: ColorSpace) -> Self {
        let (width, height) = (img.width(), img.height());
        let (channels, data) = match img {
            DynamicImage::ImageLuma8(b) => (1, PixelData::U8(b.into_raw().into())),
            DynamicImage::ImageLumaA8(b) => (2, PixelData::U8(b.into_raw().into())),
            DynamicImage::ImageRgb8(b) => (3, PixelData::U8(b.into_raw().into())),
            DynamicImage::ImageRgba8(b) => (4, PixelData::U8(b.into_raw().into())),
            DynamicImage::ImageLuma16(b) => (1, PixelData::U16(b.into_raw().into())),
            DynamicImage::ImageLumaA16(b) => (2, PixelData::U16(b.into_raw().into())),
            DynamicImage::ImageRgb16(b) => (3, PixelData::U16(b.into_raw().into())),
            DynamicImage::ImageRgba16(b) => (4, PixelData::U16(b.into_raw().into())),
            DynamicImage::ImageRgb32F(_) => (3, PixelData::U16(img.to_rgb16().into_raw().into())),
            other => (4, PixelData::U16(other.to_rgba16().into_raw().into())),
        };
        Self {
            width,
            height,
            channels,
            color_space,
            data,
        }
    }

    /// View this buffer as an `image` crate raster (copies the samples).
    pub fn to_dynamic(&self) -> Option<DynamicImage> {
        let (w, h) = (self.width, self.height);
        match (&self.data, self.channels) {
            (PixelData::U8(d), 1) => {
                image::ImageBuffer::from_raw(w, h, d.to_vec()).map(DynamicImage::ImageLuma8)
            }
            (PixelData::U8(d), 2) => {
                image::ImageBuffer::from_raw(w, h, d.to_vec()).map(DynamicImage::ImageLumaA8)
            }
            (PixelData::U8(d), 3) => {
                image::ImageBuffer::from_raw(w, h, d.to_vec()).map(DynamicImage::ImageRgb8)
            }
            (PixelData::U8(d), 4) => {
                image::ImageBuffer::from_raw(w, h, d.to_vec()).map(DynamicImage::ImageRgba8)
            }
            (PixelData::U16(d), 1) => {
                image::ImageBuffer::from_raw(w, h, d.to_vec()).map(DynamicImage::ImageLuma16)
            }
            (PixelData::U16(d), 2) => {
                image::ImageBuffer::from_raw(w, h, d.to_vec()).map(DynamicImage::ImageLumaA16)
            }
            (PixelData::U16(d), 3) => {
                image::ImageBuffer::from_raw(w, h, d.to_vec()).map(DynamicImage::ImageRgb16)
            }
            (PixelData::U16(d), 4) => {
                image::ImageBuffer::from_raw(w, h, d.to_vec()).map(DynamicImage::ImageRgba16)
            }
            _ => None,
        }
    }

    /// Expand gray (and gray + alpha) buffers to RGB (RGBA). Color buffers are
    /// returned as-is.
    pub fn expand_gray(&self) -> Self {
        if self.channels >= 3 {
            return self.clone();
        }
        let Some(img) = self.to_dynamic() else {
            return self.clone();
        };
        let expanded = match (self.bit_depth(), self.has_alpha()) {
            (BitDepth::Eight, false) => DynamicImage::ImageRgb8(img.to_rgb8()),
            (BitDepth::Eight, true) => DynamicImage::ImageRgba8(img.to_rgba8()),
            (BitDepth::Sixteen, false) => DynamicImage::ImageRgb16(img.to_rgb16()),
            (BitDepth::Sixteen, true) => DynamicImage::ImageRgba16(img.to_rgba16()),
        };
        Self::from_dynamic(expanded, self.color_space)
    }

    /// Downsample so the longest side is at most `max_dimension`, keeping the
    /// aspect ratio. Buffers already small enough are returned unchanged.
    pub fn downsample(&self, max_dimension: u32) -> Self {
        if self.width.max(self.height) <= max_dimension {
            return self.clone();
        }
        match self.to_dynamic() {
            Some(img) => Self::from_dynamic(
                img.resize(max_dimension, max_dimension, FilterType::Triangle),
                self.color_space,
            ),
            None => {
                tracing::warn!(
                    "Cannot resample {}x{} buffer with {} channel(s); using full size",
                    self.width,
                    self.height,
                    self.channels
                );
                self.clone()
            }
        }
    }

    /// Resize to exact dimensions with a Lanczos filter.
    pub fn resized(&self, width: u32, height: u32) -> Self {
        if width == self.width && height == self.height {
            return self.clone();
        }
        match self.to_dynamic() {
            Some(img) => Self::from_dynamic(
                img.resize_exact(width.max(1), height.max(1), FilterType::Lanczos3),
                self.color_space,
            ),
            None => self.clone(),
        }
    }
}
