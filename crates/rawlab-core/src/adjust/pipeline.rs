//! Deterministic `(ImageBuffer, AdjustmentSpec) -> ImageBuffer` transform.

use std::time::Instant;

use super::stages::{Frame, Stage};
use super::AdjustmentSpec;
use crate::buffer::ImageBuffer;
use crate::error::AdjustError;

/// Anything that can turn a source buffer and a spec into a rendered buffer.
///
/// The preview engine and batch processor depend on this trait rather than on
/// [`AdjustmentPipeline`] directly.
pub trait Render: Send + Sync {
    fn render(&self, image: &ImageBuffer, spec: &AdjustmentSpec)
        -> Result<ImageBuffer, AdjustError>;
}

/// The fixed-order adjustment pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdjustmentPipeline;

impl AdjustmentPipeline {
    pub fn new() -> Self {
        Self
    }

    /// Stages that will run for `spec`, in order.
    pub fn active_stages(spec: &AdjustmentSpec) -> Vec<Stage> {
        Stage::ORDER
            .iter()
            .copied()
            .filter(|s| s.is_active(spec))
            .collect()
    }

    /// Apply every active stage to `image`.
    ///
    /// Returns the input unchanged when no stage is active. Otherwise samples
    /// are processed as normalized floats and quantized back to the source
    /// bit depth; alpha is carried through untouched.
    pub fn apply(
        &self,
        image: &ImageBuffer,
        spec: &AdjustmentSpec,
    ) -> Result<ImageBuffer, AdjustError> {
        spec.validate()?;
        let channels = image.channels() as usize;
        if channels != 3 && channels != 4 {
            return Err(AdjustError::UnsupportedBuffer {
                channels: image.channels(),
                bit_depth: image.bit_depth().bits(),
            });
        }

        let stages = Self::active_stages(spec);
        if stages.is_empty() {
            return Ok(image.clone());
        }

        let samples = image.to_unit_f32();
        let mut frame = Frame {
            width: image.width() as usize,
            height: image.height() as usize,
            color_space: image.color_space(),
            rgb: if channels == 3 {
                samples.clone()
            } else {
                samples
                    .chunks_exact(4)
                    .flat_map(|p| [p[0], p[1], p[2]])
                    .collect()
            },
        };

        let started = Instant::now();
        for stage in &stages {
            let stage_start = Instant::now();
            stage.apply(&mut frame, spec);
            tracing::trace!(
                stage = stage.name(),
                elapsed_us = stage_start.elapsed().as_micros() as u64,
                "stage applied"
            );
        }
        tracing::debug!(
            "Applied {} stage(s) to {}x{} in {:?}",
            stages.len(),
            image.width(),
            image.height(),
            started.elapsed()
        );

        let merged = if channels == 3 {
            frame.rgb
        } else {
            let mut out = samples;
            for (dst, src) in out.chunks_exact_mut(4).zip(frame.rgb.chunks_exact(3)) {
                dst[..3].copy_from_slice(src);
            }
            out
        };
        Ok(image.with_unit_f32(&merged))
    }
}

impl Render for AdjustmentPipeline {
    fn render(
        &self,
        image: &ImageBuffer,
        spec: &AdjustmentSpec,
    ) -> Result<ImageBuffer, AdjustError> {
        self.apply(image, spec)
    }
}
