//! Adjustment parameters and the pixel pipeline that applies them.
//!
//! - [`spec`]: named, validated parameter values
//! - [`stages`]: the fixed-order pixel stages
//! - [`pipeline`]: runs the active stages over an [`ImageBuffer`](crate::buffer::ImageBuffer)
//! - [`filters`]: blur, erosion and color-model helpers
//! - [`preset`]: JSON presets

pub mod filters;
pub mod pipeline;
pub mod preset;
pub mod spec;
pub mod stages;

pub use pipeline::{AdjustmentPipeline, Render};
pub use preset::{load_preset, save_preset};
pub use spec::{Adjustment, AdjustmentSpec, SpecOverrides};
pub use stages::Stage;
