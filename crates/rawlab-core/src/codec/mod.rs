//! Decoding sources into [`ImageBuffer`]s and encoding results to disk.
//!
//! The batch processor and preview tooling talk to [`SourceDecoder`] and
//! [`ImageEncoder`] trait objects; [`ImageDecoder`] and [`StandardEncoder`]
//! are the built-in implementations.

pub mod decode;
pub mod encode;
pub mod validate;

use std::path::Path;

use crate::buffer::ImageBuffer;
use crate::error::PipelineResult;
use crate::export::OutputFormat;

pub use decode::{decode_with_timeout, ImageDecoder};
pub use encode::StandardEncoder;
pub use validate::{is_raw_path, Validator, RAW_EXTENSIONS};

/// Turns a file on disk into a decoded buffer.
///
/// Called from the blocking pool; implementations may do slow synchronous I/O.
pub trait SourceDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> PipelineResult<ImageBuffer>;
}

/// Writes a buffer to `path` in the requested format.
pub trait ImageEncoder: Send + Sync {
    fn encode(
        &self,
        image: &ImageBuffer,
        format: OutputFormat,
        path: &Path,
    ) -> PipelineResult<()>;
}
