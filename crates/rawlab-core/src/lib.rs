//! rawlab core - non-destructive photo adjustments with live preview and
//! batch export.
//!
//! A named set of adjustment parameters plus a decoded image buffer goes in;
//! a deterministic adjusted image comes out. The same pipeline drives a
//! coalescing preview engine for interactive edits and a bounded worker pool
//! that exports whole folders at full resolution.
//!
//! # Architecture
//!
//! ```text
//! decode → ImageBuffer ─┬→ PreviewEngine (downsampled, latest request wins)
//!                       └→ BatchProcessor → pipeline → export stages → encode
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use rawlab_core::{AdjustmentSpec, Config, Session};
//!
//! #[tokio::main]
//! async fn main() -> rawlab_core::Result<()> {
//!     let mut session = Session::new(Config::load()?);
//!     session.add_inputs(&["./shoot"]);
//!     session.set_spec(AdjustmentSpec::from_pairs([("exposure", 0.7), ("vibrance", 15.0)])?);
//!
//!     let summary = session.build_processor()?.run(4).finish().await?;
//!     println!("{} exported, {} failed", summary.succeeded, summary.failed);
//!     Ok(())
//! }
//! ```

pub mod adjust;
pub mod batch;
pub mod buffer;
pub mod codec;
pub mod config;
pub mod discovery;
pub mod error;
pub mod export;
pub mod preview;
pub mod report;
pub mod session;

pub use adjust::{Adjustment, AdjustmentPipeline, AdjustmentSpec, Render, SpecOverrides, Stage};
pub use batch::{
    BatchEvent, BatchProcessor, BatchRun, BatchSummary, ConflictPolicy, Job, JobId, JobOutcome,
    JobResult, NamingRule, StopHandle,
};
pub use buffer::{BitDepth, ColorSpace, ImageBuffer, PixelData};
pub use codec::{ImageDecoder, ImageEncoder, SourceDecoder, StandardEncoder};
pub use config::Config;
pub use discovery::{DiscoveredFile, FileDiscovery};
pub use error::{
    AdjustError, BufferError, ConfigError, NamingError, PipelineError, PipelineResult,
    RawlabError, Result,
};
pub use export::{ExportOptions, OutputFormat, Resize, Sharpening};
pub use preview::{PreviewEngine, PreviewFrame, PreviewStats, PreviewStatus};
pub use report::{ReportFormat, ReportWriter};
pub use session::Session;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
