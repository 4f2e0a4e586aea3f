//! Batch export: jobs, output naming, and the bounded worker pool.

pub mod job;
pub mod naming;
pub mod processor;

pub use job::{BatchEvent, BatchSummary, Job, JobFailure, JobId, JobOutcome, JobResult};
pub use naming::{resolve_destination, ConflictPolicy, Destination, NamingRule};
pub use processor::{BatchProcessor, BatchRun, StopHandle};
