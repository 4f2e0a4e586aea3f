//! Batch jobs, their results, and progress events.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use super::NamingRule;
use crate::adjust::AdjustmentSpec;
use crate::export::ExportOptions;

/// Identifier assigned by [`BatchProcessor::enqueue`](super::BatchProcessor::enqueue).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One source file to export with its effective adjustments.
///
/// A job is pending while queued, processing once a worker takes it, and ends
/// as done, skipped or failed. Each job is reported exactly once.
#[derive(Debug, Clone)]
pub struct Job {
    pub source: PathBuf,
    pub spec: AdjustmentSpec,
    pub output_dir: PathBuf,
    pub naming: NamingRule,
    pub export: ExportOptions,
}

impl Job {
    pub fn new(source: impl Into<PathBuf>, spec: AdjustmentSpec, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            spec,
            output_dir: output_dir.into(),
            naming: NamingRule::default(),
            export: ExportOptions::default(),
        }
    }

    pub fn with_naming(mut self, naming: NamingRule) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_export(mut self, export: ExportOptions) -> Self {
        self.export = export;
        self
    }
}

/// Terminal state of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Done { output: PathBuf },
    Skipped { destination: PathBuf },
    Failed { kind: String, message: String },
}

impl JobOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            JobOutcome::Done { .. } => "done",
            JobOutcome::Skipped { .. } => "skipped",
            JobOutcome::Failed { .. } => "failed",
        }
    }
}

/// Result of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobResult {
    pub job_id: JobId,
    pub source: PathBuf,
    #[serde(flatten)]
    pub outcome: JobOutcome,
    pub elapsed_ms: u64,
}

/// Progress notifications emitted while a batch runs.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    /// A worker took the job off the queue.
    Started { job_id: JobId, source: PathBuf },
    /// The job reached a terminal state. `completed` counts finished jobs
    /// (any outcome) and increases by one with every event.
    Finished {
        result: JobResult,
        completed: usize,
        total: usize,
    },
}

/// A failed job, as listed in the summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobFailure {
    pub job_id: JobId,
    pub source: PathBuf,
    pub kind: String,
    pub message: String,
}

/// Aggregate outcome of a batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Jobs never started because the run was stopped.
    pub cancelled: usize,
    pub failures: Vec<JobFailure>,
    /// Every finished job, ordered by id.
    pub results: Vec<JobResult>,
    pub elapsed: Duration,
}

impl BatchSummary {
    pub(crate) fn from_results(
        total: usize,
        mut results: Vec<JobResult>,
        cancelled: usize,
        elapsed: Duration,
    ) -> Self {
        results.sort_by_key(|r| r.job_id);
        let mut summary = Self {
            total,
            cancelled,
            elapsed,
            ..Self::default()
        };
        for result in &results {
            match &result.outcome {
                JobOutcome::Done { .. } => summary.succeeded += 1,
                JobOutcome::Skipped { .. } => summary.skipped += 1,
                JobOutcome::Failed { kind, message } => {
                    summary.failed += 1;
                    summary.failures.push(JobFailure {
                        job_id: result.job_id,
                        source: result.source.clone(),
                        kind: kind.clone(),
                        message: message.clone(),
                    });
                }
            }
        }
        summary.results = results;
        summary
    }

    /// Finished jobs per second.
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.results.len() as f64 / secs
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: u64, outcome: JobOutcome) -> JobResult {
        JobResult {
            job_id: JobId(id),
            source: PathBuf::from(format!("/in/{id}.png")),
            outcome,
            elapsed_ms: 5,
        }
    }

    #[test]
    fn test_summary_counts_and_orders() {
        let results = vec![
            result(
                3,
                JobOutcome::Failed {
                    kind: "decode".into(),
                    message: "bad".into(),
                },
            ),
            result(1, JobOutcome::Done { output: "/out/1.jpg".into() }),
            result(2, JobOutcome::Skipped { destination: "/out/2.jpg".into() }),
        ];
        let summary = BatchSummary::from_results(5, results, 2, Duration::from_secs(1));
        assert_eq!(
            (summary.succeeded, summary.skipped, summary.failed, summary.cancelled),
            (1, 1, 1, 2)
        );
        assert_eq!(summary.failures[0].job_id, JobId(3));
        let ids: Vec<_> = summary.results.iter().map(|r| r.job_id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!((summary.rate() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_job_result_serializes_flat() {
        let json = serde_json::to_value(result(7, JobOutcome::Done { output: "/out/7.jpg".into() })).unwrap();
        assert_eq!(json["job_id"], 7);
        assert_eq!(json["status"], "done");
        assert_eq!(json["output"], "/out/7.jpg");
    }
}
