//! Bounded worker pool that exports queued jobs at full resolution.
//!
//! Workers are tokio tasks pulling from one shared queue; decode, render and
//! encode run on the blocking pool. A failing job is recorded and the worker
//! moves on, so one bad file never takes down the batch.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Mutex};
use tokio::task::{JoinHandle, JoinSet};

use super::job::{BatchEvent, BatchSummary, Job, JobId, JobOutcome, JobResult};
use super::naming::{resolve_destination, ConflictPolicy, Destination};
use crate::adjust::{AdjustmentPipeline, Render};
use crate::codec::{decode_with_timeout, ImageDecoder, ImageEncoder, SourceDecoder, StandardEncoder};
use crate::config::{Config, LimitsConfig};
use crate::error::{PipelineError, PipelineResult, Result};

struct QueuedJob {
    id: JobId,
    /// 1-based position in enqueue order, used for `{index}`.
    index: usize,
    job: Job,
}

/// Collects jobs and runs them on a worker pool.
pub struct BatchProcessor {
    queue: VecDeque<QueuedJob>,
    next_id: u64,
    decoder: Arc<dyn SourceDecoder>,
    encoder: Arc<dyn ImageEncoder>,
    renderer: Arc<dyn Render>,
    policy: ConflictPolicy,
    decode_timeout_ms: u64,
}

impl BatchProcessor {
    pub fn new(decoder: Arc<dyn SourceDecoder>, encoder: Arc<dyn ImageEncoder>) -> Self {
        Self {
            queue: VecDeque::new(),
            next_id: 1,
            decoder,
            encoder,
            renderer: Arc::new(AdjustmentPipeline::new()),
            policy: ConflictPolicy::default(),
            decode_timeout_ms: LimitsConfig::default().decode_timeout_ms,
        }
    }

    /// Processor wired with the built-in codecs and the configured limits,
    /// encoder quality and conflict policy.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(
                ImageDecoder::new(config.limits.clone())
                    .with_color_space(config.processing.color_space),
            ),
            Arc::new(StandardEncoder::new(config.export.quality)),
        )
        .with_conflict_policy(config.export.conflict_policy)
        .with_decode_timeout(config.limits.decode_timeout_ms)
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Render>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_decode_timeout(mut self, timeout_ms: u64) -> Self {
        self.decode_timeout_ms = timeout_ms;
        self
    }

    /// Queue a job. It stays pending until a worker takes it.
    pub fn enqueue(&mut self, job: Job) -> JobId {
        let id = JobId(self.next_id);
        self.next_id += 1;
        let index = self.queue.len() + 1;
        self.queue.push_back(QueuedJob { id, index, job });
        id
    }

    /// Number of queued jobs.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Start `max_parallel` workers (at least one) over the queued jobs.
    ///
    /// Must be called from within a tokio runtime.
    pub fn run(self, max_parallel: usize) -> BatchRun {
        let total = self.queue.len();
        let workers = max_parallel.max(1).min(total.max(1));
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let stop = StopHandle::default();

        let ctx = Arc::new(WorkerContext {
            queue: Mutex::new(self.queue),
            reserved: Mutex::new(HashSet::new()),
            completed: Mutex::new(0),
            total,
            events: events_tx,
            stop: stop.clone(),
            decoder: self.decoder,
            encoder: self.encoder,
            renderer: self.renderer,
            policy: self.policy,
            decode_timeout_ms: self.decode_timeout_ms,
        });

        let handle = tokio::spawn(async move {
            let started = Instant::now();
            tracing::info!("Starting batch: {} job(s) on {} worker(s)", total, workers);

            let mut set = JoinSet::new();
            for worker in 0..workers {
                set.spawn(worker_loop(ctx.clone(), worker));
            }

            let mut results = Vec::with_capacity(total);
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok(mut worker_results) => results.append(&mut worker_results),
                    Err(e) => tracing::error!("Batch worker panicked: {e}"),
                }
            }

            let cancelled = ctx.queue.lock().await.len();
            let summary = BatchSummary::from_results(total, results, cancelled, started.elapsed());
            tracing::info!(
                "Batch finished in {:.1}s: {} succeeded, {} skipped, {} failed, {} cancelled",
                summary.elapsed.as_secs_f64(),
                summary.succeeded,
                summary.skipped,
                summary.failed,
                summary.cancelled
            );
            summary
        });

        BatchRun {
            events: events_rx,
            stop,
            handle,
        }
    }
}

/// Cooperative stop flag shared with the workers.
///
/// Workers check it between jobs: in-flight jobs complete, queued jobs are
/// left untouched and counted as cancelled.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Handle to a running batch.
pub struct BatchRun {
    events: mpsc::UnboundedReceiver<BatchEvent>,
    stop: StopHandle,
    handle: JoinHandle<BatchSummary>,
}

impl BatchRun {
    /// Next progress event; `None` once every worker has exited.
    pub async fn next_event(&mut self) -> Option<BatchEvent> {
        self.events.recv().await
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Ask workers to stop after their current job.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Wait for the batch to end and return its summary.
    pub async fn finish(self) -> Result<BatchSummary> {
        drop(self.events);
        Ok(self.handle.await?)
    }
}

struct WorkerContext {
    queue: Mutex<VecDeque<QueuedJob>>,
    reserved: Mutex<HashSet<PathBuf>>,
    /// Guards both the counter and the send so `completed` arrives in order.
    completed: Mutex<usize>,
    total: usize,
    events: mpsc::UnboundedSender<BatchEvent>,
    stop: StopHandle,
    decoder: Arc<dyn SourceDecoder>,
    encoder: Arc<dyn ImageEncoder>,
    renderer: Arc<dyn Render>,
    policy: ConflictPolicy,
    decode_timeout_ms: u64,
}

async fn worker_loop(ctx: Arc<WorkerContext>, worker: usize) -> Vec<JobResult> {
    let mut results = Vec::new();
    loop {
        if ctx.stop.is_stopped() {
            tracing::debug!("Worker {worker} stopping on request");
            break;
        }
        let Some(queued) = ctx.queue.lock().await.pop_front() else {
            break;
        };

        // The receiver may already be gone; progress is then simply unobserved.
        let _ = ctx.events.send(BatchEvent::Started {
            job_id: queued.id,
            source: queued.job.source.clone(),
        });

        let result = process_job(&ctx, queued).await;
        match &result.outcome {
            JobOutcome::Done { output } => {
                tracing::debug!("Job {} wrote {:?}", result.job_id, output)
            }
            JobOutcome::Skipped { destination } => {
                tracing::info!("Job {} skipped: {:?} exists", result.job_id, destination)
            }
            JobOutcome::Failed { message, .. } => {
                tracing::warn!("Job {} failed: {}", result.job_id, message)
            }
        }

        {
            let mut completed = ctx.completed.lock().await;
            *completed += 1;
            let _ = ctx.events.send(BatchEvent::Finished {
                result: result.clone(),
                completed: *completed,
                total: ctx.total,
            });
        }
        results.push(result);
    }
    results
}

async fn process_job(ctx: &WorkerContext, queued: QueuedJob) -> JobResult {
    let started = Instant::now();
    let QueuedJob { id, index, job } = queued;
    let outcome = match run_job(ctx, index, &job).await {
        Ok(outcome) => outcome,
        Err(e) => JobOutcome::Failed {
            kind: e.kind().to_string(),
            message: e.to_string(),
        },
    };
    JobResult {
        job_id: id,
        source: job.source,
        outcome,
        elapsed_ms: started.elapsed().as_millis() as u64,
    }
}

async fn run_job(
    ctx: &WorkerContext,
    index: usize,
    job: &Job,
) -> PipelineResult<JobOutcome> {
    let destination = {
        let name = job.naming.render_for(&job.source, index);
        let mut reserved = ctx.reserved.lock().await;
        resolve_destination(
            ctx.policy,
            &job.output_dir,
            &name,
            job.export.format.extension(),
            &mut reserved,
        )?
    };
    let output = match destination {
        Destination::Skip(destination) => return Ok(JobOutcome::Skipped { destination }),
        Destination::Write(path) => path,
    };

    let written = write_output(ctx, job, &output).await;
    if written.is_err() {
        // Free the name so later jobs with the same stem are not renumbered.
        ctx.reserved.lock().await.remove(&output);
    }
    written?;

    Ok(JobOutcome::Done { output })
}

/// Decode, render and encode `job` to `output`.
async fn write_output(
    ctx: &WorkerContext,
    job: &Job,
    output: &Path,
) -> PipelineResult<()> {
    let source = decode_with_timeout(ctx.decoder.clone(), &job.source, ctx.decode_timeout_ms).await?;

    let renderer = ctx.renderer.clone();
    let encoder = ctx.encoder.clone();
    let spec = job.spec;
    let export = job.export.clone();
    let source_path = job.source.clone();
    let output_path = output.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let adjusted = renderer
            .render(&source, &spec)
            .map_err(|e| PipelineError::Adjust {
                path: source_path,
                source: e,
            })?;
        let exported = export.apply(&adjusted);
        encoder.encode(&exported, export.format, &output_path)
    })
    .await
    .map_err(|e| PipelineError::Encode {
        path: output.to_path_buf(),
        message: format!("Task join error: {}", e),
    })?
}
