//! Interactive preview with request coalescing.
//!
//! Callers fire [`PreviewEngine::request`] as often as they like (every
//! slider tick). Requests land in a single "latest" slot; one worker task
//! renders the newest spec against a downsampled copy of the source and
//! publishes a frame only if no newer request arrived meanwhile. Rapid
//! updates therefore cost at most one extra render, never a backlog.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::adjust::{AdjustmentSpec, Render};
use crate::buffer::ImageBuffer;
use crate::config::PreviewConfig;

/// A published preview image.
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    /// Sequence number of the request this frame answers
    pub seq: u64,
    pub spec: AdjustmentSpec,
    pub image: ImageBuffer,
    pub render_time: Duration,
}

/// What the worker is doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewStatus {
    Idle,
    Rendering { seq: u64 },
    /// The last run failed; the previous frame stays published.
    Failed { seq: u64, message: String },
}

/// Counters since the engine started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreviewStats {
    pub runs_started: u64,
    pub published: u64,
    /// Requests resolved without publishing: replaced before a run picked
    /// them up, or rendered after a newer request arrived.
    pub superseded: u64,
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    runs_started: AtomicU64,
    published: AtomicU64,
    superseded: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> PreviewStats {
        PreviewStats {
            runs_started: self.runs_started.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

struct PreviewSource {
    id: u64,
    image: Arc<ImageBuffer>,
}

#[derive(Clone)]
struct Request {
    seq: u64,
    spec: AdjustmentSpec,
    source: Arc<PreviewSource>,
}

/// Live preview for one source image at a time.
pub struct PreviewEngine {
    requests: watch::Sender<Request>,
    frames: watch::Receiver<Option<Arc<PreviewFrame>>>,
    status: watch::Receiver<PreviewStatus>,
    settled: watch::Receiver<u64>,
    next_source_id: AtomicU64,
    counters: Arc<Counters>,
    worker: JoinHandle<()>,
}

impl PreviewEngine {
    /// Start the preview worker for `source`.
    ///
    /// Nothing renders until the first [`request`](Self::request). Must be
    /// called from within a tokio runtime.
    pub fn new(renderer: Arc<dyn Render>, config: &PreviewConfig, source: Arc<ImageBuffer>) -> Self {
        let initial = Request {
            seq: 0,
            spec: AdjustmentSpec::default(),
            source: Arc::new(PreviewSource { id: 0, image: source }),
        };
        let (requests, requests_rx) = watch::channel(initial);
        let (frames_tx, frames) = watch::channel(None);
        let (status_tx, status) = watch::channel(PreviewStatus::Idle);
        let (settled_tx, settled) = watch::channel(0u64);
        let counters = Arc::new(Counters::default());

        let worker = Worker {
            renderer,
            max_dimension: config.max_dimension,
            debounce: Duration::from_millis(config.debounce_ms),
            requests: requests_rx,
            frames: frames_tx,
            status: status_tx,
            settled: settled_tx,
            counters: counters.clone(),
        };

        Self {
            requests,
            frames,
            status,
            settled,
            next_source_id: AtomicU64::new(1),
            counters,
            worker: tokio::spawn(worker.run()),
        }
    }

    /// Ask for a preview of `spec`. Never blocks; returns the request's
    /// sequence number.
    pub fn request(&self, spec: AdjustmentSpec) -> u64 {
        let mut seq = 0;
        self.requests.send_modify(|req| {
            req.seq += 1;
            req.spec = spec;
            seq = req.seq;
        });
        seq
    }

    /// Switch to a new source image and re-render the latest spec.
    pub fn load_source(&self, image: Arc<ImageBuffer>) -> u64 {
        let id = self.next_source_id.fetch_add(1, Ordering::Relaxed);
        let mut seq = 0;
        self.requests.send_modify(|req| {
            req.seq += 1;
            req.source = Arc::new(PreviewSource { id, image });
            seq = req.seq;
        });
        seq
    }

    /// Receiver that always holds the most recently published frame.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<PreviewFrame>>> {
        self.frames.clone()
    }

    pub fn latest_frame(&self) -> Option<Arc<PreviewFrame>> {
        self.frames.borrow().clone()
    }

    pub fn status(&self) -> PreviewStatus {
        self.status.borrow().clone()
    }

    pub fn stats(&self) -> PreviewStats {
        self.counters.snapshot()
    }

    /// Resolve once every request issued so far has been published,
    /// superseded or has failed.
    pub async fn wait_idle(&self) {
        let target = self.requests.borrow().seq;
        let mut settled = self.settled.clone();
        // Err means the worker is gone, so nothing is pending either way.
        let _ = settled.wait_for(|seq| *seq >= target).await;
    }

    /// Stop the worker after its current run.
    pub async fn shutdown(self) {
        let Self {
            requests, worker, ..
        } = self;
        drop(requests);
        if let Err(e) = worker.await {
            tracing::error!("Preview worker panicked: {e}");
        }
    }
}

struct Worker {
    renderer: Arc<dyn Render>,
    max_dimension: u32,
    debounce: Duration,
    requests: watch::Receiver<Request>,
    frames: watch::Sender<Option<Arc<PreviewFrame>>>,
    status: watch::Sender<PreviewStatus>,
    settled: watch::Sender<u64>,
    counters: Arc<Counters>,
}

impl Worker {
    async fn run(mut self) {
        let mut last_taken = 0u64;
        let mut working: Option<(u64, Arc<ImageBuffer>)> = None;

        while self.requests.changed().await.is_ok() {
            // Wait for a quiet period; each new request restarts it.
            while !self.debounce.is_zero() {
                let _ = self.requests.borrow_and_update();
                tokio::time::sleep(self.debounce).await;
                if !self.requests.has_changed().unwrap_or(false) {
                    break;
                }
            }
            let req = self.requests.borrow_and_update().clone();
            if req.seq <= last_taken {
                continue;
            }
            self.counters
                .superseded
                .fetch_add(req.seq - last_taken - 1, Ordering::Relaxed);
            last_taken = req.seq;

            let _ = self.status.send(PreviewStatus::Rendering { seq: req.seq });
            self.counters.runs_started.fetch_add(1, Ordering::Relaxed);

            let cached = working
                .as_ref()
                .filter(|(id, _)| *id == req.source.id)
                .map(|(_, image)| image.clone());
            let image = match cached {
                Some(image) => image,
                None => {
                    let source = req.source.image.clone();
                    let max = self.max_dimension;
                    match tokio::task::spawn_blocking(move || source.downsample(max)).await {
                        Ok(small) => {
                            tracing::debug!(
                                "Preview source {} downsampled to {}x{}",
                                req.source.id,
                                small.width(),
                                small.height()
                            );
                            let small = Arc::new(small);
                            working = Some((req.source.id, small.clone()));
                            small
                        }
                        Err(e) => {
                            tracing::error!("Preview downsample task panicked: {e}");
                            self.fail(req.seq, e.to_string());
                            continue;
                        }
                    }
                }
            };

            let renderer = self.renderer.clone();
            let spec = req.spec;
            let started = Instant::now();
            let rendered =
                tokio::task::spawn_blocking(move || renderer.render(&image, &spec)).await;

            match rendered {
                Ok(Ok(image)) => {
                    if self.requests.borrow().seq == req.seq {
                        let render_time = started.elapsed();
                        tracing::debug!(
                            "Published preview #{} in {:.1}ms",
                            req.seq,
                            render_time.as_secs_f64() * 1000.0
                        );
                        let _ = self.frames.send(Some(Arc::new(PreviewFrame {
                            seq: req.seq,
                            spec: req.spec,
                            image,
                            render_time,
                        })));
                        self.counters.published.fetch_add(1, Ordering::Relaxed);
                        let _ = self.status.send(PreviewStatus::Idle);
                    } else {
                        tracing::trace!("Discarding stale preview #{}", req.seq);
                        self.counters.superseded.fetch_add(1, Ordering::Relaxed);
                    }
                }
                Ok(Err(e)) => {
                    tracing::warn!("Preview #{} failed: {}", req.seq, e);
                    self.fail(req.seq, e.to_string());
                }
                Err(e) => {
                    tracing::error!("Preview render task panicked: {e}");
                    self.fail(req.seq, e.to_string());
                }
            }
            let _ = self.settled.send(req.seq);
        }
        tracing::debug!("Preview worker stopped");
    }

    fn fail(&self, seq: u64, message: String) {
        self.counters.failed.fetch_add(1, Ordering::Relaxed);
        let _ = self.status.send(PreviewStatus::Failed { seq, message });
        let _ = self.settled.send(seq);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adjust::{Adjustment, AdjustmentPipeline};
    use crate::error::AdjustError;
    use std::sync::atomic::{AtomicBool, AtomicU32};

    fn source(width: u32, height: u32) -> Arc<ImageBuffer> {
        let data: Vec<u8> = (0..width * height * 3).map(|i| (i % 251) as u8).collect();
        Arc::new(
            ImageBuffer::new_u8(width, height, 3, crate::buffer::ColorSpace::Srgb, data).unwrap(),
        )
    }

    fn exposure(ev: f32) -> AdjustmentSpec {
        AdjustmentSpec::default()
            .with(Adjustment::Exposure, ev)
            .unwrap()
    }

    /// Renderer whose first call blocks until released.
    struct GatedRenderer {
        calls: Arc<AtomicU32>,
        released: Arc<AtomicBool>,
    }

    impl Render for GatedRenderer {
        fn render(
            &self,
            image: &ImageBuffer,
            spec: &AdjustmentSpec,
        ) -> Result<ImageBuffer, AdjustError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            while !self.released.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(1));
            }
            AdjustmentPipeline::new().apply(image, spec)
        }
    }

    /// Renderer that fails for negative exposure.
    struct PickyRenderer;

    impl Render for PickyRenderer {
        fn render(
            &self,
            image: &ImageBuffer,
            spec: &AdjustmentSpec,
        ) -> Result<ImageBuffer, AdjustError> {
            if spec.get(Adjustment::Exposure) < 0.0 {
                return Err(AdjustError::UnsupportedBuffer {
                    channels: image.channels(),
                    bit_depth: 8,
                });
            }
            Ok(image.clone())
        }
    }

    #[tokio::test]
    async fn test_publishes_downsampled_frame() {
        let engine = PreviewEngine::new(
            Arc::new(AdjustmentPipeline::new()),
            &PreviewConfig {
                max_dimension: 32,
                debounce_ms: 0,
            },
            source(128, 64),
        );
        assert!(engine.latest_frame().is_none());

        let spec = exposure(1.0);
        let seq = engine.request(spec);
        engine.wait_idle().await;

        let frame = engine.latest_frame().unwrap();
        assert_eq!(frame.seq, seq);
        assert_eq!(frame.spec, spec);
        assert_eq!((frame.image.width(), frame.image.height()), (32, 16));
        assert_eq!(engine.status(), PreviewStatus::Idle);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_debounce_waits_for_quiet_period() {
        let engine = PreviewEngine::new(
            Arc::new(AdjustmentPipeline::new()),
            &PreviewConfig {
                max_dimension: 16,
                debounce_ms: 30,
            },
            source(16, 16),
        );

        // Ten ticks 5ms apart outlast a single 30ms window.
        for i in 1..=10 {
            engine.request(exposure(i as f32 * 0.1));
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        engine.wait_idle().await;

        let stats = engine.stats();
        assert_eq!(stats.runs_started, 1);
        assert_eq!(stats.published, 1);
        assert_eq!(stats.superseded, 9);
        assert_eq!(engine.latest_frame().unwrap().seq, 10);
        engine.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_rapid_requests_coalesce_into_one_more_run() {
        let calls = Arc::new(AtomicU32::new(0));
        let released = Arc::new(AtomicBool::new(false));
        let engine = PreviewEngine::new(
            Arc::new(GatedRenderer {
                calls: calls.clone(),
                released: released.clone(),
            }),
            &PreviewConfig::default(),
            source(16, 16),
        );

        engine.request(exposure(0.5));
        while calls.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        for ev in [1.0, 1.5, 2.0] {
            engine.request(exposure(ev));
        }
        released.store(true, Ordering::SeqCst);
        engine.wait_idle().await;

        let stats = engine.stats();
        assert_eq!(stats.runs_started, 2);
        assert_eq!(stats.published, 1);
        assert_eq!(stats.superseded, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let frame = engine.latest_frame().unwrap();
        assert_eq!(frame.spec, exposure(2.0));
        assert_eq!(frame.seq, 4);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_frame() {
        let engine = PreviewEngine::new(
            Arc::new(PickyRenderer),
            &PreviewConfig::default(),
            source(8, 8),
        );

        engine.request(exposure(1.0));
        engine.wait_idle().await;
        let good = engine.latest_frame().unwrap();

        let bad_seq = engine.request(exposure(-1.0));
        engine.wait_idle().await;

        assert!(matches!(
            engine.status(),
            PreviewStatus::Failed { seq, .. } if seq == bad_seq
        ));
        assert_eq!(engine.latest_frame().unwrap().seq, good.seq);
        assert_eq!(engine.stats().failed, 1);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_load_source_rerenders_latest_spec() {
        let engine = PreviewEngine::new(
            Arc::new(AdjustmentPipeline::new()),
            &PreviewConfig::default(),
            source(8, 8),
        );
        let spec = exposure(-0.5);
        engine.request(spec);
        engine.wait_idle().await;

        let next = source(20, 10);
        let seq = engine.load_source(next.clone());
        engine.wait_idle().await;

        let frame = engine.latest_frame().unwrap();
        assert_eq!(frame.seq, seq);
        assert_eq!(frame.spec, spec);
        assert_eq!(frame.image, AdjustmentPipeline::new().apply(&next, &spec).unwrap());
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_wait_idle_without_requests_returns() {
        let engine = PreviewEngine::new(
            Arc::new(AdjustmentPipeline::new()),
            &PreviewConfig::default(),
            source(4, 4),
        );
        engine.wait_idle().await;
        assert_eq!(engine.stats(), PreviewStats::default());
        engine.shutdown().await;
    }
}
