// src/tracking.rs - pose acquisition loop, landmark smoothing and adaptive cadence
use anyhow::anyhow;
use image::DynamicImage;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{CoachError, Result};
use crate::geometry::{exponential_moving_average, DEFAULT_ALPHA};
use crate::landmarks::{Landmark, PoseUpdate};

pub const NOMINAL_HZ: f64 = 30.0;
pub const DEGRADED_HZ: f64 = 20.0;
pub const LOW_WATERMARK_FPS: u32 = 15;
pub const HIGH_WATERMARK_FPS: u32 = 25;

/// Black-box pose model. `Ok(None)` (or an empty list) means no body was
/// found; errors are treated the same way by the engine.
pub trait PoseEstimator: Send + 'static {
    fn estimate(&mut self, frame: &DynamicImage, timestamp_ms: f64) -> anyhow::Result<Option<Vec<Landmark>>>;
}

pub trait FrameSource: Send + 'static {
    fn read_frame(&mut self) -> anyhow::Result<DynamicImage>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    pub fps: u32,
    pub interval_ms: f64,
}

pub struct LandmarkSmoother {
    alpha: f64,
    last: Option<Vec<Landmark>>,
    gap: bool,
}

impl LandmarkSmoother {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            last: None,
            gap: true,
        }
    }

    /// Smooths one raw detection. A missing detection passes through as
    /// `None` and leaves the last smoothed set in place; the next detection
    /// after it reseeds the filter with raw values.
    pub fn apply(&mut self, raw: Option<Vec<Landmark>>) -> Option<Vec<Landmark>> {
        let current = match raw {
            Some(current) if !current.is_empty() => current,
            _ => {
                self.gap = true;
                return None;
            }
        };

        let output: Vec<Landmark> = match &self.last {
            Some(prev) if !self.gap && prev.len() == current.len() => prev
                .iter()
                .zip(current.iter())
                .map(|(p, c)| Landmark {
                    x: exponential_moving_average(p.x, c.x, self.alpha),
                    y: exponential_moving_average(p.y, c.y, self.alpha),
                    z: exponential_moving_average(p.z, c.z, self.alpha),
                    visibility: c.visibility,
                })
                .collect(),
            _ => current,
        };

        self.gap = false;
        self.last = Some(output.clone());
        Some(output)
    }

    pub fn last_smoothed(&self) -> Option<&[Landmark]> {
        self.last.as_deref()
    }
}

impl Default for LandmarkSmoother {
    fn default() -> Self {
        Self::new(DEFAULT_ALPHA)
    }
}

/// Two-speed polling cadence with hysteresis between the watermarks.
#[derive(Debug, Clone)]
pub struct CadenceController {
    interval_ms: f64,
    last_tick_ms: Option<f64>,
    fps: u32,
}

impl CadenceController {
    pub fn new() -> Self {
        Self {
            interval_ms: 1000.0 / NOMINAL_HZ,
            last_tick_ms: None,
            fps: 0,
        }
    }

    pub fn interval_ms(&self) -> f64 {
        self.interval_ms
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Records a tick start. Returns fresh stats once two ticks have been seen.
    pub fn on_tick(&mut self, now_ms: f64) -> Option<FrameStats> {
        let last = self.last_tick_ms.replace(now_ms);
        let dt = now_ms - last?;
        if dt <= 0.0 {
            return None;
        }

        self.fps = (1000.0 / dt).round() as u32;
        if self.fps < LOW_WATERMARK_FPS {
            self.interval_ms = 1000.0 / DEGRADED_HZ;
        } else if self.fps > HIGH_WATERMARK_FPS {
            self.interval_ms = 1000.0 / NOMINAL_HZ;
        }

        Some(FrameStats {
            fps: self.fps,
            interval_ms: self.interval_ms,
        })
    }
}

impl Default for CadenceController {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub smoothing_alpha: f64,
    pub broadcast_capacity: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            smoothing_alpha: DEFAULT_ALPHA,
            broadcast_capacity: 64,
        }
    }
}

type SharedEstimator = Arc<Mutex<Box<dyn PoseEstimator>>>;
type SharedSource = Arc<Mutex<Box<dyn FrameSource>>>;

/// One camera session: owns the model handle and frame source, runs the tick
/// loop and fans smoothed landmarks and frame stats out to subscribers.
pub struct PoseEngine {
    estimator: SharedEstimator,
    source: SharedSource,
    options: EngineOptions,
    landmark_tx: broadcast::Sender<PoseUpdate>,
    stats_tx: broadcast::Sender<FrameStats>,
    task: Option<JoinHandle<()>>,
    epoch: Instant,
}

impl PoseEngine {
    pub fn new<E: PoseEstimator, S: FrameSource>(estimator: E, source: S, options: EngineOptions) -> Self {
        let capacity = options.broadcast_capacity.max(1);
        let (landmark_tx, _) = broadcast::channel(capacity);
        let (stats_tx, _) = broadcast::channel(capacity);

        Self {
            estimator: Arc::new(Mutex::new(Box::new(estimator) as Box<dyn PoseEstimator>)),
            source: Arc::new(Mutex::new(Box::new(source) as Box<dyn FrameSource>)),
            options,
            landmark_tx,
            stats_tx,
            task: None,
            epoch: Instant::now(),
        }
    }

    /// Landmark updates. Dropping the receiver unsubscribes; a receiver that
    /// falls behind loses the oldest updates instead of stalling the loop.
    pub fn subscribe(&self) -> broadcast::Receiver<PoseUpdate> {
        self.landmark_tx.subscribe()
    }

    pub fn subscribe_stats(&self) -> broadcast::Receiver<FrameStats> {
        self.stats_tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.landmark_tx.receiver_count()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map_or(false, |task| !task.is_finished())
    }

    /// Starts the tick loop on the current Tokio runtime. Calling it while
    /// the loop is running does nothing.
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            debug!("Pose engine already running");
            return Ok(());
        }

        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| CoachError::Runtime(e.to_string()))?;

        let ticker = TickLoop {
            estimator: Arc::clone(&self.estimator),
            source: Arc::clone(&self.source),
            smoother: LandmarkSmoother::new(self.options.smoothing_alpha),
            cadence: CadenceController::new(),
            landmark_tx: self.landmark_tx.clone(),
            stats_tx: self.stats_tx.clone(),
            epoch: self.epoch,
        };

        self.task = Some(handle.spawn(ticker.run()));
        info!(alpha = self.options.smoothing_alpha, "Pose engine started");
        Ok(())
    }

    /// Cancels the pending tick. Safe before `start` and when repeated.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("Pose engine stopped");
        }
    }
}

impl Drop for PoseEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

struct TickLoop {
    estimator: SharedEstimator,
    source: SharedSource,
    smoother: LandmarkSmoother,
    cadence: CadenceController,
    landmark_tx: broadcast::Sender<PoseUpdate>,
    stats_tx: broadcast::Sender<FrameStats>,
    epoch: Instant,
}

impl TickLoop {
    async fn run(mut self) {
        loop {
            let now_ms = self.epoch.elapsed().as_secs_f64() * 1000.0;

            let previous_interval = self.cadence.interval_ms();
            if let Some(stats) = self.cadence.on_tick(now_ms) {
                if stats.interval_ms != previous_interval {
                    info!(fps = stats.fps, interval_ms = stats.interval_ms, "Cadence changed");
                }
                // No receivers is not an error
                let _ = self.stats_tx.send(stats);
            }

            let raw = self.acquire(now_ms).await;
            let smoothed = self.smoother.apply(raw);
            let _ = self.landmark_tx.send(PoseUpdate {
                timestamp_ms: now_ms,
                landmarks: smoothed.map(Arc::from),
            });

            tokio::time::sleep(Duration::from_secs_f64(self.cadence.interval_ms() / 1000.0)).await;
        }
    }

    /// Reads one frame and runs the estimator on the blocking pool. Any
    /// failure along the way counts as no detection for this tick.
    async fn acquire(&self, timestamp_ms: f64) -> Option<Vec<Landmark>> {
        let estimator = Arc::clone(&self.estimator);
        let source = Arc::clone(&self.source);

        let joined = tokio::task::spawn_blocking(move || -> anyhow::Result<Option<Vec<Landmark>>> {
            let frame = source
                .lock()
                .map_err(|_| anyhow!("frame source lock poisoned"))?
                .read_frame()?;
            let mut estimator = estimator
                .lock()
                .map_err(|_| anyhow!("estimator lock poisoned"))?;
            estimator.estimate(&frame, timestamp_ms)
        })
        .await;

        match joined {
            Ok(Ok(landmarks)) => landmarks.filter(|lm| !lm.is_empty()),
            Ok(Err(e)) => {
                debug!("Pose estimate failed, treating as no detection: {}", e);
                None
            }
            Err(e) => {
                warn!("Pose estimate task aborted: {}", e);
                None
            }
        }
    }
}
