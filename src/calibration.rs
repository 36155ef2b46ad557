// src/calibration.rs - derive personal thresholds from a timed sampling run
use serde::Serialize;
use std::collections::VecDeque;
use tracing::{debug, info};

use crate::error::Result;
use crate::geometry::clamp;
use crate::landmarks::Landmark;
use crate::storage::{save_thresholds, KeyValueStore, ThresholdRecord};
use crate::validators::{
    measure, Exercise, ExerciseThresholds, PlankThresholds, PushupThresholds, SquatThresholds,
};

/// Roughly six seconds of updates at 30 Hz.
pub const SAMPLE_CAPACITY: usize = 180;

const SQUAT_MIN_DEPTH: f64 = 20.0;
const SQUAT_DOWN_RATIO: f64 = 0.6;
const SQUAT_UP_DEPTH: f64 = 10.0;
const PUSHUP_ELBOW_CEILING: f64 = 140.0;
const PUSHUP_BOTTOM_FLOOR: f64 = 50.0;
const PUSHUP_TOP_ELBOW: f64 = 155.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibrationPreview {
    pub range_low: f64,
    pub range_high: f64,
    pub sample_count: usize,
    pub elapsed_secs: f64,
}

pub struct CalibrationEngine {
    exercise: Exercise,
    running: bool,
    samples: VecDeque<f64>,
    started_ms: Option<f64>,
    last_seen_ms: Option<f64>,
}

impl CalibrationEngine {
    pub fn new(exercise: Exercise) -> Self {
        Self {
            exercise,
            running: false,
            samples: VecDeque::with_capacity(SAMPLE_CAPACITY),
            started_ms: None,
            last_seen_ms: None,
        }
    }

    pub fn exercise(&self) -> Exercise {
        self.exercise
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Begins a fresh run, discarding samples from any earlier one.
    pub fn start(&mut self) {
        self.samples.clear();
        self.started_ms = None;
        self.last_seen_ms = None;
        self.running = true;
        info!(exercise = %self.exercise, "Calibration started");
    }

    /// Stops collecting. Samples stay available for preview and save.
    pub fn stop(&mut self) {
        if self.running {
            self.running = false;
            info!(exercise = %self.exercise, samples = self.samples.len(), "Calibration stopped");
        }
    }

    /// Measures one landmark update while running. Returns the recorded
    /// sample, if any.
    pub fn record(&mut self, landmarks: Option<&[Landmark]>, timestamp_ms: f64) -> Option<f64> {
        if !self.running {
            return None;
        }
        self.started_ms.get_or_insert(timestamp_ms);
        self.last_seen_ms = Some(timestamp_ms);

        let value = measure(self.exercise, landmarks?)?;
        self.push_sample(value);
        Some(value)
    }

    /// Appends a pre-computed measurement, evicting the oldest when full.
    /// Ignored unless a run is in progress.
    pub fn push_sample(&mut self, value: f64) {
        if !self.running {
            return;
        }
        if self.samples.len() == SAMPLE_CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    pub fn samples(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn preview(&self) -> Option<CalibrationPreview> {
        if self.samples.is_empty() {
            return None;
        }
        let (low, high) = self
            .samples
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let elapsed_secs = match (self.started_ms, self.last_seen_ms) {
            (Some(start), Some(last)) => ((last - start) / 1000.0).max(0.0),
            _ => 0.0,
        };

        Some(CalibrationPreview {
            range_low: low,
            range_high: high,
            sample_count: self.samples.len(),
            elapsed_secs,
        })
    }

    /// Copies the buffer as it is right now. Saving the snapshot is unaffected
    /// by any run started afterwards.
    pub fn snapshot(&self) -> CalibrationSnapshot {
        CalibrationSnapshot {
            exercise: self.exercise,
            samples: self.samples.iter().copied().collect(),
        }
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> Result<Option<ThresholdRecord>> {
        self.snapshot().save(store)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationSnapshot {
    pub exercise: Exercise,
    pub samples: Vec<f64>,
}

impl CalibrationSnapshot {
    pub fn thresholds(&self) -> Option<ExerciseThresholds> {
        derive_thresholds(self.exercise, &self.samples)
    }

    /// Persists thresholds derived from the snapshot. An empty snapshot
    /// writes nothing and returns `None`.
    pub fn save(&self, store: &dyn KeyValueStore) -> Result<Option<ThresholdRecord>> {
        let Some(thresholds) = self.thresholds() else {
            debug!(exercise = %self.exercise, "Nothing to save, calibration buffer is empty");
            return Ok(None);
        };

        let record = ThresholdRecord::new(thresholds);
        save_thresholds(store, &record)?;
        info!(exercise = %self.exercise, ?thresholds, "Calibration saved");
        Ok(Some(record))
    }
}

pub fn derive_thresholds(exercise: Exercise, samples: &[f64]) -> Option<ExerciseThresholds> {
    if samples.is_empty() {
        return None;
    }

    let thresholds = match exercise {
        Exercise::Squat => {
            let deepest = samples.iter().copied().fold(SQUAT_MIN_DEPTH, f64::max);
            ExerciseThresholds::Squat(SquatThresholds {
                down_depth: (deepest * SQUAT_DOWN_RATIO).round(),
                up_depth: SQUAT_UP_DEPTH,
            })
        }
        Exercise::Pushup => {
            let tightest = samples.iter().copied().fold(PUSHUP_ELBOW_CEILING, f64::min);
            ExerciseThresholds::Pushup(PushupThresholds {
                bottom_elbow: (tightest + 5.0).max(PUSHUP_BOTTOM_FLOOR).round(),
                top_elbow: PUSHUP_TOP_ELBOW,
            })
        }
        Exercise::Plank => {
            let mean = samples.iter().sum::<f64>() / samples.len() as f64;
            ExerciseThresholds::Plank(PlankThresholds {
                min_hip_angle: clamp(mean.round() - 5.0, 150.0, 179.0),
            })
        }
    };
    Some(thresholds)
}
