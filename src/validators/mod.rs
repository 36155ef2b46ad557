// src/validators/mod.rs - per-exercise rep detection
mod plank;
mod pushup;
mod squat;

pub use plank::PlankValidator;
pub use pushup::PushupValidator;
pub use squat::SquatValidator;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoachError, Result};
use crate::geometry::{angle_between, clamp};
use crate::landmarks::{select_side, BilateralJoint, Landmark, ELBOW, HIP, KNEE};
use crate::storage::{load_thresholds, KeyValueStore};

pub const DEFAULT_DEBOUNCE_FRAMES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exercise {
    Squat,
    Pushup,
    Plank,
}

impl Exercise {
    pub const ALL: [Exercise; 3] = [Exercise::Squat, Exercise::Pushup, Exercise::Plank];

    pub fn as_str(&self) -> &'static str {
        match self {
            Exercise::Squat => "squat",
            Exercise::Pushup => "pushup",
            Exercise::Plank => "plank",
        }
    }

    pub fn tracked_joint(&self) -> &'static BilateralJoint {
        match self {
            Exercise::Squat => &KNEE,
            Exercise::Pushup => &ELBOW,
            Exercise::Plank => &HIP,
        }
    }
}

impl fmt::Display for Exercise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Exercise {
    type Err = CoachError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "squat" => Ok(Exercise::Squat),
            "pushup" | "push-up" => Ok(Exercise::Pushup),
            "plank" => Ok(Exercise::Plank),
            other => Err(CoachError::UnknownExercise(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Down,
    Up,
    Hold,
}

/// One completed rep (or plank hold). Never modified once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepMetric {
    pub start_ts: f64,
    pub end_ts: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peak_depth: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peak_angle: Option<f64>,
}

impl RepMetric {
    pub fn duration_ms(&self) -> f64 {
        self.end_ts - self.start_ts
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatorState {
    pub rep_count: u32,
    pub phase: Phase,
    /// Regenerated on every call.
    pub cues: Vec<String>,
    pub metrics: Vec<RepMetric>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SquatThresholds {
    /// Knee depth (degrees short of straight) that starts the descent.
    pub down_depth: f64,
    /// Depth below which the lifter is standing again and the rep completes.
    pub up_depth: f64,
}

impl SquatThresholds {
    /// Depth at which a descent is committed as rising.
    pub fn rise_depth(&self) -> f64 {
        self.up_depth * 2.0
    }
}

impl Default for SquatThresholds {
    fn default() -> Self {
        Self {
            down_depth: 35.0,
            up_depth: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PushupThresholds {
    pub bottom_elbow: f64,
    pub top_elbow: f64,
}

impl PushupThresholds {
    pub fn complete_elbow(&self) -> f64 {
        self.top_elbow + (180.0 - self.top_elbow) / 3.0
    }
}

impl Default for PushupThresholds {
    fn default() -> Self {
        Self {
            bottom_elbow: 140.0,
            top_elbow: 165.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlankThresholds {
    pub min_hip_angle: f64,
}

impl Default for PlankThresholds {
    fn default() -> Self {
        Self { min_hip_angle: 160.0 }
    }
}

/// Thresholds for a single exercise, as produced by calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "exercise", rename_all = "lowercase")]
pub enum ExerciseThresholds {
    Squat(SquatThresholds),
    Pushup(PushupThresholds),
    Plank(PlankThresholds),
}

impl ExerciseThresholds {
    pub fn exercise(&self) -> Exercise {
        match self {
            ExerciseThresholds::Squat(_) => Exercise::Squat,
            ExerciseThresholds::Pushup(_) => Exercise::Pushup,
            ExerciseThresholds::Plank(_) => Exercise::Plank,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    pub debounce_frames: u32,
    pub squat: SquatThresholds,
    pub pushup: PushupThresholds,
    pub plank: PlankThresholds,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            debounce_frames: DEFAULT_DEBOUNCE_FRAMES,
            squat: SquatThresholds::default(),
            pushup: PushupThresholds::default(),
            plank: PlankThresholds::default(),
        }
    }
}

impl ValidatorConfig {
    pub fn with_thresholds(mut self, thresholds: ExerciseThresholds) -> Self {
        match thresholds {
            ExerciseThresholds::Squat(t) => self.squat = t,
            ExerciseThresholds::Pushup(t) => self.pushup = t,
            ExerciseThresholds::Plank(t) => self.plank = t,
        }
        self
    }
}

/// Requires `required` consecutive observations of the same new phase before
/// a transition commits. Agreeing with the current phase clears the count.
#[derive(Debug, Clone, Default)]
pub struct Debouncer {
    pending: Option<Phase>,
    count: u32,
}

impl Debouncer {
    pub fn observe(&mut self, current: Phase, desired: Phase, required: u32) -> bool {
        if desired == current {
            self.reset();
            return false;
        }

        if self.pending != Some(desired) {
            self.pending = Some(desired);
            self.count = 0;
        }
        self.count += 1;

        if self.count >= required.max(1) {
            self.reset();
            true
        } else {
            false
        }
    }

    pub fn pending_count(&self) -> u32 {
        self.count
    }

    pub fn reset(&mut self) {
        self.pending = None;
        self.count = 0;
    }
}

pub trait RepValidator: Send {
    fn exercise(&self) -> Exercise;

    fn state(&self) -> &ValidatorState;

    fn config(&self) -> &ValidatorConfig;

    /// Advances the state machine by one landmark update. `None` landmarks
    /// (or a frame missing the tracked joints) leave everything but the cues
    /// untouched, including any debounce in progress. `config` overrides the
    /// bound configuration for this call only.
    fn validate_with(
        &mut self,
        landmarks: Option<&[Landmark]>,
        timestamp_ms: f64,
        config: Option<&ValidatorConfig>,
    ) -> &ValidatorState;

    fn validate(&mut self, landmarks: Option<&[Landmark]>, timestamp_ms: f64) -> &ValidatorState {
        self.validate_with(landmarks, timestamp_ms, None)
    }
}

pub fn create_validator(exercise: Exercise, config: ValidatorConfig) -> Box<dyn RepValidator> {
    match exercise {
        Exercise::Squat => Box::new(SquatValidator::new(config)),
        Exercise::Pushup => Box::new(PushupValidator::new(config)),
        Exercise::Plank => Box::new(PlankValidator::new(config)),
    }
}

/// Builds a validator with any calibrated thresholds for `exercise` laid over
/// `base`. Later recalibration does not affect the returned instance.
pub fn load_validator(
    exercise: Exercise,
    store: &dyn KeyValueStore,
    base: ValidatorConfig,
) -> Result<Box<dyn RepValidator>> {
    let config = match load_thresholds(store, exercise)? {
        Some(record) => {
            tracing::info!(%exercise, created_at = %record.created_at, "Using calibrated thresholds");
            base.with_thresholds(record.thresholds)
        }
        None => base,
    };
    Ok(create_validator(exercise, config))
}

fn joint_angle(frame: &[Landmark], joint: &BilateralJoint) -> Option<f64> {
    let side = select_side(frame, joint);
    let (a, b, c) = joint.chain(side).resolve(frame)?;
    Some(angle_between(a, b, c))
}

/// Knee bend in degrees short of a straight leg, from the better-seen leg.
pub fn squat_depth(frame: &[Landmark]) -> Option<f64> {
    joint_angle(frame, &KNEE).map(|knee| clamp(180.0 - knee, 0.0, 120.0))
}

pub fn elbow_angle(frame: &[Landmark]) -> Option<f64> {
    joint_angle(frame, &ELBOW)
}

/// Shoulder-hip-knee angle; 180 is a perfectly straight body line.
pub fn hip_angle(frame: &[Landmark]) -> Option<f64> {
    joint_angle(frame, &HIP)
}

/// The scalar each exercise is judged on.
pub fn measure(exercise: Exercise, frame: &[Landmark]) -> Option<f64> {
    match exercise {
        Exercise::Squat => squat_depth(frame),
        Exercise::Pushup => elbow_angle(frame),
        Exercise::Plank => hip_angle(frame),
    }
}
