// src/session.rs - one coached exercise session driven by pose updates
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};
use uuid::Uuid;

use crate::calibration::CalibrationEngine;
use crate::landmarks::PoseUpdate;
use crate::validators::{Exercise, Phase, RepValidator};

const ACTIVITY_LEN: usize = 100;

/// Delivers coaching cues to the user (speech, notifications, ...).
pub trait CueSink: Send {
    fn speak(&mut self, cue: &str);
}

/// Cue sink that only logs.
#[derive(Debug, Default)]
pub struct TracingVoice;

impl CueSink for TracingVoice {
    fn speak(&mut self, cue: &str) {
        info!(cue, "Coach cue");
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepRow {
    pub idx: usize,
    pub start_ms: i64,
    pub end_ms: i64,
    pub peak_depth: Option<f64>,
    pub peak_angle: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub rep_count: u32,
    pub phase: Phase,
    pub cue: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub exercise: Exercise,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub total_reps: usize,
    pub total_time_seconds: i64,
}

pub struct CoachSession {
    id: Uuid,
    exercise: Exercise,
    validator: Box<dyn RepValidator>,
    voice: Box<dyn CueSink>,
    muted: bool,
    cue: Option<String>,
    last_spoken: Option<String>,
    activity: VecDeque<u8>,
    reps: Vec<RepRow>,
    started_at: DateTime<Utc>,
}

impl CoachSession {
    pub fn new(validator: Box<dyn RepValidator>, voice: Box<dyn CueSink>) -> Self {
        let exercise = validator.exercise();
        Self {
            id: Uuid::new_v4(),
            exercise,
            validator,
            voice,
            muted: false,
            cue: None,
            last_spoken: None,
            activity: VecDeque::with_capacity(ACTIVITY_LEN),
            reps: Vec::new(),
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn exercise(&self) -> Exercise {
        self.exercise
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn reps(&self) -> &[RepRow] {
        &self.reps
    }

    /// Recent phase trail, 1 for frames spent in `Down`.
    pub fn activity(&self) -> impl Iterator<Item = u8> + '_ {
        self.activity.iter().copied()
    }

    pub fn handle(&mut self, update: &PoseUpdate) -> SessionSnapshot {
        let Some(frame) = update.frame() else {
            self.cue = None;
            let state = self.validator.validate(None, update.timestamp_ms);
            return SessionSnapshot {
                rep_count: state.rep_count,
                phase: state.phase,
                cue: None,
            };
        };

        let state = self.validator.validate(Some(frame), update.timestamp_ms);

        for metric in state.metrics.iter().skip(self.reps.len()) {
            let row = RepRow {
                idx: self.reps.len() + 1,
                start_ms: metric.start_ts.round() as i64,
                end_ms: metric.end_ts.round() as i64,
                peak_depth: metric.peak_depth,
                peak_angle: metric.peak_angle,
            };
            info!(exercise = %self.exercise, rep = row.idx, "Rep completed");
            self.reps.push(row);
        }

        self.cue = state.cues.first().cloned();
        if let Some(cue) = &self.cue {
            if !self.muted && self.last_spoken.as_ref() != Some(cue) {
                self.voice.speak(cue);
                self.last_spoken = Some(cue.clone());
            }
        }

        if self.activity.len() == ACTIVITY_LEN {
            self.activity.pop_front();
        }
        self.activity.push_back(u8::from(state.phase == Phase::Down));

        SessionSnapshot {
            rep_count: state.rep_count,
            phase: state.phase,
            cue: self.cue.clone(),
        }
    }

    /// Consumes updates until the channel closes, feeding the validator and,
    /// when given, a running calibration.
    pub async fn follow(
        &mut self,
        rx: &mut broadcast::Receiver<PoseUpdate>,
        mut calibration: Option<&mut CalibrationEngine>,
    ) {
        loop {
            match rx.recv().await {
                Ok(update) => {
                    if let Some(engine) = calibration.as_deref_mut() {
                        engine.record(update.frame(), update.timestamp_ms);
                    }
                    self.handle(&update);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Session fell behind the pose stream");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    pub fn finish(&self) -> SessionSummary {
        let ended_at = Utc::now();
        SessionSummary {
            id: self.id,
            exercise: self.exercise,
            started_at: self.started_at,
            ended_at,
            total_reps: self.reps.len(),
            total_time_seconds: (ended_at - self.started_at).num_seconds(),
        }
    }
}
