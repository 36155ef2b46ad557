// src/validators/pushup.rs
use tracing::debug;

use super::{
    elbow_angle, Debouncer, Exercise, Phase, PushupThresholds, RepMetric, RepValidator, ValidatorConfig,
    ValidatorState,
};
use crate::landmarks::Landmark;

const STRAIGHT_ARM: f64 = 180.0;

pub struct PushupValidator {
    config: ValidatorConfig,
    state: ValidatorState,
    debouncer: Debouncer,
    rep_start: Option<f64>,
    // Smallest elbow angle seen during the current descent
    lowest_elbow: f64,
}

impl PushupValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self {
            config,
            state: ValidatorState::default(),
            debouncer: Debouncer::default(),
            rep_start: None,
            lowest_elbow: STRAIGHT_ARM,
        }
    }

    fn desired_phase(&self, elbow: f64, thresholds: &PushupThresholds) -> Phase {
        match self.state.phase {
            Phase::Down if elbow > thresholds.top_elbow => Phase::Up,
            Phase::Down => Phase::Down,
            _ if elbow < thresholds.bottom_elbow => Phase::Down,
            current => current,
        }
    }
}

impl RepValidator for PushupValidator {
    fn exercise(&self) -> Exercise {
        Exercise::Pushup
    }

    fn state(&self) -> &ValidatorState {
        &self.state
    }

    fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    fn validate_with(
        &mut self,
        landmarks: Option<&[Landmark]>,
        timestamp_ms: f64,
        config: Option<&ValidatorConfig>,
    ) -> &ValidatorState {
        self.state.cues.clear();
        let config = config.unwrap_or(&self.config);
        let thresholds = config.pushup;
        let debounce_frames = config.debounce_frames;

        let Some(elbow) = landmarks.and_then(elbow_angle) else {
            return &self.state;
        };

        let desired = self.desired_phase(elbow, &thresholds);
        if self.debouncer.observe(self.state.phase, desired, debounce_frames) {
            self.state.phase = desired;
            match desired {
                Phase::Down => {
                    self.rep_start.get_or_insert(timestamp_ms);
                    self.state.cues.push("Keep core tight".to_string());
                }
                Phase::Up => self.state.cues.push("Press up strong".to_string()),
                _ => {}
            }
        }

        if self.state.phase == Phase::Down {
            self.lowest_elbow = self.lowest_elbow.min(elbow);
        }

        if self.state.phase == Phase::Up && elbow > thresholds.complete_elbow() {
            if let Some(start) = self.rep_start.take() {
                if timestamp_ms > start {
                    self.state.rep_count += 1;
                    self.state.metrics.push(RepMetric {
                        start_ts: start,
                        end_ts: timestamp_ms,
                        peak_depth: None,
                        peak_angle: Some(self.lowest_elbow),
                    });
                    debug!(reps = self.state.rep_count, lowest_elbow = self.lowest_elbow, "Pushup rep completed");
                }
                self.lowest_elbow = STRAIGHT_ARM;
                self.state.phase = Phase::Idle;
                self.debouncer.reset();
            }
        }

        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{ELBOW, LEFT_ELBOW, RIGHT_ELBOW, RIGHT_SHOULDER, RIGHT_WRIST};
    use crate::simulation::pose_with_joint_angle;

    fn run(v: &mut PushupValidator, angles: &[f64], hold: usize, ts: &mut f64) {
        for &angle in angles {
            let frame = pose_with_joint_angle(&ELBOW, angle);
            for _ in 0..hold {
                *ts += 33.0;
                v.validate(Some(&frame), *ts);
            }
        }
    }

    #[test]
    fn test_counts_rep_with_lowest_elbow() {
        let mut v = PushupValidator::new(ValidatorConfig::default());
        let mut ts = 0.0;
        run(&mut v, &[175.0, 130.0, 95.0, 80.0, 120.0, 168.0, 176.0], 3, &mut ts);

        let state = v.state();
        assert_eq!(state.rep_count, 1);
        assert_eq!(state.phase, Phase::Idle);
        let metric = &state.metrics[0];
        assert!((metric.peak_angle.unwrap() - 80.0).abs() < 1e-6);
        assert!(metric.peak_depth.is_none());
    }

    #[test]
    fn test_half_rep_does_not_count() {
        let mut v = PushupValidator::new(ValidatorConfig::default());
        let mut ts = 0.0;
        // Never drops below the bottom threshold
        run(&mut v, &[175.0, 150.0, 145.0, 176.0], 5, &mut ts);
        assert_eq!(v.state().rep_count, 0);
        assert_eq!(v.state().phase, Phase::Idle);
    }

    #[test]
    fn test_uses_more_visible_arm() {
        let mut v = PushupValidator::new(ValidatorConfig { debounce_frames: 1, ..ValidatorConfig::default() });

        // Left arm bent but barely visible; right arm straight and confident
        let mut frame = pose_with_joint_angle(&ELBOW, 90.0);
        let straight = pose_with_joint_angle(&ELBOW, 178.0);
        for i in [RIGHT_SHOULDER, RIGHT_ELBOW, RIGHT_WRIST] {
            frame[i] = straight[i];
        }
        frame[LEFT_ELBOW].visibility = 0.1;

        let state = v.validate(Some(&frame), 10.0);
        assert_eq!(state.phase, Phase::Idle);
    }

    #[test]
    fn test_null_frame_clears_cues_only() {
        let mut v = PushupValidator::new(ValidatorConfig { debounce_frames: 1, ..ValidatorConfig::default() });
        let frame = pose_with_joint_angle(&ELBOW, 90.0);
        assert_eq!(v.validate(Some(&frame), 10.0).cues.len(), 1);

        for i in 0..20 {
            let state = v.validate(None, 20.0 + i as f64 * 10.0);
            assert!(state.cues.is_empty());
            assert_eq!(state.phase, Phase::Down);
            assert_eq!(state.rep_count, 0);
        }
    }
}
