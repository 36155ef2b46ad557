// src/validators/squat.rs
use tracing::debug;

use super::{
    squat_depth, Debouncer, Exercise, Phase, RepMetric, RepValidator, SquatThresholds, ValidatorConfig,
    ValidatorState,
};
use crate::landmarks::Landmark;

pub struct SquatValidator {
    config: ValidatorConfig,
    state: ValidatorState,
    debouncer: Debouncer,
    rep_start: Option<f64>,
    peak_depth: f64,
}

impl SquatValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self {
            config,
            state: ValidatorState::default(),
            debouncer: Debouncer::default(),
            rep_start: None,
            peak_depth: 0.0,
        }
    }

    fn desired_phase(&self, depth: f64, thresholds: &SquatThresholds) -> Phase {
        match self.state.phase {
            Phase::Down if depth < thresholds.rise_depth() => Phase::Up,
            Phase::Down => Phase::Down,
            _ if depth > thresholds.down_depth => Phase::Down,
            current => current,
        }
    }

    fn finish_rep(&mut self, start: f64, timestamp_ms: f64) {
        if timestamp_ms > start {
            self.state.rep_count += 1;
            self.state.metrics.push(RepMetric {
                start_ts: start,
                end_ts: timestamp_ms,
                peak_depth: Some(self.peak_depth),
                peak_angle: None,
            });
            debug!(reps = self.state.rep_count, peak_depth = self.peak_depth, "Squat rep completed");
        }
        self.peak_depth = 0.0;
        self.state.phase = Phase::Idle;
        self.debouncer.reset();
    }
}

impl RepValidator for SquatValidator {
    fn exercise(&self) -> Exercise {
        Exercise::Squat
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
        let thresholds = config.squat;
        let debounce_frames = config.debounce_frames;

        let Some(depth) = landmarks.and_then(squat_depth) else {
            return &self.state;
        };

        let desired = self.desired_phase(depth, &thresholds);
        if self.debouncer.observe(self.state.phase, desired, debounce_frames) {
            self.state.phase = desired;
            match desired {
                Phase::Down => {
                    self.rep_start.get_or_insert(timestamp_ms);
                    self.state.cues.push("Hips back, chest up".to_string());
                }
                Phase::Up => self.state.cues.push("Drive up through heels".to_string()),
                _ => {}
            }
        }

        if self.state.phase == Phase::Down {
            self.peak_depth = self.peak_depth.max(depth);
        }

        if self.state.phase == Phase::Up && depth < thresholds.up_depth {
            if let Some(start) = self.rep_start.take() {
                self.finish_rep(start, timestamp_ms);
            }
        }

        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::derive_thresholds;
    use crate::landmarks::KNEE;
    use crate::simulation::pose_with_joint_angle;
    use crate::validators::ExerciseThresholds;

    const FRAME_MS: f64 = 16.0;

    fn depth_frame(depth: f64) -> Vec<Landmark> {
        pose_with_joint_angle(&KNEE, 180.0 - depth)
    }

    fn calibrated() -> ValidatorConfig {
        ValidatorConfig {
            debounce_frames: 3,
            squat: SquatThresholds { down_depth: 35.0, up_depth: 10.0 },
            ..ValidatorConfig::default()
        }
    }

    /// Feeds each depth `hold` times at 16ms spacing.
    fn feed(validator: &mut SquatValidator, depths: &[f64], hold: usize, ts: &mut f64) {
        for &depth in depths {
            let frame = depth_frame(depth);
            for _ in 0..hold {
                *ts += FRAME_MS;
                validator.validate(Some(&frame), *ts);
            }
        }
    }

    #[test]
    fn test_single_rep_with_peak_depth() {
        let mut v = SquatValidator::new(calibrated());
        let mut ts = 0.0;
        feed(&mut v, &[0.0, 0.0, 40.0, 45.0, 50.0, 18.0, 8.0, 0.0], 3, &mut ts);

        let state = v.state();
        assert_eq!(state.rep_count, 1);
        assert_eq!(state.phase, Phase::Idle);
        assert_eq!(state.metrics.len(), 1);
        let metric = &state.metrics[0];
        assert!((metric.peak_depth.unwrap() - 50.0).abs() < 1e-6);
        assert!(metric.end_ts > metric.start_ts);
        assert!(metric.peak_angle.is_none());
    }

    #[test]
    fn test_single_frame_spike_is_ignored() {
        let mut v = SquatValidator::new(calibrated());
        let mut ts = 0.0;
        for depth in [0.0, 60.0, 0.0, 0.0, 70.0, 0.0] {
            ts += FRAME_MS;
            let state = v.validate(Some(&depth_frame(depth)), ts);
            assert_eq!(state.phase, Phase::Idle);
            assert_eq!(state.rep_count, 0);
        }
    }

    #[test]
    fn test_null_frames_are_inert() {
        let mut v = SquatValidator::new(calibrated());
        let mut ts = 0.0;
        feed(&mut v, &[50.0], 3, &mut ts);
        assert_eq!(v.state().phase, Phase::Down);

        for _ in 0..10 {
            ts += FRAME_MS;
            let state = v.validate(None, ts);
            assert_eq!(state.phase, Phase::Down);
            assert_eq!(state.rep_count, 0);
            assert!(state.cues.is_empty());
        }
    }

    #[test]
    fn test_null_frames_neither_advance_nor_reset_debounce() {
        let mut v = SquatValidator::new(calibrated());
        let frame = depth_frame(45.0);
        v.validate(Some(&frame), 16.0);
        v.validate(Some(&frame), 32.0);
        v.validate(None, 48.0);
        v.validate(None, 64.0);
        assert_eq!(v.state().phase, Phase::Idle);

        let state = v.validate(Some(&frame), 80.0);
        assert_eq!(state.phase, Phase::Down);
        assert_eq!(state.cues, vec!["Hips back, chest up".to_string()]);
    }

    #[test]
    fn test_cues_only_on_transition_frames() {
        let mut v = SquatValidator::new(calibrated());
        let frame = depth_frame(50.0);
        let mut cue_frames = 0;
        for i in 0..8 {
            if !v.validate(Some(&frame), i as f64 * FRAME_MS).cues.is_empty() {
                cue_frames += 1;
            }
        }
        assert_eq!(cue_frames, 1);
    }

    #[test]
    fn test_defaults_count_consecutive_reps() {
        let mut v = SquatValidator::new(ValidatorConfig::default());
        let mut ts = 0.0;
        for _ in 0..3 {
            feed(&mut v, &[0.0, 60.0, 90.0, 30.0, 15.0, 2.0], 4, &mut ts);
        }
        let state = v.state();
        assert_eq!(state.rep_count, 3);
        for metric in &state.metrics {
            assert!((metric.peak_depth.unwrap() - 90.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_calibrated_thresholds_count_shallow_standing_user() {
        let samples = [8.0, 40.0, 90.0, 40.0, 8.0];
        let thresholds = derive_thresholds(Exercise::Squat, &samples).unwrap();
        assert_eq!(
            thresholds,
            ExerciseThresholds::Squat(SquatThresholds { down_depth: 54.0, up_depth: 10.0 })
        );

        let mut defaults = SquatValidator::new(ValidatorConfig::default());
        let mut tuned = SquatValidator::new(ValidatorConfig::default().with_thresholds(thresholds));
        let (mut ts_a, mut ts_b) = (0.0, 0.0);
        for _ in 0..5 {
            feed(&mut defaults, &samples, 4, &mut ts_a);
            feed(&mut tuned, &samples, 4, &mut ts_b);
        }

        assert_eq!(defaults.state().rep_count, 5);
        assert_eq!(tuned.state().rep_count, 5);
        assert_eq!(tuned.state().phase, Phase::Idle);
        for metric in &tuned.state().metrics {
            assert!((metric.peak_depth.unwrap() - 90.0).abs() < 1e-6);
            assert!(metric.end_ts - metric.start_ts < 4.0 * 5.0 * FRAME_MS);
        }
    }

    #[test]
    fn test_per_call_config_override() {
        let mut v = SquatValidator::new(ValidatorConfig::default());
        let shallow = ValidatorConfig {
            debounce_frames: 1,
            squat: SquatThresholds { down_depth: 20.0, up_depth: 10.0 },
            ..ValidatorConfig::default()
        };
        let state = v.validate_with(Some(&depth_frame(25.0)), 16.0, Some(&shallow));
        assert_eq!(state.phase, Phase::Down);
    }
}
