// src/validators/plank.rs
use tracing::debug;

use super::{hip_angle, Debouncer, Exercise, Phase, RepMetric, RepValidator, ValidatorConfig, ValidatorState};
use crate::landmarks::Landmark;

/// Counts each continuous straight-body hold as one rep.
pub struct PlankValidator {
    config: ValidatorConfig,
    state: ValidatorState,
    debouncer: Debouncer,
    hold_start: Option<f64>,
    lowest_hip: f64,
}

impl PlankValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self {
            config,
            state: ValidatorState::default(),
            debouncer: Debouncer::default(),
            hold_start: None,
            lowest_hip: 180.0,
        }
    }

    /// Milliseconds spent in the current hold, if one is in progress.
    pub fn hold_elapsed_ms(&self, timestamp_ms: f64) -> Option<f64> {
        self.hold_start.map(|start| (timestamp_ms - start).max(0.0))
    }
}

impl RepValidator for PlankValidator {
    fn exercise(&self) -> Exercise {
        Exercise::Plank
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
        let min_hip_angle = config.plank.min_hip_angle;
        let debounce_frames = config.debounce_frames;

        let Some(hip) = landmarks.and_then(hip_angle) else {
            return &self.state;
        };

        let desired = if hip >= min_hip_angle { Phase::Hold } else { Phase::Idle };
        if self.debouncer.observe(self.state.phase, desired, debounce_frames) {
            self.state.phase = desired;
            if desired == Phase::Hold {
                self.hold_start = Some(timestamp_ms);
                self.lowest_hip = hip;
                self.state.cues.push("Maintain straight line".to_string());
            } else {
                if let Some(start) = self.hold_start.take() {
                    if timestamp_ms > start {
                        self.state.rep_count += 1;
                        self.state.metrics.push(RepMetric {
                            start_ts: start,
                            end_ts: timestamp_ms,
                            peak_depth: None,
                            peak_angle: Some(self.lowest_hip),
                        });
                        debug!(holds = self.state.rep_count, held_ms = timestamp_ms - start, "Plank hold ended");
                    }
                }
                self.state.cues.push("Hips down, squeeze glutes".to_string());
            }
        } else if self.state.phase == Phase::Hold {
            self.lowest_hip = self.lowest_hip.min(hip);
        }

        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::HIP;
    use crate::simulation::pose_with_joint_angle;

    fn feed(v: &mut PlankValidator, angle: f64, frames: usize, ts: &mut f64) {
        let frame = pose_with_joint_angle(&HIP, angle);
        for _ in 0..frames {
            *ts += 33.0;
            v.validate(Some(&frame), *ts);
        }
    }

    #[test]
    fn test_hold_episode_counts_once() {
        let mut v = PlankValidator::new(ValidatorConfig::default());
        let mut ts = 0.0;
        feed(&mut v, 120.0, 5, &mut ts);
        assert_eq!(v.state().phase, Phase::Idle);

        feed(&mut v, 175.0, 30, &mut ts);
        assert_eq!(v.state().phase, Phase::Hold);
        feed(&mut v, 165.0, 10, &mut ts);
        assert_eq!(v.state().rep_count, 0);
        assert!(v.hold_elapsed_ms(ts).unwrap() > 1000.0);

        feed(&mut v, 140.0, 3, &mut ts);
        let state = v.state();
        assert_eq!(state.phase, Phase::Idle);
        assert_eq!(state.rep_count, 1);

        // Sagging frames still inside the hold count toward its low point
        let metric = &state.metrics[0];
        assert!((metric.peak_angle.unwrap() - 140.0).abs() < 1e-6);
        // Hold committed on the third straight frame and ended on the third sagging one
        assert!((metric.duration_ms() - 40.0 * 33.0).abs() < 1e-6);
        assert!(v.hold_elapsed_ms(ts).is_none());
    }

    #[test]
    fn test_brief_sag_does_not_end_hold() {
        let mut v = PlankValidator::new(ValidatorConfig::default());
        let mut ts = 0.0;
        feed(&mut v, 176.0, 5, &mut ts);
        feed(&mut v, 130.0, 2, &mut ts);
        feed(&mut v, 176.0, 5, &mut ts);
        assert_eq!(v.state().phase, Phase::Hold);
        assert_eq!(v.state().rep_count, 0);
    }

    #[test]
    fn test_missing_pose_leaves_hold_untouched() {
        let mut v = PlankValidator::new(ValidatorConfig::default());
        let mut ts = 0.0;
        feed(&mut v, 175.0, 3, &mut ts);
        assert_eq!(v.state().phase, Phase::Hold);
        assert_eq!(v.state().cues, vec!["Maintain straight line".to_string()]);

        let short = pose_with_joint_angle(&HIP, 175.0)[..20].to_vec();
        for i in 0..30 {
            ts += 33.0;
            let landmarks = if i % 2 == 0 { None } else { Some(short.as_slice()) };
            let state = v.validate(landmarks, ts);
            assert_eq!(state.phase, Phase::Hold);
            assert_eq!(state.rep_count, 0);
            assert!(state.cues.is_empty());
        }

        feed(&mut v, 140.0, 3, &mut ts);
        assert_eq!(v.state().rep_count, 1);
        assert_eq!(v.state().metrics.len(), 1);
    }

    #[test]
    fn test_custom_threshold() {
        let config = ValidatorConfig {
            debounce_frames: 1,
            plank: crate::validators::PlankThresholds { min_hip_angle: 170.0 },
            ..ValidatorConfig::default()
        };
        let mut v = PlankValidator::new(config);
        let frame = pose_with_joint_angle(&HIP, 165.0);
        let state = v.validate(Some(&frame), 33.0);
        assert_eq!(state.phase, Phase::Idle);
        assert!(state.cues.is_empty());
    }
}
