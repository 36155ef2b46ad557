// src/simulation.rs - synthetic pose source used when no model backend is wired in
use image::DynamicImage;
use std::f64::consts::PI;

use crate::landmarks::{BilateralJoint, Landmark, Side, POSE_LANDMARK_COUNT};
use crate::tracking::{FrameSource, PoseEstimator};
use crate::validators::Exercise;

const SEGMENT_LENGTH: f64 = 0.2;
const DEFAULT_VISIBILITY: f64 = 0.9;

/// Builds a full skeleton with every landmark parked at frame centre, except
/// `joint` (both sides) which is posed to bend by exactly `angle_deg`.
pub fn pose_with_joint_angle(joint: &BilateralJoint, angle_deg: f64) -> Vec<Landmark> {
    let mut frame = vec![Landmark::new(0.5, 0.5, 0.0, DEFAULT_VISIBILITY); POSE_LANDMARK_COUNT];
    let bend = (180.0 - angle_deg).to_radians();

    for side in [Side::Left, Side::Right] {
        let chain = joint.chain(side);
        let vertex = Landmark::new(0.5, 0.5, 0.0, DEFAULT_VISIBILITY);
        frame[chain.vertex] = vertex;
        frame[chain.distal] = Landmark::new(vertex.x, vertex.y + SEGMENT_LENGTH, 0.0, DEFAULT_VISIBILITY);
        frame[chain.proximal] = Landmark::new(
            vertex.x + SEGMENT_LENGTH * bend.sin(),
            vertex.y - SEGMENT_LENGTH * bend.cos(),
            0.0,
            DEFAULT_VISIBILITY,
        );
    }

    frame
}

/// Cycles a skeleton through the motion of one exercise.
pub struct SimulatedPoseEstimator {
    exercise: Exercise,
    period_secs: f64,
    jitter_deg: f64,
}

impl SimulatedPoseEstimator {
    pub fn new(exercise: Exercise) -> Self {
        Self {
            exercise,
            period_secs: 3.0,
            jitter_deg: 0.5,
        }
    }

    /// Joint angle the simulation shows at `timestamp_ms`.
    pub fn angle_at(&self, timestamp_ms: f64) -> f64 {
        let t = timestamp_ms / 1000.0;
        let progress = (1.0 - (2.0 * PI * t / self.period_secs).cos()) / 2.0;
        let jitter = self.jitter_deg * (timestamp_ms * 0.37).sin();

        let angle = match self.exercise {
            Exercise::Squat => 175.0 - 85.0 * progress,
            Exercise::Pushup => 172.0 - 92.0 * progress,
            // Mostly straight, with a brief sag each period
            Exercise::Plank => 176.0 - 28.0 * progress.powi(6),
        };
        (angle + jitter).min(180.0)
    }
}

impl PoseEstimator for SimulatedPoseEstimator {
    fn estimate(&mut self, _frame: &DynamicImage, timestamp_ms: f64) -> anyhow::Result<Option<Vec<Landmark>>> {
        let joint = self.exercise.tracked_joint();
        Ok(Some(pose_with_joint_angle(joint, self.angle_at(timestamp_ms))))
    }
}

pub struct BlankFrameSource {
    width: u32,
    height: u32,
}

impl BlankFrameSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for BlankFrameSource {
    fn default() -> Self {
        Self::new(640, 480)
    }
}

impl FrameSource for BlankFrameSource {
    fn read_frame(&mut self) -> anyhow::Result<DynamicImage> {
        Ok(DynamicImage::new_rgb8(self.width, self.height))
    }
}
