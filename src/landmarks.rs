// src/landmarks.rs
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// MediaPipe pose landmark indices
pub const POSE_LANDMARK_COUNT: usize = 33;
pub const LEFT_SHOULDER: usize = 11;
pub const RIGHT_SHOULDER: usize = 12;
pub const LEFT_ELBOW: usize = 13;
pub const RIGHT_ELBOW: usize = 14;
pub const LEFT_WRIST: usize = 15;
pub const RIGHT_WRIST: usize = 16;
pub const LEFT_HIP: usize = 23;
pub const RIGHT_HIP: usize = 24;
pub const LEFT_KNEE: usize = 25;
pub const RIGHT_KNEE: usize = 26;
pub const LEFT_ANKLE: usize = 27;
pub const RIGHT_ANKLE: usize = 28;

/// A tracked joint in normalized frame coordinates with the detector's
/// confidence that it is visible.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub visibility: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64, z: f64, visibility: f64) -> Self {
        Self { x, y, z, visibility }
    }

    pub fn position(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }
}

/// One published tick of the pose engine. `landmarks` is `None` when no body
/// was found.
#[derive(Debug, Clone)]
pub struct PoseUpdate {
    pub timestamp_ms: f64,
    pub landmarks: Option<Arc<[Landmark]>>,
}

impl PoseUpdate {
    pub fn frame(&self) -> Option<&[Landmark]> {
        self.landmarks.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Three landmarks forming a joint angle at `vertex`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JointChain {
    pub proximal: usize,
    pub vertex: usize,
    pub distal: usize,
}

impl JointChain {
    pub const fn new(proximal: usize, vertex: usize, distal: usize) -> Self {
        Self { proximal, vertex, distal }
    }

    /// The three landmarks of the chain, or `None` if the frame is too short.
    pub fn resolve<'a>(&self, frame: &'a [Landmark]) -> Option<(&'a Landmark, &'a Landmark, &'a Landmark)> {
        Some((
            frame.get(self.proximal)?,
            frame.get(self.vertex)?,
            frame.get(self.distal)?,
        ))
    }

    fn visibility(&self, frame: &[Landmark]) -> f64 {
        [self.proximal, self.vertex, self.distal]
            .iter()
            .map(|&i| frame.get(i).map(|lm| lm.visibility).unwrap_or(0.0))
            .sum()
    }
}

/// Left/right variants of the same anatomical joint.
#[derive(Debug, Clone, Copy)]
pub struct BilateralJoint {
    pub left: JointChain,
    pub right: JointChain,
}

impl BilateralJoint {
    pub fn chain(&self, side: Side) -> JointChain {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }
}

pub const KNEE: BilateralJoint = BilateralJoint {
    left: JointChain::new(LEFT_HIP, LEFT_KNEE, LEFT_ANKLE),
    right: JointChain::new(RIGHT_HIP, RIGHT_KNEE, RIGHT_ANKLE),
};

pub const ELBOW: BilateralJoint = BilateralJoint {
    left: JointChain::new(LEFT_SHOULDER, LEFT_ELBOW, LEFT_WRIST),
    right: JointChain::new(RIGHT_SHOULDER, RIGHT_ELBOW, RIGHT_WRIST),
};

pub const HIP: BilateralJoint = BilateralJoint {
    left: JointChain::new(LEFT_SHOULDER, LEFT_HIP, LEFT_KNEE),
    right: JointChain::new(RIGHT_SHOULDER, RIGHT_HIP, RIGHT_KNEE),
};

/// Picks the side the detector is more confident about. The right side wins
/// only with a strictly greater visibility sum.
pub fn select_side(frame: &[Landmark], joint: &BilateralJoint) -> Side {
    if joint.right.visibility(frame) > joint.left.visibility(frame) {
        Side::Right
    } else {
        Side::Left
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with(left_vis: f64, right_vis: f64) -> Vec<Landmark> {
        let mut frame = vec![Landmark::new(0.5, 0.5, 0.0, 0.0); POSE_LANDMARK_COUNT];
        for i in [LEFT_HIP, LEFT_KNEE, LEFT_ANKLE] {
            frame[i].visibility = left_vis;
        }
        for i in [RIGHT_HIP, RIGHT_KNEE, RIGHT_ANKLE] {
            frame[i].visibility = right_vis;
        }
        frame
    }

    #[test]
    fn test_select_side_prefers_confident_side() {
        assert_eq!(select_side(&frame_with(0.2, 0.9), &KNEE), Side::Right);
        assert_eq!(select_side(&frame_with(0.9, 0.2), &KNEE), Side::Left);
    }

    #[test]
    fn test_select_side_tie_is_left() {
        assert_eq!(select_side(&frame_with(0.5, 0.5), &KNEE), Side::Left);
    }

    #[test]
    fn test_short_frame_resolves_to_none() {
        let frame = vec![Landmark::new(0.0, 0.0, 0.0, 1.0); 20];
        assert!(KNEE.left.resolve(&frame).is_none());
        assert!(ELBOW.left.resolve(&frame).is_some());
        assert_eq!(select_side(&frame, &KNEE), Side::Left);
    }
}
