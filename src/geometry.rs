// src/geometry.rs
use nalgebra::{Vector2, Vector3};

use crate::landmarks::Landmark;

pub const DEFAULT_ALPHA: f64 = 0.5;

/// Angle at `p2` between the rays to `p1` and `p3`, in degrees, measured on
/// the image plane (x, y). A zero-length ray yields 0.
pub fn angle_between(p1: &Landmark, p2: &Landmark, p3: &Landmark) -> f64 {
    let a = Vector2::new(p1.x - p2.x, p1.y - p2.y);
    let b = Vector2::new(p3.x - p2.x, p3.y - p2.y);

    let mag_a = a.norm();
    let mag_b = b.norm();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    let cos_angle = (a.dot(&b) / (mag_a * mag_b)).clamp(-1.0, 1.0);
    cos_angle.acos().to_degrees()
}

pub fn exponential_moving_average(prev: f64, next: f64, alpha: f64) -> f64 {
    alpha * next + (1.0 - alpha) * prev
}

pub fn clamp(v: f64, min: f64, max: f64) -> f64 {
    v.max(min).min(max)
}

/// Centroid of a set of landmarks. An empty set averages to the origin.
pub fn average_points(points: &[Landmark]) -> Vector3<f64> {
    if points.is_empty() {
        return Vector3::zeros();
    }
    let sum = points
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.position());
    sum / points.len() as f64
}
