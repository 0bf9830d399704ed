//! Angle math over 2D joint positions.
//!
//! Only x/y are used; depth from a monocular estimator is too noisy to
//! drive rep counting. Degenerate input returns 0 instead of NaN.

use crate::pose::Joint;

const EPSILON: f32 = 1e-6;

/// Angle at vertex `b` between rays b→a and b→c, in degrees [0, 180]
pub fn angle(a: &Joint, b: &Joint, c: &Joint) -> f32 {
    let ba = (a.x - b.x, a.y - b.y);
    let bc = (c.x - b.x, c.y - b.y);

    let mag_ba = (ba.0 * ba.0 + ba.1 * ba.1).sqrt();
    let mag_bc = (bc.0 * bc.0 + bc.1 * bc.1).sqrt();
    if mag_ba < EPSILON || mag_bc < EPSILON {
        return 0.0;
    }

    let cos_angle = ((ba.0 * bc.0 + ba.1 * bc.1) / (mag_ba * mag_bc)).clamp(-1.0, 1.0);
    cos_angle.acos().to_degrees()
}

/// How far `p1` sits off the straight line p0–p2, in degrees
///
/// Perpendicular distance of p1 from the baseline (cross product over
/// baseline length), clipped to [0, 1] and mapped through asin.
pub fn line_deviation(p0: &Joint, p1: &Joint, p2: &Joint) -> f32 {
    let line = (p2.x - p0.x, p2.y - p0.y);
    let mid = (p1.x - p0.x, p1.y - p0.y);

    let length = (line.0 * line.0 + line.1 * line.1).sqrt();
    if length < EPSILON {
        return 0.0;
    }

    let cross = line.0 * mid.1 - line.1 * mid.0;
    let deviation = (cross.abs() / length).clamp(0.0, 1.0);
    deviation.asin().to_degrees()
}

/// Inclination of the segment a→b from the image horizontal, degrees [0, 90]
pub fn inclination(a: &Joint, b: &Joint) -> f32 {
    let dx = (b.x - a.x).abs();
    let dy = (b.y - a.y).abs();
    if dx < EPSILON && dy < EPSILON {
        return 0.0;
    }
    dy.atan2(dx).to_degrees()
}
