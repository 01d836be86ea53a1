//! Geometry primitives used by both pipelines.
//!
//! - [`angle_between`] measures a joint angle from three 2-D keypoints.
//! - [`rotation_to_euler`] decomposes a rotation matrix into roll / pitch /
//!   yaw using the XYZ Tait–Bryan extraction, with a fixed policy for the
//!   gimbal-lock case.
//! - [`axis_angle_to_matrix`] converts the axis-angle vector carried by a
//!   [`Pose`][towcar_types::Pose] into a rotation matrix.
//!
//! # Example
//!
//! ```rust
//! use nalgebra::Point2;
//! use towcar_perception::geometry::angle_between;
//!
//! let a = Point2::new(0.0, 0.0);
//! let b = Point2::new(1.0, 0.0);
//! let c = Point2::new(1.0, 1.0);
//! assert!((angle_between(a, b, c) - 90.0).abs() < 1e-4);
//! ```

use nalgebra::{Matrix3, Point2, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

/// Below this value of `sqrt(R00² + R10²)` the decomposition is treated as
/// gimbal-locked.
pub const GIMBAL_EPSILON: f64 = 1e-6;

// ────────────────────────────────────────────────────────────────────────────
// Joint angles
// ────────────────────────────────────────────────────────────────────────────

/// Unsigned angle at vertex `b` formed by the rays `b → a` and `b → c`, in
/// degrees within `[0, 180]`.
///
/// Computed as the difference of the two `atan2` bearings, folded back into
/// range as `360 − angle` when it exceeds 180°.
pub fn angle_between(a: Point2<f32>, b: Point2<f32>, c: Point2<f32>) -> f32 {
    let radians = (c.y - b.y).atan2(c.x - b.x) - (a.y - b.y).atan2(a.x - b.x);
    let angle = radians.to_degrees().abs();
    if angle > 180.0 { 360.0 - angle } else { angle }
}

// ────────────────────────────────────────────────────────────────────────────
// Orientation
// ────────────────────────────────────────────────────────────────────────────

/// Orientation of a marker relative to the camera, in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EulerAngles {
    /// Rotation about the camera Z axis.
    pub roll: f64,
    /// Rotation about the camera X axis.
    pub pitch: f64,
    /// Rotation about the camera Y axis.
    pub yaw: f64,
}

/// Decompose `r` into [`EulerAngles`].
///
/// With `sy = sqrt(R00² + R10²)`:
/// - `sy ≥ 1e-6`: `pitch = atan2(R21, R22)`, `yaw = atan2(−R20, sy)`,
///   `roll = atan2(R10, R00)`;
/// - otherwise (gimbal lock): `pitch = atan2(−R12, R11)`,
///   `yaw = atan2(−R20, sy)`, `roll = 0`.
pub fn rotation_to_euler(r: &Matrix3<f64>) -> EulerAngles {
    let sy = (r[(0, 0)] * r[(0, 0)] + r[(1, 0)] * r[(1, 0)]).sqrt();

    let (pitch, yaw, roll) = if sy >= GIMBAL_EPSILON {
        (
            r[(2, 1)].atan2(r[(2, 2)]),
            (-r[(2, 0)]).atan2(sy),
            r[(1, 0)].atan2(r[(0, 0)]),
        )
    } else {
        ((-r[(1, 2)]).atan2(r[(1, 1)]), (-r[(2, 0)]).atan2(sy), 0.0)
    };

    EulerAngles {
        roll: roll.to_degrees(),
        pitch: pitch.to_degrees(),
        yaw: yaw.to_degrees(),
    }
}

/// Rodrigues conversion from an axis-angle vector (radians) to a rotation
/// matrix.
pub fn axis_angle_to_matrix(rotation: &Vector3<f64>) -> Matrix3<f64> {
    Rotation3::new(*rotation).into_inner()
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_6, PI};

    fn p(x: f32, y: f32) -> Point2<f32> {
        Point2::new(x, y)
    }

    // ── angle_between ───────────────────────────────────────────────────────

    #[test]
    fn straight_line_is_180() {
        let angle = angle_between(p(0.0, 0.0), p(0.5, 0.0), p(1.0, 0.0));
        assert!((angle - 180.0).abs() < 1e-4);
    }

    #[test]
    fn right_angle_is_90() {
        let angle = angle_between(p(0.0, 0.0), p(0.5, 0.0), p(0.5, 0.5));
        assert!((angle - 90.0).abs() < 1e-4);
    }

    #[test]
    fn reflex_bearing_difference_is_folded() {
        // Bearings of 170° and -170° differ by 340°; the fold gives 20°.
        let b = p(0.0, 0.0);
        let a = p((170f32).to_radians().cos(), (170f32).to_radians().sin());
        let c = p((-170f32).to_radians().cos(), (-170f32).to_radians().sin());
        let angle = angle_between(a, b, c);
        assert!((angle - 20.0).abs() < 1e-3, "angle={angle}");
    }

    #[test]
    fn angle_between_is_symmetric() {
        let cases = [
            (p(0.1, 0.9), p(0.4, 0.3), p(0.8, 0.7)),
            (p(-3.0, 2.0), p(1.0, 1.0), p(0.0, -5.0)),
            (p(0.5, 0.5), p(0.5, 0.4), p(0.49, 0.6)),
        ];
        for (a, b, c) in cases {
            assert_eq!(angle_between(a, b, c), angle_between(c, b, a));
        }
    }

    #[test]
    fn angle_stays_in_range() {
        for i in 0..36 {
            let t = (i as f32 * 10.0).to_radians();
            let angle = angle_between(p(1.0, 0.0), p(0.0, 0.0), p(t.cos(), t.sin()));
            assert!((0.0..=180.0).contains(&angle), "angle={angle}");
        }
    }

    // ── rotation_to_euler ──────────────────────────────────────────────────

    #[test]
    fn identity_has_zero_angles() {
        let e = rotation_to_euler(&Matrix3::identity());
        assert_eq!(e, EulerAngles::default());
    }

    #[test]
    fn pure_z_rotation_is_roll() {
        let r = axis_angle_to_matrix(&Vector3::new(0.0, 0.0, FRAC_PI_6));
        let e = rotation_to_euler(&r);
        assert!((e.roll - 30.0).abs() < 1e-9);
        assert!(e.pitch.abs() < 1e-9);
        assert!(e.yaw.abs() < 1e-9);
    }

    #[test]
    fn pure_x_rotation_is_pitch() {
        let r = axis_angle_to_matrix(&Vector3::new(FRAC_PI_6, 0.0, 0.0));
        let e = rotation_to_euler(&r);
        assert!((e.pitch - 30.0).abs() < 1e-9);
        assert!(e.roll.abs() < 1e-9);
    }

    #[test]
    fn fronto_parallel_marker_pitch_is_half_turn() {
        let r = axis_angle_to_matrix(&Vector3::new(PI, 0.0, 0.0));
        let e = rotation_to_euler(&r);
        assert!((e.pitch.abs() - 180.0).abs() < 1e-6, "pitch={}", e.pitch);
        assert!(e.yaw.abs() < 1e-6);
    }

    #[test]
    fn gimbal_lock_sets_roll_to_zero_without_nan() {
        for sign in [1.0, -1.0] {
            // ±90° about Y puts R00 = R10 = 0.
            let r = axis_angle_to_matrix(&Vector3::new(0.0, sign * FRAC_PI_2, 0.0));
            let e = rotation_to_euler(&r);
            assert_eq!(e.roll, 0.0);
            assert!(!e.pitch.is_nan() && !e.yaw.is_nan());
            assert!((e.yaw - sign * 90.0).abs() < 1e-6, "yaw={}", e.yaw);
        }
    }

    #[test]
    fn exact_singular_matrix_uses_degenerate_branch() {
        let r = Matrix3::new(
            0.0, 0.0, 1.0, //
            0.0, 1.0, 0.0, //
            -1.0, 0.0, 0.0,
        );
        let e = rotation_to_euler(&r);
        assert_eq!(e.roll, 0.0);
        assert!(e.pitch.abs() < 1e-12);
        assert!((e.yaw - 90.0).abs() < 1e-12);
    }
}
