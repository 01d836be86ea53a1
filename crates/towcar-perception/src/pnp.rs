//! Planar square pose estimation.
//!
//! [`PlanarSquarePnp`] is the default [`PoseEstimator`]: it recovers the pose
//! of a square marker of known size from its four image corners.
//!
//! 1. Corners are undistorted into normalised camera coordinates with the
//!    Brown–Conrady model (`k1, k2, p1, p2, k3`), inverted iteratively.
//! 2. A plane-to-image homography is solved from the four correspondences
//!    against the marker's object points
//!    `(−s/2, s/2), (s/2, s/2), (s/2, −s/2), (−s/2, −s/2)`.
//! 3. The homography columns are rescaled into `r1, r2, t` (with `t_z > 0`),
//!    `r3 = r1 × r2`, and the rotation is re-orthonormalised through an SVD.
//!
//! # Example
//!
//! ```rust
//! use nalgebra::{Rotation3, Vector3};
//! use towcar_perception::docking::PoseEstimator;
//! use towcar_perception::pnp::{CameraIntrinsics, PlanarSquarePnp};
//!
//! let intrinsics = CameraIntrinsics::pinhole(800.0, 800.0, 320.0, 240.0);
//! let pnp = PlanarSquarePnp::new(intrinsics.clone());
//!
//! // A 4 cm marker facing the camera, 30 cm away.
//! let r = Rotation3::new(Vector3::new(std::f64::consts::PI, 0.0, 0.0));
//! let t = Vector3::new(0.0, 0.0, 30.0);
//! let corners = PlanarSquarePnp::object_points(4.0)
//!     .map(|p| intrinsics.project(&(r * p.coords + t)));
//!
//! let pose = pnp.estimate(&corners, 4.0).unwrap();
//! assert!((pose.distance() - 30.0).abs() < 1e-6);
//! ```

use nalgebra::{Matrix3, Point2, Point3, Rotation3, SMatrix, SVector, Vector3};
use serde::{Deserialize, Serialize};

use towcar_types::{MarkerCorners, Pose};

use crate::docking::PoseEstimator;

/// Fixed-point iterations used to invert the distortion model.
const UNDISTORT_ITERATIONS: usize = 20;

/// Quads smaller than this (in normalised image units²) are degenerate.
const MIN_QUAD_AREA: f64 = 1e-12;

// ────────────────────────────────────────────────────────────────────────────
// Camera model
// ────────────────────────────────────────────────────────────────────────────

/// Pinhole intrinsics plus Brown–Conrady distortion, as produced by a
/// standard checkerboard calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    #[serde(default = "default_fx")]
    pub fx: f64,
    #[serde(default = "default_fy")]
    pub fy: f64,
    #[serde(default = "default_cx")]
    pub cx: f64,
    #[serde(default = "default_cy")]
    pub cy: f64,
    /// `[k1, k2, p1, p2, k3]`.
    #[serde(default = "default_distortion")]
    pub distortion: [f64; 5],
}

// Calibration of the reference 640×480 camera.
fn default_fx() -> f64 {
    872.23558
}
fn default_fy() -> f64 {
    873.47815
}
fn default_cx() -> f64 {
    315.00614
}
fn default_cy() -> f64 {
    240.01070
}
fn default_distortion() -> [f64; 5] {
    [0.14923, -1.11676, 0.00511, 0.00329, 7.40075]
}

impl Default for CameraIntrinsics {
    fn default() -> Self {
        Self {
            fx: default_fx(),
            fy: default_fy(),
            cx: default_cx(),
            cy: default_cy(),
            distortion: default_distortion(),
        }
    }
}

impl CameraIntrinsics {
    /// Distortion-free intrinsics.
    pub fn pinhole(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            distortion: [0.0; 5],
        }
    }

    /// Project a camera-frame point to pixels, applying distortion.
    ///
    /// Renderers use this to draw a marker's axes.
    pub fn project(&self, point: &Vector3<f64>) -> Point2<f64> {
        let [k1, k2, p1, p2, k3] = self.distortion;
        let x = point.x / point.z;
        let y = point.y / point.z;
        let r2 = x * x + y * y;
        let radial = 1.0 + r2 * (k1 + r2 * (k2 + r2 * k3));
        let xd = x * radial + 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
        let yd = y * radial + p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
        Point2::new(self.fx * xd + self.cx, self.fy * yd + self.cy)
    }

    /// Map a pixel to undistorted normalised camera coordinates.
    pub fn undistort(&self, pixel: &Point2<f64>) -> Point2<f64> {
        let [k1, k2, p1, p2, k3] = self.distortion;
        let x0 = (pixel.x - self.cx) / self.fx;
        let y0 = (pixel.y - self.cy) / self.fy;
        let (mut x, mut y) = (x0, y0);
        for _ in 0..UNDISTORT_ITERATIONS {
            let r2 = x * x + y * y;
            let inv_radial = 1.0 / (1.0 + r2 * (k1 + r2 * (k2 + r2 * k3)));
            let dx = 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
            let dy = p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
            x = (x0 - dx) * inv_radial;
            y = (y0 - dy) * inv_radial;
        }
        Point2::new(x, y)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// PlanarSquarePnp
// ────────────────────────────────────────────────────────────────────────────

/// Homography-based pose estimator for square fiducials.
#[derive(Debug, Clone)]
pub struct PlanarSquarePnp {
    intrinsics: CameraIntrinsics,
}

impl PlanarSquarePnp {
    pub fn new(intrinsics: CameraIntrinsics) -> Self {
        Self { intrinsics }
    }

    pub fn intrinsics(&self) -> &CameraIntrinsics {
        &self.intrinsics
    }

    /// Marker corners in the marker's own frame (z = 0), matching the
    /// detector's top-left, top-right, bottom-right, bottom-left order.
    pub fn object_points(marker_size: f64) -> [Point3<f64>; 4] {
        let h = marker_size / 2.0;
        [
            Point3::new(-h, h, 0.0),
            Point3::new(h, h, 0.0),
            Point3::new(h, -h, 0.0),
            Point3::new(-h, -h, 0.0),
        ]
    }
}

impl PoseEstimator for PlanarSquarePnp {
    fn estimate(&self, corners: &MarkerCorners, marker_size: f64) -> Option<Pose> {
        if !(marker_size > 0.0) {
            return None;
        }

        let image = corners.map(|c| self.intrinsics.undistort(&c));
        if quad_area(&image).abs() < MIN_QUAD_AREA {
            return None;
        }

        let object = Self::object_points(marker_size).map(|p| Point2::new(p.x, p.y));
        let h = homography(&object, &image)?;
        decompose(&h)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Internal helpers
// ────────────────────────────────────────────────────────────────────────────

/// Shoelace area of a quad (signed).
fn quad_area(q: &[Point2<f64>; 4]) -> f64 {
    (0..4)
        .map(|i| {
            let (a, b) = (q[i], q[(i + 1) % 4]);
            a.x * b.y - b.x * a.y
        })
        .sum::<f64>()
        / 2.0
}

/// Solve the 8-DoF homography mapping `src` onto `dst` with `h33 = 1`.
fn homography(src: &[Point2<f64>; 4], dst: &[Point2<f64>; 4]) -> Option<Matrix3<f64>> {
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for (i, (s, d)) in src.iter().zip(dst.iter()).enumerate() {
        let r = 2 * i;
        a[(r, 0)] = s.x;
        a[(r, 1)] = s.y;
        a[(r, 2)] = 1.0;
        a[(r, 6)] = -d.x * s.x;
        a[(r, 7)] = -d.x * s.y;
        b[r] = d.x;

        a[(r + 1, 3)] = s.x;
        a[(r + 1, 4)] = s.y;
        a[(r + 1, 5)] = 1.0;
        a[(r + 1, 6)] = -d.y * s.x;
        a[(r + 1, 7)] = -d.y * s.y;
        b[r + 1] = d.y;
    }

    let h = a.lu().solve(&b)?;
    Some(Matrix3::new(
        h[0], h[1], h[2], //
        h[3], h[4], h[5], //
        h[6], h[7], 1.0,
    ))
}

/// Split a normalised-coordinate homography into a rigid pose.
fn decompose(h: &Matrix3<f64>) -> Option<Pose> {
    let h1: Vector3<f64> = h.column(0).into_owned();
    let h2: Vector3<f64> = h.column(1).into_owned();
    let h3: Vector3<f64> = h.column(2).into_owned();

    let norm = (h1.norm() + h2.norm()) / 2.0;
    if norm < f64::EPSILON {
        return None;
    }

    // The marker must sit in front of the camera.
    let mut scale = 1.0 / norm;
    if h3.z * scale < 0.0 {
        scale = -scale;
    }

    let r1 = h1 * scale;
    let r2 = h2 * scale;
    let approx = Matrix3::from_columns(&[r1, r2, r1.cross(&r2)]);

    let svd = approx.svd(true, true);
    let (u, v_t) = (svd.u?, svd.v_t?);
    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        r = u * Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, -1.0)) * v_t;
    }

    let rotation = Rotation3::from_matrix_unchecked(r).scaled_axis();
    let translation = h3 * scale;

    let finite = rotation.iter().chain(translation.iter()).all(|v| v.is_finite());
    finite.then(|| Pose::new(rotation, translation))
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::axis_angle_to_matrix;
    use std::f64::consts::PI;

    fn render(
        intrinsics: &CameraIntrinsics,
        rotation: &Rotation3<f64>,
        translation: &Vector3<f64>,
        size: f64,
    ) -> MarkerCorners {
        PlanarSquarePnp::object_points(size)
            .map(|p| intrinsics.project(&(rotation * p.coords + translation)))
    }

    #[test]
    fn recovers_fronto_parallel_pose() {
        let intrinsics = CameraIntrinsics::pinhole(872.0, 873.0, 315.0, 240.0);
        let rotation = Rotation3::new(Vector3::new(PI, 0.0, 0.0));
        let translation = Vector3::new(1.5, -0.5, 25.0);
        let corners = render(&intrinsics, &rotation, &translation, 3.4);

        let pose = PlanarSquarePnp::new(intrinsics).estimate(&corners, 3.4).unwrap();
        assert!((pose.translation - translation).norm() < 1e-6, "t={:?}", pose.translation);
        let r = axis_angle_to_matrix(&pose.rotation);
        assert!((r - rotation.into_inner()).norm() < 1e-6);
    }

    #[test]
    fn recovers_oblique_pose() {
        let intrinsics = CameraIntrinsics::pinhole(800.0, 800.0, 320.0, 240.0);
        let rotation = Rotation3::new(Vector3::new(PI, 0.0, 0.0))
            * Rotation3::new(Vector3::new(0.2, -0.35, 0.1));
        let translation = Vector3::new(-2.0, 1.0, 40.0);
        let corners = render(&intrinsics, &rotation, &translation, 5.0);

        let pose = PlanarSquarePnp::new(intrinsics).estimate(&corners, 5.0).unwrap();
        assert!((pose.translation - translation).norm() < 1e-6);
        let r = axis_angle_to_matrix(&pose.rotation);
        assert!((r - rotation.into_inner()).norm() < 1e-6);
    }

    #[test]
    fn undistortion_inverts_projection() {
        let intrinsics = CameraIntrinsics::default();
        let rotation = Rotation3::new(Vector3::new(PI, 0.0, 0.0));
        let translation = Vector3::new(0.5, 0.3, 20.0);
        let corners = render(&intrinsics, &rotation, &translation, 3.4);

        let pose = PlanarSquarePnp::new(intrinsics).estimate(&corners, 3.4).unwrap();
        assert!((pose.translation - translation).norm() < 1e-6);
    }

    #[test]
    fn undistort_of_principal_point_is_origin() {
        let intrinsics = CameraIntrinsics::default();
        let n = intrinsics.undistort(&Point2::new(intrinsics.cx, intrinsics.cy));
        assert!(n.x.abs() < 1e-12 && n.y.abs() < 1e-12);
    }

    #[test]
    fn collapsed_corners_fail() {
        let p = Point2::new(100.0, 100.0);
        let pnp = PlanarSquarePnp::new(CameraIntrinsics::default());
        assert!(pnp.estimate(&[p, p, p, p], 3.4).is_none());
    }

    #[test]
    fn collinear_corners_fail() {
        let corners = [
            Point2::new(100.0, 100.0),
            Point2::new(110.0, 100.0),
            Point2::new(120.0, 100.0),
            Point2::new(130.0, 100.0),
        ];
        let pnp = PlanarSquarePnp::new(CameraIntrinsics::default());
        assert!(pnp.estimate(&corners, 3.4).is_none());
    }

    #[test]
    fn non_positive_marker_size_fails() {
        let intrinsics = CameraIntrinsics::pinhole(800.0, 800.0, 320.0, 240.0);
        let rotation = Rotation3::new(Vector3::new(PI, 0.0, 0.0));
        let corners = render(&intrinsics, &rotation, &Vector3::new(0.0, 0.0, 30.0), 3.4);
        let pnp = PlanarSquarePnp::new(intrinsics);
        assert!(pnp.estimate(&corners, 0.0).is_none());
        assert!(pnp.estimate(&corners, -1.0).is_none());
    }
}
