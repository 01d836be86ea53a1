//! Docking target selection.
//!
//! Given one frame's [`DetectedMarker`]s, [`TargetSelector::select`] keeps the
//! markers whose identity is accepted, estimates and smooths each candidate's
//! pose, and reports the nearest one as a [`DockingReading`].
//!
//! A camera can momentarily double-detect a marker or see a decoy carrying
//! the same ID; the smallest estimated distance wins.  Candidates whose pose
//! cannot be estimated are dropped without touching the smoothing history.

use serde::{Deserialize, Serialize};
use tracing::debug;

use towcar_types::{DetectedMarker, DockingAlignment, DockingReading, MarkerCorners, Pose};

use crate::geometry::rotation_to_euler;
use crate::smoothing::PoseSmoother;

// ────────────────────────────────────────────────────────────────────────────
// Pose estimation seam
// ────────────────────────────────────────────────────────────────────────────

/// External capability that recovers a marker's pose from its image corners.
///
/// Implementations own the camera intrinsics.  Returning `None` signals a
/// failed estimate (e.g. a degenerate corner configuration).
pub trait PoseEstimator: Send + Sync {
    fn estimate(&self, corners: &MarkerCorners, marker_size: f64) -> Option<Pose>;
}

impl<F> PoseEstimator for F
where
    F: Fn(&MarkerCorners, f64) -> Option<Pose> + Send + Sync,
{
    fn estimate(&self, corners: &MarkerCorners, marker_size: f64) -> Option<Pose> {
        self(corners, marker_size)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Tunables for the docking pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DockingConfig {
    /// Physical edge length of the marker; distances come out in this unit.
    #[serde(default = "default_marker_size")]
    pub marker_size: f64,

    /// Marker identities that may be docked against.
    #[serde(default = "default_accepted_ids")]
    pub accepted_ids: Vec<i32>,

    /// Stand-off distance at which the vehicle is considered docked.
    #[serde(default = "default_target_distance")]
    pub target_distance: f64,

    #[serde(default = "default_distance_tolerance")]
    pub distance_tolerance: f64,

    #[serde(default = "default_yaw_tolerance")]
    pub yaw_tolerance_deg: f64,
}

fn default_marker_size() -> f64 {
    3.4
}
fn default_accepted_ids() -> Vec<i32> {
    vec![11]
}
fn default_target_distance() -> f64 {
    12.0
}
fn default_distance_tolerance() -> f64 {
    2.0
}
fn default_yaw_tolerance() -> f64 {
    5.0
}

impl Default for DockingConfig {
    fn default() -> Self {
        Self {
            marker_size: default_marker_size(),
            accepted_ids: default_accepted_ids(),
            target_distance: default_target_distance(),
            distance_tolerance: default_distance_tolerance(),
            yaw_tolerance_deg: default_yaw_tolerance(),
        }
    }
}

impl DockingConfig {
    pub fn accepts(&self, id: i32) -> bool {
        self.accepted_ids.contains(&id)
    }

    /// Distance and yaw checks against the configured stand-off.
    pub fn alignment(&self, distance: f64, yaw: f64) -> DockingAlignment {
        let remaining_distance = distance - self.target_distance;
        DockingAlignment {
            remaining_distance,
            distance_ok: remaining_distance.abs() < self.distance_tolerance,
            yaw_ok: yaw.abs() < self.yaw_tolerance_deg,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// TargetSelector
// ────────────────────────────────────────────────────────────────────────────

/// Picks one docking target per frame and owns the per-identity smoothing
/// history.
#[derive(Debug, Clone)]
pub struct TargetSelector {
    config: DockingConfig,
    tracker: PoseSmoother,
}

impl TargetSelector {
    pub fn new(config: DockingConfig, alpha: f64) -> Self {
        Self {
            config,
            tracker: PoseSmoother::new(alpha),
        }
    }

    pub fn config(&self) -> &DockingConfig {
        &self.config
    }

    pub fn tracker(&self) -> &PoseSmoother {
        &self.tracker
    }

    /// Select the nearest accepted marker in `markers`.
    ///
    /// Every accepted candidate with a successful estimate updates the
    /// smoothing history, including candidates that lose the distance
    /// comparison.  Exact distance ties keep the earlier marker.
    pub fn select(
        &mut self,
        markers: &[DetectedMarker],
        estimator: &dyn PoseEstimator,
    ) -> DockingReading {
        let mut best: Option<(&DetectedMarker, Pose)> = None;
        let mut min_distance = f64::INFINITY;

        for marker in markers {
            if !self.config.accepts(marker.id) {
                continue;
            }

            let Some(raw) = estimator.estimate(&marker.corners, self.config.marker_size) else {
                debug!(id = marker.id, "pose estimation failed; candidate skipped");
                continue;
            };

            let smoothed = self.tracker.update(marker.id, raw);
            let distance = smoothed.distance();
            debug!(id = marker.id, distance, "docking candidate");

            if distance < min_distance {
                min_distance = distance;
                best = Some((marker, smoothed));
            }
        }

        let Some((marker, pose)) = best else {
            return DockingReading::not_found();
        };

        let euler = rotation_to_euler(&pose.rotation_matrix());
        let center = marker.center();

        DockingReading {
            found: true,
            id: marker.id,
            distance: min_distance,
            roll: euler.roll,
            pitch: euler.pitch,
            yaw: euler.yaw,
            center: (center.x as i32, center.y as i32),
            alignment: Some(self.config.alignment(min_distance, euler.yaw)),
        }
    }
}

impl Default for TargetSelector {
    fn default() -> Self {
        Self::new(DockingConfig::default(), crate::smoothing::DEFAULT_ALPHA)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
