//! `towcar-types` – data model shared by every TowCar crate.
//!
//! Perception outputs ([`DetectedMarker`], [`Skeleton`]), the smoothed
//! [`Pose`], the per-frame readings handed to sinks, the operating mode and
//! operator commands, and the workspace-wide [`TowError`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use nalgebra::{Matrix3, Point2, Rotation3, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub mod reading;
pub mod skeleton;

pub use reading::{DockingAlignment, DockingReading, GestureLabel, GestureReading, SpeedTier};
pub use skeleton::{Keypoint, Skeleton};

/// The four image-plane corners of a fiducial marker, in detector order:
/// top-left, top-right, bottom-right, bottom-left.
pub type MarkerCorners = [Point2<f64>; 4];

/// A fiducial marker reported by the external detector for one frame.
///
/// Identities are not guaranteed to be unique within a frame: the detector
/// may double-detect a marker or pick up a decoy carrying the same ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedMarker {
    pub id: i32,
    pub corners: MarkerCorners,
}

impl DetectedMarker {
    pub fn new(id: i32, corners: MarkerCorners) -> Self {
        Self { id, corners }
    }

    /// Mean of the four corners, in pixels.
    pub fn center(&self) -> Point2<f64> {
        let sum = self
            .corners
            .iter()
            .fold(Vector2::zeros(), |acc, p| acc + p.coords);
        Point2::from(sum / 4.0)
    }
}

/// A 6-DoF pose of a marker relative to the camera.
///
/// `rotation` is an axis-angle (exponential map) vector in radians;
/// `translation` is expressed in the same length unit as the configured
/// marker size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub rotation: Vector3<f64>,
    pub translation: Vector3<f64>,
}

impl Pose {
    pub fn new(rotation: Vector3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Euclidean distance from the camera origin.
    pub fn distance(&self) -> f64 {
        self.translation.norm()
    }

    /// The rotation vector as a 3×3 rotation matrix.
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        Rotation3::new(self.rotation).into_inner()
    }

    /// Component-wise `alpha * self + (1 - alpha) * previous` over both the
    /// rotation vector and the translation.
    pub fn blend(&self, previous: &Pose, alpha: f64) -> Pose {
        Pose {
            rotation: self.rotation * alpha + previous.rotation * (1.0 - alpha),
            translation: self.translation * alpha + previous.translation * (1.0 - alpha),
        }
    }
}

/// Which pipeline receives each frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperatingMode {
    /// Gesture interpretation of a human marshaller.
    #[default]
    Marshal,
    /// Fiducial-marker precision docking.
    Docking,
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatingMode::Marshal => write!(f, "MARSHAL"),
            OperatingMode::Docking => write!(f, "DOCKING"),
        }
    }
}

/// A discrete operator instruction to switch pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatorCommand {
    Marshal,
    Docking,
}

impl OperatorCommand {
    /// The mode this command switches to.
    pub fn target_mode(self) -> OperatingMode {
        match self {
            OperatorCommand::Marshal => OperatingMode::Marshal,
            OperatorCommand::Docking => OperatingMode::Docking,
        }
    }
}

impl FromStr for OperatorCommand {
    type Err = TowError;

    /// Accepts the single-key shortcuts (`m`, `d`) as well as the full names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "m" | "marshal" => Ok(OperatorCommand::Marshal),
            "d" | "docking" => Ok(OperatorCommand::Docking),
            other => Err(TowError::Config(format!("unknown operator command '{other}'"))),
        }
    }
}

/// The output of one frame, tagged by the pipeline that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "reading", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FrameReading {
    Marshal(GestureReading),
    Docking(DockingReading),
}

impl FrameReading {
    pub fn mode(&self) -> OperatingMode {
        match self {
            FrameReading::Marshal(_) => OperatingMode::Marshal,
            FrameReading::Docking(_) => OperatingMode::Docking,
        }
    }
}

/// A [`FrameReading`] stamped with its session and frame counter, ready for a
/// render/actuation sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    pub session: Uuid,
    pub frame: u64,
    pub timestamp: DateTime<Utc>,
    pub reading: FrameReading,
}

/// Errors raised at the host boundary: external perception engines, capture,
/// replay parsing, sinks and configuration.
///
/// The decision core itself never fails; these only surface where a host
/// talks to the outside world.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TowError {
    #[error("Perception Error in {stage}: {details}")]
    Perception { stage: String, details: String },

    #[error("Capture Error on {camera}: {details}")]
    Capture { camera: String, details: String },

    #[error("Replay Error at line {line}: {details}")]
    Replay { line: usize, details: String },

    #[error("Sink Error: {0}")]
    Sink(String),

    #[error("Config Error: {0}")]
    Config(String),
}
