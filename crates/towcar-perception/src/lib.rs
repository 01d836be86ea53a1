//! `towcar-perception` – turns raw detections into driving readings.
//!
//! # Modules
//!
//! - [`geometry`] – joint angles, rotation ↔ Euler conversion.
//! - [`smoothing`] – [`PoseSmoother`][smoothing::PoseSmoother]: per-identity
//!   exponential moving average over marker poses.
//! - [`docking`] – [`TargetSelector`][docking::TargetSelector]: filters
//!   fiducials by identity and reports the nearest one with its orientation
//!   and alignment against the stand-off distance.
//! - [`pnp`] – [`PlanarSquarePnp`][pnp::PlanarSquarePnp]: the default
//!   [`PoseEstimator`][docking::PoseEstimator] for square markers.
//! - [`gesture`] – [`GestureClassifier`][gesture::GestureClassifier]: maps an
//!   upper-body skeleton to a marshalling signal.

pub mod docking;
pub mod geometry;
pub mod gesture;
pub mod pnp;
pub mod smoothing;

pub use docking::{DockingConfig, PoseEstimator, TargetSelector};
pub use gesture::{GestureClassifier, GestureThresholds};
pub use pnp::{CameraIntrinsics, PlanarSquarePnp};
pub use smoothing::PoseSmoother;
