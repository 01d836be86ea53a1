//! Seams for the external perception engines.
//!
//! Marker detection and keypoint estimation run in third-party engines
//! (a fiducial dictionary matcher, a pose network).  The decision core only
//! sees their outputs through these two traits, so engines can be swapped or
//! replaced by recorded output without touching the pipelines.

use towcar_types::{DetectedMarker, Skeleton, TowError};

use crate::camera::CameraFrame;

/// Finds square fiducial markers in a frame.
pub trait FiducialDetector {
    /// Markers visible in `frame`, in detector order.  An empty list means
    /// nothing was found.
    ///
    /// # Errors
    ///
    /// Returns [`TowError::Perception`] when the engine itself fails.
    fn detect_markers(&mut self, frame: &CameraFrame) -> Result<Vec<DetectedMarker>, TowError>;
}

/// Estimates human upper-body skeletons in a frame.
pub trait KeypointEstimator {
    /// Skeletons in `frame`, most prominent first.
    ///
    /// # Errors
    ///
    /// Returns [`TowError::Perception`] when the engine itself fails.
    fn estimate_skeletons(&mut self, frame: &CameraFrame) -> Result<Vec<Skeleton>, TowError>;
}
