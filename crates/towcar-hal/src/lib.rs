//! `towcar-hal` – boundary between the decision core and the outside world.
//!
//! # Modules
//!
//! - [`camera`] – [`Camera`][camera::Camera] trait and
//!   [`CameraFrame`][camera::CameraFrame].
//! - [`detector`] – [`FiducialDetector`][detector::FiducialDetector] and
//!   [`KeypointEstimator`][detector::KeypointEstimator]: seams for the
//!   external inference engines.
//! - [`sink`] – [`ReadingSink`][sink::ReadingSink] with JSON-lines and
//!   in-memory implementations.
//! - [`replay`] – recorded engine output ([`ReplayReader`][replay::ReplayReader])
//!   for headless runs.

pub mod camera;
pub mod detector;
pub mod replay;
pub mod sink;

pub use camera::{Camera, CameraFrame};
pub use detector::{FiducialDetector, KeypointEstimator};
pub use replay::{RecordedFrame, ReplayReader, ReplayRecord};
pub use sink::{JsonLinesSink, MemorySink, ReadingSink};
