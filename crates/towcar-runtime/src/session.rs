//! [`Session`] – the per-vehicle frame loop state.
//!
//! A session owns everything that survives between frames: the mode
//! supervisor, the docking target selector and its smoothing history, the
//! gesture classifier and the pose estimator.  Nothing is global, so several
//! sessions can run side by side on separate threads.
//!
//! Each call to [`Session::process_frame`]:
//!
//! 1. applies any latched operator command and fixes the mode for the frame;
//! 2. runs only the pipeline for that mode;
//! 3. stamps the reading into a [`FrameReport`].
//!
//! Engine failures never escape: they are logged and treated as an empty
//! detection, so a flaky inference engine degrades to `found = false` /
//! `IDLE` instead of stopping the vehicle loop.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use towcar_hal::{Camera, CameraFrame, FiducialDetector, KeypointEstimator};
use towcar_perception::smoothing::DEFAULT_ALPHA;
use towcar_perception::{
    CameraIntrinsics, DockingConfig, GestureClassifier, GestureThresholds, PlanarSquarePnp,
    PoseEstimator, TargetSelector,
};
use towcar_types::{
    FrameReading, FrameReport, GestureReading, OperatingMode, OperatorCommand, TowError,
};

use crate::supervisor::ModeSupervisor;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Tunables for both pipelines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Weight of the newest pose sample in the smoothing tracker.
    #[serde(default = "default_smoothing_alpha")]
    pub smoothing_alpha: f64,

    #[serde(default)]
    pub docking: DockingConfig,

    #[serde(default)]
    pub gesture: GestureThresholds,
}

fn default_smoothing_alpha() -> f64 {
    DEFAULT_ALPHA
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            smoothing_alpha: default_smoothing_alpha(),
            docking: DockingConfig::default(),
            gesture: GestureThresholds::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// Frame-synchronous driver for one vehicle.
pub struct Session {
    id: Uuid,
    frames: u64,
    supervisor: ModeSupervisor,
    selector: TargetSelector,
    classifier: GestureClassifier,
    estimator: Box<dyn PoseEstimator>,
}

impl Session {
    /// Start a session with an explicit pose estimator.
    pub fn new(config: PipelineConfig, estimator: Box<dyn PoseEstimator>) -> Self {
        let id = Uuid::new_v4();
        info!(
            session = %id,
            accepted_ids = ?config.docking.accepted_ids,
            marker_size = config.docking.marker_size,
            alpha = config.smoothing_alpha,
            "session started"
        );
        Self {
            id,
            frames: 0,
            supervisor: ModeSupervisor::new(),
            selector: TargetSelector::new(config.docking, config.smoothing_alpha),
            classifier: GestureClassifier::new(config.gesture),
            estimator,
        }
    }

    /// Start a session using the built-in planar square estimator.
    pub fn with_intrinsics(config: PipelineConfig, intrinsics: CameraIntrinsics) -> Self {
        Self::new(config, Box::new(PlanarSquarePnp::new(intrinsics)))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Number of frames processed so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn mode(&self) -> OperatingMode {
        self.supervisor.mode()
    }

    /// Latch an operator command; it takes effect at the next frame.
    pub fn request(&mut self, command: OperatorCommand) {
        self.supervisor.request(command);
    }

    pub fn selector(&self) -> &TargetSelector {
        &self.selector
    }

    /// Run one frame through the pipeline selected for it.
    #[instrument(skip_all, fields(session = %self.id, index = frame.index))]
    pub fn process_frame<E>(&mut self, frame: &CameraFrame, engine: &mut E) -> FrameReport
    where
        E: FiducialDetector + KeypointEstimator + ?Sized,
    {
        let mode = self.supervisor.begin_frame();
        self.frames += 1;

        let reading = match mode {
            OperatingMode::Docking => {
                let markers = engine.detect_markers(frame).unwrap_or_else(|e| {
                    warn!(error = %e, "marker detection failed; treating frame as empty");
                    Vec::new()
                });
                FrameReading::Docking(self.selector.select(&markers, self.estimator.as_ref()))
            }
            OperatingMode::Marshal => {
                let skeletons = engine.estimate_skeletons(frame).unwrap_or_else(|e| {
                    warn!(error = %e, "keypoint estimation failed; treating frame as empty");
                    Vec::new()
                });
                let reading = match skeletons.first() {
                    Some(skeleton) => self.classifier.classify(skeleton, frame.width, frame.height),
                    None => GestureReading::idle(),
                };
                FrameReading::Marshal(reading)
            }
        };

        FrameReport {
            session: self.id,
            frame: self.frames,
            timestamp: Utc::now(),
            reading,
        }
    }

    /// Capture one frame from `camera` and process it.
    ///
    /// # Errors
    ///
    /// Returns the camera's [`TowError::Capture`] unchanged; no frame is
    /// processed in that case.
    pub fn step<E>(&mut self, camera: &mut dyn Camera, engine: &mut E) -> Result<FrameReport, TowError>
    where
        E: FiducialDetector + KeypointEstimator + ?Sized,
    {
        let frame = camera.capture()?;
        Ok(self.process_frame(&frame, engine))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point2, Vector3};
    use std::f64::consts::PI;
    use towcar_hal::RecordedFrame;
    use towcar_types::skeleton::{
        LEFT_ELBOW, LEFT_SHOULDER, LEFT_WRIST, RIGHT_ELBOW, RIGHT_SHOULDER, RIGHT_WRIST,
    };
    use towcar_types::{DetectedMarker, GestureLabel, Keypoint, MarkerCorners, Pose, Skeleton};

    /// Estimator whose distance is the marker's top-left x coordinate.
    fn session() -> Session {
        let estimator = |corners: &MarkerCorners, _size: f64| -> Option<Pose> {
            Some(Pose::new(
                Vector3::new(PI, 0.0, 0.0),
                Vector3::new(0.0, 0.0, corners[0].x),
            ))
        };
        Session::new(PipelineConfig::default(), Box::new(estimator))
    }

    fn marker(id: i32, distance: f64) -> DetectedMarker {
        DetectedMarker::new(
            id,
            [
                Point2::new(distance, 100.0),
                Point2::new(distance + 20.0, 100.0),
                Point2::new(distance + 20.0, 120.0),
                Point2::new(distance, 120.0),
            ],
        )
    }

    /// Crossed wrists in a 640×480 frame.
    fn stop_skeleton() -> Skeleton {
        let mut kps = vec![Keypoint::new(0.0, 0.0, 0.0); 17];
        let mut put = |i: usize, x: f32, y: f32| kps[i] = Keypoint::new(x * 640.0, y * 480.0, 0.9);
        put(LEFT_SHOULDER, 0.6, 0.4);
        put(RIGHT_SHOULDER, 0.4, 0.4);
        put(LEFT_ELBOW, 0.7, 0.5);
        put(RIGHT_ELBOW, 0.3, 0.5);
        put(LEFT_WRIST, 0.4, 0.7);
        put(RIGHT_WRIST, 0.6, 0.7);
        Skeleton::new(kps)
    }

    fn scene(markers: Vec<DetectedMarker>, skeletons: Vec<Skeleton>) -> RecordedFrame {
        RecordedFrame {
            width: 640,
            height: 480,
            markers,
            skeletons,
        }
    }

    /// Engine whose every call fails.
    struct OfflineEngine;

    impl FiducialDetector for OfflineEngine {
        fn detect_markers(&mut self, _: &CameraFrame) -> Result<Vec<DetectedMarker>, TowError> {
            Err(TowError::Perception {
                stage: "fiducial".to_string(),
                details: "offline".to_string(),
            })
        }
    }

    impl KeypointEstimator for OfflineEngine {
        fn estimate_skeletons(&mut self, _: &CameraFrame) -> Result<Vec<Skeleton>, TowError> {
            Err(TowError::Perception {
                stage: "keypoints".to_string(),
                details: "offline".to_string(),
            })
        }
    }

    struct ScriptedCamera {
        fail: bool,
        next: u64,
    }

    impl Camera for ScriptedCamera {
        fn id(&self) -> &str {
            "scripted"
        }

        fn capture(&mut self) -> Result<CameraFrame, TowError> {
            if self.fail {
                return Err(TowError::Capture {
                    camera: "scripted".to_string(),
                    details: "timeout".to_string(),
                });
            }
            self.next += 1;
            Ok(CameraFrame::empty(self.next, 640, 480))
        }
    }

    #[test]
    fn marshal_is_the_initial_pipeline() {
        let mut s = session();
        let mut engine = scene(vec![marker(11, 10.0)], vec![stop_skeleton()]);
        let report = s.process_frame(&engine.camera_frame(1), &mut engine);

        let FrameReading::Marshal(reading) = report.reading else {
            panic!("expected a marshal reading, got {:?}", report.reading);
        };
        assert_eq!(reading.label, GestureLabel::Stop);
        assert!(s.selector().tracker().is_empty());
    }

    #[test]
    fn last_command_before_frame_selects_docking() {
        let mut s = session();
        s.request(OperatorCommand::Docking);
        s.request(OperatorCommand::Marshal);
        s.request(OperatorCommand::Docking);

        let mut engine = scene(vec![marker(11, 25.0), marker(11, 10.0)], vec![stop_skeleton()]);
        let report = s.process_frame(&engine.camera_frame(1), &mut engine);

        assert_eq!(s.mode(), OperatingMode::Docking);
        let FrameReading::Docking(reading) = report.reading else {
            panic!("expected a docking reading");
        };
        assert!(reading.found);
        assert_eq!(reading.id, 11);
    }

    #[test]
    fn frames_are_routed_by_mode_at_processing_time() {
        let mut s = session();
        let mut engine = scene(vec![marker(11, 12.0)], vec![stop_skeleton()]);

        let first = s.process_frame(&engine.camera_frame(1), &mut engine);
        s.request(OperatorCommand::Docking);
        let second = s.process_frame(&engine.camera_frame(2), &mut engine);
        s.request(OperatorCommand::Marshal);
        let third = s.process_frame(&engine.camera_frame(3), &mut engine);
        s.request(OperatorCommand::Docking);
        let fourth = s.process_frame(&engine.camera_frame(4), &mut engine);

        let modes: Vec<OperatingMode> = [&first, &second, &third, &fourth]
            .iter()
            .map(|r| r.reading.mode())
            .collect();
        assert_eq!(
            modes,
            vec![
                OperatingMode::Marshal,
                OperatingMode::Docking,
                OperatingMode::Marshal,
                OperatingMode::Docking
            ]
        );
        assert_eq!(s.mode(), OperatingMode::Docking);
        assert_eq!([first.frame, second.frame, third.frame, fourth.frame], [1, 2, 3, 4]);
        assert!(first.session == s.id() && fourth.session == s.id());
    }

    #[test]
    fn smoothing_history_survives_mode_switches() {
        let mut s = session();
        s.request(OperatorCommand::Docking);
        let mut near = scene(vec![marker(11, 10.0)], vec![]);
        s.process_frame(&near.camera_frame(1), &mut near);

        s.request(OperatorCommand::Marshal);
        s.process_frame(&near.camera_frame(2), &mut near);

        s.request(OperatorCommand::Docking);
        let mut far = scene(vec![marker(11, 20.0)], vec![]);
        let report = s.process_frame(&far.camera_frame(3), &mut far);
        let FrameReading::Docking(reading) = report.reading else {
            panic!("expected a docking reading");
        };
        assert!((reading.distance - 13.0).abs() < 1e-9);
    }

    #[test]
    fn no_skeleton_is_idle() {
        let mut s = session();
        let mut engine = scene(vec![], vec![]);
        let report = s.process_frame(&engine.camera_frame(1), &mut engine);
        assert_eq!(report.reading, FrameReading::Marshal(GestureReading::idle()));
    }

    #[test]
    fn engine_failures_degrade_to_empty_detections() {
        let mut s = session();
        let frame = CameraFrame::empty(1, 640, 480);
        let report = s.process_frame(&frame, &mut OfflineEngine);
        assert_eq!(report.reading, FrameReading::Marshal(GestureReading::idle()));

        s.request(OperatorCommand::Docking);
        let report = s.process_frame(&frame, &mut OfflineEngine);
        let FrameReading::Docking(reading) = report.reading else {
            panic!("expected a docking reading");
        };
        assert!(!reading.found);
        assert_eq!(reading.id, -1);
    }

    #[test]
    fn step_captures_then_processes() {
        let mut s = session();
        let mut cam = ScriptedCamera { fail: false, next: 0 };
        let mut engine = scene(vec![], vec![stop_skeleton()]);
        let report = s.step(&mut cam, &mut engine).unwrap();
        assert_eq!(report.frame, 1);
        assert_eq!(report.reading.mode(), OperatingMode::Marshal);
    }

    #[test]
    fn step_surfaces_capture_failure() {
        let mut s = session();
        let mut cam = ScriptedCamera { fail: true, next: 0 };
        let mut engine = scene(vec![], vec![]);
        let err = s.step(&mut cam, &mut engine).unwrap_err();
        assert!(matches!(err, TowError::Capture { .. }));
        assert_eq!(s.frames(), 0);
    }

    #[test]
    fn builtin_estimator_docks_on_rendered_marker() {
        let intrinsics = CameraIntrinsics::pinhole(800.0, 800.0, 320.0, 240.0);
        let mut s = Session::with_intrinsics(PipelineConfig::default(), intrinsics.clone());
        s.request(OperatorCommand::Docking);

        let rotation = nalgebra::Rotation3::new(Vector3::new(PI, 0.0, 0.0));
        let translation = Vector3::new(0.05, 0.05, 12.5);
        let corners = PlanarSquarePnp::object_points(3.4)
            .map(|p| intrinsics.project(&(rotation * p.coords + translation)));
        let mut engine = scene(vec![DetectedMarker::new(11, corners)], vec![]);

        let report = s.process_frame(&engine.camera_frame(1), &mut engine);
        let FrameReading::Docking(reading) = report.reading else {
            panic!("expected a docking reading");
        };
        assert!(reading.found);
        assert!((reading.distance - translation.norm()).abs() < 1e-6);
        // 320 + 800 · 0.05 / 12.5 = 323.2
        assert_eq!(reading.center, (323, 243));
        assert!(reading.alignment.unwrap().is_docked());
    }

    #[test]
    fn pipeline_config_reads_partial_toml() {
        let cfg: PipelineConfig = toml::from_str(
            r#"
            smoothing_alpha = 0.5

            [docking]
            accepted_ids = [11, 12]

            [gesture]
            approach_min_angle = 140.0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.smoothing_alpha, 0.5);
        assert_eq!(cfg.docking.accepted_ids, vec![11, 12]);
        assert_eq!(cfg.docking.marker_size, 3.4);
        assert_eq!(cfg.gesture.approach_min_angle, 140.0);
        assert_eq!(cfg.gesture.forward_max_angle, 125.0);
    }
}
