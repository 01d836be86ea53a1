//! Marshalling gesture classification.
//!
//! A single frame's upper-body keypoints are normalised by the frame size,
//! reduced to a handful of [`ArmFeatures`], and run through an ordered chain
//! of mutually exclusive [`GestureRule`]s.  The first rule that fires decides
//! the label; when none fires the marshaller is `READY`.
//!
//! | Priority | Rule | Fires when |
//! |---|---|---|
//! | 1 | `STOP` | wrists crossed, or touching high above the head |
//! | 2 | `ENGINE_CUT` | one wrist at the throat, the other lowered |
//! | 3 | `SET_BRAKES` | one wrist raised, the other lowered |
//! | 4 | `FORWARD` | elbows at shoulder height, forearms up and bent |
//! | 5 | `APPROACHING` | arms straight; speed from wrist spread |
//!
//! Without both shoulders visible no ratio is well defined and the reading is
//! `IDLE`.
//!
//! Thresholds are tuned empirically; exact boundary values follow the strict
//! inequalities documented on [`GestureThresholds`].

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use towcar_types::skeleton::{
    LEFT_ELBOW, LEFT_SHOULDER, LEFT_WRIST, NOSE, RIGHT_ELBOW, RIGHT_SHOULDER, RIGHT_WRIST,
};
use towcar_types::{GestureLabel, GestureReading, Skeleton, SpeedTier};

use crate::geometry::angle_between;

// ────────────────────────────────────────────────────────────────────────────
// Thresholds
// ────────────────────────────────────────────────────────────────────────────

/// Every tunable of the classifier.  Distances are in normalised image units
/// (fractions of frame width/height); angles are in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureThresholds {
    /// A keypoint is visible when its confidence is strictly above this.
    pub visibility: f32,
    /// STOP: wrists closer than this horizontally count as touching.
    pub stop_touch_spread: f32,
    /// STOP: touching wrists must be this far above the left shoulder.
    pub stop_raise: f32,
    /// STOP: the left wrist must be less than this far below its shoulder.
    pub stop_low_gate: f32,
    /// ENGINE_CUT: throat box extends this far above (when the nose is hidden)
    /// and below the left shoulder.
    pub throat_reach: f32,
    /// ENGINE_CUT: horizontal margin of the throat box, as a fraction of
    /// shoulder width on each side.
    pub throat_margin_ratio: f32,
    /// A wrist more than this far below its shoulder is lowered.
    pub lowered_drop: f32,
    /// FORWARD: elbows within this vertical band of their shoulders.
    pub forward_elbow_band: f32,
    /// FORWARD: both elbow angles below this.
    pub forward_max_angle: f32,
    /// APPROACHING: both elbow angles above this.
    pub approach_min_angle: f32,
    /// APPROACHING: wrists further than this below the shoulders are low.
    pub approach_low_drop: f32,
    /// APPROACHING low arms: FAST when spread exceeds this × shoulder width.
    pub fast_spread_ratio: f32,
    /// APPROACHING raised arms: VERY SLOW below this × shoulder width.
    pub very_slow_spread_ratio: f32,
    /// APPROACHING raised arms: SLOW below this × shoulder width.
    pub slow_spread_ratio: f32,
}

impl Default for GestureThresholds {
    fn default() -> Self {
        Self {
            visibility: 0.5,
            stop_touch_spread: 0.05,
            stop_raise: 0.1,
            stop_low_gate: 0.4,
            throat_reach: 0.2,
            throat_margin_ratio: 0.5,
            lowered_drop: 0.2,
            forward_elbow_band: 0.2,
            forward_max_angle: 125.0,
            approach_min_angle: 130.0,
            approach_low_drop: 0.25,
            fast_spread_ratio: 1.5,
            very_slow_spread_ratio: 1.0,
            slow_spread_ratio: 1.6,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Features
// ────────────────────────────────────────────────────────────────────────────

/// Normalised joint positions and derived quantities for one frame.
///
/// Image coordinates: `y` grows downwards, and the marshaller's left side
/// appears on the right of the frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmFeatures {
    /// Present only when the nose is visible.
    pub nose: Option<Point2<f32>>,
    pub left_shoulder: Point2<f32>,
    pub right_shoulder: Point2<f32>,
    pub left_elbow: Point2<f32>,
    pub right_elbow: Point2<f32>,
    pub left_wrist: Point2<f32>,
    pub right_wrist: Point2<f32>,
    /// Elbow angle of the left arm, degrees.
    pub angle_left: f32,
    pub angle_right: f32,
    pub wrist_spread_x: f32,
    pub shoulder_width: f32,
}

impl ArmFeatures {
    /// Normalise `skeleton` by the frame size and derive the features.
    ///
    /// Returns `None` when both shoulders are not visible, when the skeleton
    /// lacks the arm joints, or when the frame has no area.
    pub fn extract(skeleton: &Skeleton, width: u32, height: u32, visibility: f32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }

        let ls = skeleton.joint(LEFT_SHOULDER)?;
        let rs = skeleton.joint(RIGHT_SHOULDER)?;
        if !(ls.is_visible(visibility) && rs.is_visible(visibility)) {
            return None;
        }

        let (w, h) = (width as f32, height as f32);
        let norm = |index: usize| skeleton.joint(index).map(|k| Point2::new(k.x / w, k.y / h));

        let nose = skeleton
            .joint(NOSE)
            .filter(|k| k.is_visible(visibility))
            .map(|k| Point2::new(k.x / w, k.y / h));

        Some(Self::from_joints(
            nose,
            norm(LEFT_SHOULDER)?,
            norm(RIGHT_SHOULDER)?,
            norm(LEFT_ELBOW)?,
            norm(RIGHT_ELBOW)?,
            norm(LEFT_WRIST)?,
            norm(RIGHT_WRIST)?,
        ))
    }

    /// Derive angles and spreads from already-normalised joints.
    #[allow(clippy::too_many_arguments)]
    pub fn from_joints(
        nose: Option<Point2<f32>>,
        left_shoulder: Point2<f32>,
        right_shoulder: Point2<f32>,
        left_elbow: Point2<f32>,
        right_elbow: Point2<f32>,
        left_wrist: Point2<f32>,
        right_wrist: Point2<f32>,
    ) -> Self {
        Self {
            nose,
            left_shoulder,
            right_shoulder,
            left_elbow,
            right_elbow,
            left_wrist,
            right_wrist,
            angle_left: angle_between(left_shoulder, left_elbow, left_wrist),
            angle_right: angle_between(right_shoulder, right_elbow, right_wrist),
            wrist_spread_x: (left_wrist.x - right_wrist.x).abs(),
            shoulder_width: (left_shoulder.x - right_shoulder.x).abs(),
        }
    }

    fn left_lowered(&self, drop: f32) -> bool {
        self.left_wrist.y > self.left_shoulder.y + drop
    }

    fn right_lowered(&self, drop: f32) -> bool {
        self.right_wrist.y > self.right_shoulder.y + drop
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Rules
// ────────────────────────────────────────────────────────────────────────────

/// One step of the first-match decision chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureRule {
    Stop,
    EngineCut,
    SetBrakes,
    Forward,
    Approaching,
}

impl GestureRule {
    /// Evaluation order; earlier rules shadow later ones.
    pub const PRIORITY: [GestureRule; 5] = [
        GestureRule::Stop,
        GestureRule::EngineCut,
        GestureRule::SetBrakes,
        GestureRule::Forward,
        GestureRule::Approaching,
    ];

    /// `Some` when this rule fires for `f`.
    pub fn evaluate(&self, f: &ArmFeatures, t: &GestureThresholds) -> Option<GestureReading> {
        match self {
            GestureRule::Stop => {
                let crossed = f.right_wrist.x > f.left_wrist.x;
                let high_touching = f.wrist_spread_x < t.stop_touch_spread
                    && f.left_wrist.y < f.left_shoulder.y - t.stop_raise;
                let not_down = f.left_wrist.y < f.left_shoulder.y + t.stop_low_gate;

                ((crossed || high_touching) && not_down)
                    .then(|| GestureReading::new(GestureLabel::Stop))
            }

            GestureRule::EngineCut => {
                let top = f.nose.map_or(f.left_shoulder.y - t.throat_reach, |n| n.y);
                let bottom = f.left_shoulder.y + t.throat_reach;
                let margin = f.shoulder_width * t.throat_margin_ratio;
                let left_limit = f.right_shoulder.x - margin;
                let right_limit = f.left_shoulder.x + margin;

                let at_throat = |w: Point2<f32>| {
                    top < w.y && w.y < bottom && left_limit < w.x && w.x < right_limit
                };

                let fires = (at_throat(f.left_wrist) && f.right_lowered(t.lowered_drop))
                    || (at_throat(f.right_wrist) && f.left_lowered(t.lowered_drop));
                fires.then(|| GestureReading::new(GestureLabel::EngineCut))
            }

            GestureRule::SetBrakes => {
                let fires = (f.left_wrist.y < f.left_shoulder.y && f.right_lowered(t.lowered_drop))
                    || (f.right_wrist.y < f.right_shoulder.y && f.left_lowered(t.lowered_drop));
                fires.then(|| GestureReading::new(GestureLabel::SetBrakes))
            }

            GestureRule::Forward => {
                let fires = (f.left_elbow.y - f.left_shoulder.y).abs() < t.forward_elbow_band
                    && (f.right_elbow.y - f.right_shoulder.y).abs() < t.forward_elbow_band
                    && f.left_wrist.y < f.left_elbow.y
                    && f.right_wrist.y < f.right_elbow.y
                    && f.angle_left < t.forward_max_angle
                    && f.angle_right < t.forward_max_angle;
                fires.then(|| GestureReading::new(GestureLabel::Forward))
            }

            GestureRule::Approaching => {
                if !(f.angle_left > t.approach_min_angle && f.angle_right > t.approach_min_angle) {
                    return None;
                }

                let low = t.approach_low_drop;
                let spread = f.wrist_spread_x;
                let width = f.shoulder_width;
                let both_low = f.left_wrist.y > f.left_shoulder.y + low
                    && f.right_wrist.y > f.right_shoulder.y + low;
                let both_high = f.left_wrist.y < f.left_shoulder.y + low
                    && f.right_wrist.y < f.right_shoulder.y + low;

                if both_low {
                    (spread > width * t.fast_spread_ratio)
                        .then(|| GestureReading::approaching(SpeedTier::Fast))
                } else if both_high {
                    let tier = if spread < width * t.very_slow_spread_ratio {
                        SpeedTier::VerySlow
                    } else if spread < width * t.slow_spread_ratio {
                        SpeedTier::Slow
                    } else {
                        SpeedTier::Normal
                    };
                    Some(GestureReading::approaching(tier))
                } else {
                    None
                }
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// GestureClassifier
// ────────────────────────────────────────────────────────────────────────────

/// Maps one skeleton per frame onto a [`GestureReading`].
#[derive(Debug, Clone, Default)]
pub struct GestureClassifier {
    thresholds: GestureThresholds,
}

impl GestureClassifier {
    pub fn new(thresholds: GestureThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &GestureThresholds {
        &self.thresholds
    }

    /// Classify a pixel-space skeleton from a `width × height` frame.
    pub fn classify(&self, skeleton: &Skeleton, width: u32, height: u32) -> GestureReading {
        match ArmFeatures::extract(skeleton, width, height, self.thresholds.visibility) {
            Some(features) => self.classify_features(&features),
            None => {
                debug!("shoulders not visible; marshaller idle");
                GestureReading::idle()
            }
        }
    }

    /// Run the decision chain over precomputed features.
    pub fn classify_features(&self, features: &ArmFeatures) -> GestureReading {
        let reading = GestureRule::PRIORITY
            .iter()
            .find_map(|rule| rule.evaluate(features, &self.thresholds))
            .unwrap_or_else(GestureReading::ready);
        debug!(
            label = %reading.label,
            angle_left = features.angle_left,
            angle_right = features.angle_right,
            "gesture classified"
        );
        reading
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
