//! Per-frame readings produced by the two pipelines.

use std::fmt;

use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Docking
// ────────────────────────────────────────────────────────────────────────────

/// How far the vehicle still is from its docking stand-off, and whether it is
/// lined up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DockingAlignment {
    /// `distance - target_distance`; negative once the vehicle overshoots.
    pub remaining_distance: f64,
    /// `|remaining_distance|` is within the distance tolerance.
    pub distance_ok: bool,
    /// `|yaw|` is within the yaw tolerance.
    pub yaw_ok: bool,
}

impl DockingAlignment {
    pub fn is_docked(&self) -> bool {
        self.distance_ok && self.yaw_ok
    }
}

/// Result of target selection for one frame.
///
/// When `found` is `false` every other field holds its sentinel value
/// (see [`DockingReading::not_found`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DockingReading {
    pub found: bool,
    /// Selected marker identity, `-1` when nothing was found.
    pub id: i32,
    /// Distance from the camera, in marker-size units.
    pub distance: f64,
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
    /// Pixel centre of the selected marker.
    pub center: (i32, i32),
    pub alignment: Option<DockingAlignment>,
}

impl DockingReading {
    pub fn not_found() -> Self {
        Self {
            found: false,
            id: -1,
            distance: 0.0,
            roll: 0.0,
            pitch: 0.0,
            yaw: 0.0,
            center: (0, 0),
            alignment: None,
        }
    }
}

impl Default for DockingReading {
    fn default() -> Self {
        Self::not_found()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Gestures
// ────────────────────────────────────────────────────────────────────────────

/// The closed set of marshalling signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GestureLabel {
    /// No marshaller in view.
    Idle,
    Ready,
    Stop,
    EngineCut,
    SetBrakes,
    Forward,
    Approaching,
}

impl GestureLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            GestureLabel::Idle => "IDLE",
            GestureLabel::Ready => "READY",
            GestureLabel::Stop => "STOP",
            GestureLabel::EngineCut => "ENGINE_CUT",
            GestureLabel::SetBrakes => "SET_BRAKES",
            GestureLabel::Forward => "FORWARD",
            GestureLabel::Approaching => "APPROACHING",
        }
    }
}

impl fmt::Display for GestureLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Speed qualifier attached to [`GestureLabel::Approaching`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpeedTier {
    #[serde(rename = "FAST")]
    Fast,
    #[serde(rename = "NORMAL")]
    Normal,
    #[serde(rename = "SLOW")]
    Slow,
    #[serde(rename = "VERY SLOW")]
    VerySlow,
}

impl SpeedTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpeedTier::Fast => "FAST",
            SpeedTier::Normal => "NORMAL",
            SpeedTier::Slow => "SLOW",
            SpeedTier::VerySlow => "VERY SLOW",
        }
    }
}

/// Classified gesture for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GestureReading {
    pub label: GestureLabel,
    /// Only ever set for [`GestureLabel::Approaching`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<SpeedTier>,
}

impl GestureReading {
    pub fn new(label: GestureLabel) -> Self {
        Self { label, speed: None }
    }

    pub fn idle() -> Self {
        Self::new(GestureLabel::Idle)
    }

    pub fn ready() -> Self {
        Self::new(GestureLabel::Ready)
    }

    pub fn approaching(speed: SpeedTier) -> Self {
        Self {
            label: GestureLabel::Approaching,
            speed: Some(speed),
        }
    }

    /// Free-text qualifier, e.g. `"VERY SLOW"`.
    pub fn qualifier(&self) -> Option<&'static str> {
        self.speed.map(|s| s.as_str())
    }
}

impl fmt::Display for GestureReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.qualifier() {
            Some(q) => write!(f, "{} (SPEED: {q})", self.label),
            None => write!(f, "{}", self.label),
        }
    }
}
