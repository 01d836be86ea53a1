//! Pose smoothing tracker.
//!
//! Stabilises noisy per-frame pose estimates with a first-order exponential
//! moving average, keeping one history per target identity:
//!
//! ```text
//! smoothed = α · raw + (1 − α) · previous
//! ```
//!
//! applied component-wise to both the axis-angle rotation vector and the
//! translation.  The first observation of an identity seeds its history
//! unsmoothed.
//!
//! # Example
//!
//! ```rust
//! use nalgebra::Vector3;
//! use towcar_perception::smoothing::PoseSmoother;
//! use towcar_types::Pose;
//!
//! let mut smoother = PoseSmoother::new(0.3);
//!
//! let first = smoother.update(11, Pose::new(Vector3::zeros(), Vector3::new(0.0, 0.0, 10.0)));
//! assert!((first.translation.z - 10.0).abs() < 1e-12);
//!
//! let second = smoother.update(11, Pose::new(Vector3::zeros(), Vector3::new(0.0, 0.0, 20.0)));
//! assert!((second.translation.z - 13.0).abs() < 1e-9);
//! ```

use std::collections::HashMap;

use towcar_types::Pose;

/// Smoothing factor applied when none is configured.
pub const DEFAULT_ALPHA: f64 = 0.3;

/// Per-identity exponential smoothing of [`Pose`] estimates.
///
/// Entries are created on the first successful estimate for an identity and
/// updated in place afterwards.  They are never evicted: identities come from
/// a small, finite marker dictionary.
#[derive(Debug, Clone)]
pub struct PoseSmoother {
    /// Weight of the newest sample (0–1).
    alpha: f64,
    entries: HashMap<i32, Pose>,
}

impl PoseSmoother {
    /// Create an empty tracker.  `alpha` is clamped to `[0, 1]`; a non-finite
    /// value falls back to [`DEFAULT_ALPHA`].
    pub fn new(alpha: f64) -> Self {
        let alpha = if alpha.is_finite() { alpha.clamp(0.0, 1.0) } else { DEFAULT_ALPHA };
        Self {
            alpha,
            entries: HashMap::new(),
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Fold `raw` into the history of `id` and return the smoothed pose.
    pub fn update(&mut self, id: i32, raw: Pose) -> Pose {
        let smoothed = match self.entries.get(&id) {
            Some(previous) => raw.blend(previous, self.alpha),
            None => raw,
        };
        self.entries.insert(id, smoothed);
        smoothed
    }

    /// Last smoothed pose for `id`, if it has ever been observed.
    pub fn get(&self, id: i32) -> Option<&Pose> {
        self.entries.get(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PoseSmoother {
    fn default() -> Self {
        Self::new(DEFAULT_ALPHA)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
