//! Body keypoints as reported by the external pose estimator.
//!
//! Skeletons follow the 17-joint COCO topology.  Only the upper-body joints
//! listed in [`UPPER_BODY_JOINTS`] are consumed by gesture classification.

use serde::{Deserialize, Serialize};

pub const NOSE: usize = 0;
pub const LEFT_SHOULDER: usize = 5;
pub const RIGHT_SHOULDER: usize = 6;
pub const LEFT_ELBOW: usize = 7;
pub const RIGHT_ELBOW: usize = 8;
pub const LEFT_WRIST: usize = 9;
pub const RIGHT_WRIST: usize = 10;

/// Joints drawn as dots by an overlay renderer.
pub const UPPER_BODY_JOINTS: [usize; 7] = [
    NOSE,
    LEFT_SHOULDER,
    RIGHT_SHOULDER,
    LEFT_ELBOW,
    RIGHT_ELBOW,
    LEFT_WRIST,
    RIGHT_WRIST,
];

/// Bones drawn as lines by an overlay renderer (pairs of joint indices).
pub const UPPER_BODY_LINKS: [(usize, usize); 5] = [
    (LEFT_SHOULDER, RIGHT_SHOULDER),
    (LEFT_SHOULDER, LEFT_ELBOW),
    (LEFT_ELBOW, LEFT_WRIST),
    (RIGHT_SHOULDER, RIGHT_ELBOW),
    (RIGHT_ELBOW, RIGHT_WRIST),
];

/// A single joint in pixel coordinates.
///
/// Serialized as a compact `[x, y, confidence]` triple.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 3]", into = "[f32; 3]")]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// Detection confidence in `[0, 1]`.
    pub confidence: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    /// `true` when the confidence strictly exceeds `threshold`.
    pub fn is_visible(&self, threshold: f32) -> bool {
        self.confidence > threshold
    }
}

impl From<[f32; 3]> for Keypoint {
    fn from([x, y, confidence]: [f32; 3]) -> Self {
        Self { x, y, confidence }
    }
}

impl From<Keypoint> for [f32; 3] {
    fn from(k: Keypoint) -> Self {
        [k.x, k.y, k.confidence]
    }
}

/// One person's keypoints, indexed by the COCO joint constants above.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Skeleton {
    pub keypoints: Vec<Keypoint>,
}

impl Skeleton {
    pub fn new(keypoints: Vec<Keypoint>) -> Self {
        Self { keypoints }
    }

    /// The keypoint at `index`, or `None` if the estimator returned fewer
    /// joints.
    pub fn joint(&self, index: usize) -> Option<&Keypoint> {
        self.keypoints.get(index)
    }

    /// Upper-body joints whose confidence exceeds `threshold`.
    pub fn visible_joints(&self, threshold: f32) -> Vec<(usize, Keypoint)> {
        UPPER_BODY_JOINTS
            .iter()
            .filter_map(|&i| self.joint(i).filter(|k| k.is_visible(threshold)).map(|k| (i, *k)))
            .collect()
    }

    /// Upper-body bones with both ends visible, as pixel-space segments.
    pub fn visible_links(&self, threshold: f32) -> Vec<(Keypoint, Keypoint)> {
        UPPER_BODY_LINKS
            .iter()
            .filter_map(|&(a, b)| {
                let ka = self.joint(a)?;
                let kb = self.joint(b)?;
                (ka.is_visible(threshold) && kb.is_visible(threshold)).then_some((*ka, *kb))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skeleton_with(conf: f32) -> Skeleton {
        Skeleton::new(vec![Keypoint::new(10.0, 20.0, conf); 17])
    }

    #[test]
    fn visibility_is_strict() {
        let k = Keypoint::new(0.0, 0.0, 0.5);
        assert!(!k.is_visible(0.5));
        assert!(Keypoint::new(0.0, 0.0, 0.51).is_visible(0.5));
    }

    #[test]
    fn short_skeleton_has_no_joint() {
        let s = Skeleton::new(vec![Keypoint::default(); 3]);
        assert!(s.joint(LEFT_WRIST).is_none());
        assert!(s.visible_links(0.5).is_empty());
    }

    #[test]
    fn visible_links_require_both_ends() {
        let mut s = skeleton_with(0.9);
        assert_eq!(s.visible_links(0.5).len(), 5);

        s.keypoints[LEFT_ELBOW].confidence = 0.1;
        // Drops shoulder-elbow and elbow-wrist on the left side.
        assert_eq!(s.visible_links(0.5).len(), 3);
        assert_eq!(s.visible_joints(0.5).len(), 6);
    }

    #[test]
    fn keypoint_serializes_as_triple() {
        let s = Skeleton::new(vec![Keypoint::new(1.0, 2.0, 0.5)]);
        let json = serde_json::to_string(&s).unwrap();
        assert_eq!(json, "[[1.0,2.0,0.5]]");
        let back: Skeleton = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
