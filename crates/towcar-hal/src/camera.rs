//! Generic `Camera` trait and supporting types for image-capture hardware.

use towcar_types::TowError;

/// A raw image frame returned by a camera driver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CameraFrame {
    /// Monotonic capture counter assigned by the driver.
    pub index: u64,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Raw pixel data (e.g. BGR24).  Empty for replayed frames.
    pub data: Vec<u8>,
}

impl CameraFrame {
    /// A frame carrying only its geometry, used when perception output has
    /// been recorded ahead of time.
    pub fn empty(index: u64, width: u32, height: u32) -> Self {
        Self {
            index,
            width,
            height,
            data: Vec::new(),
        }
    }
}

/// A camera or image-capture device.
pub trait Camera: Send + Sync {
    /// Stable identifier for this camera, e.g. `"rear_rgb"`.
    fn id(&self) -> &str;

    /// Capture and return the next available frame.
    ///
    /// # Errors
    ///
    /// Returns [`TowError::Capture`] if the frame cannot be captured
    /// (e.g. the device is disconnected or the buffer is unavailable).
    fn capture(&mut self) -> Result<CameraFrame, TowError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockCamera {
        id: String,
        next: u64,
        unplugged: bool,
    }

    impl Camera for MockCamera {
        fn id(&self) -> &str {
            &self.id
        }

        fn capture(&mut self) -> Result<CameraFrame, TowError> {
            if self.unplugged {
                return Err(TowError::Capture {
                    camera: self.id.clone(),
                    details: "device not found".to_string(),
                });
            }
            self.next += 1;
            Ok(CameraFrame {
                index: self.next,
                width: 2,
                height: 2,
                data: vec![0u8; 2 * 2 * 3],
            })
        }
    }

    #[test]
    fn mock_camera_capture() {
        let mut cam = MockCamera {
            id: "rear_rgb".to_string(),
            next: 0,
            unplugged: false,
        };
        assert_eq!(cam.id(), "rear_rgb");
        let frame = cam.capture().unwrap();
        assert_eq!(frame.index, 1);
        assert_eq!(frame.width, 2);
        assert_eq!(frame.data.len(), 12);
        assert_eq!(cam.capture().unwrap().index, 2);
    }

    #[test]
    fn unplugged_camera_reports_capture_error() {
        let mut cam = MockCamera {
            id: "rear_rgb".to_string(),
            next: 0,
            unplugged: true,
        };
        let err = cam.capture().unwrap_err();
        assert!(matches!(err, TowError::Capture { ref camera, .. } if camera == "rear_rgb"));
    }

    #[test]
    fn empty_frame_has_no_pixels() {
        let frame = CameraFrame::empty(4, 640, 480);
        assert_eq!((frame.index, frame.width, frame.height), (4, 640, 480));
        assert!(frame.data.is_empty());
    }
}
