//! Recorded perception output for headless runs and CI without a camera or
//! inference engines.
//!
//! A replay log is JSON lines, one [`ReplayRecord`] per line.  Blank lines and
//! lines starting with `#` are skipped.
//!
//! ```text
//! # operator switches to docking, then one frame with marker 11
//! {"command": "docking"}
//! {"frame": {"width": 640, "height": 480, "markers": [{"id": 11, "corners": [[300,220],[340,220],[340,260],[300,260]]}]}}
//! "quit"
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::io::Cursor;
//! use towcar_hal::replay::{ReplayReader, ReplayRecord};
//! use towcar_types::OperatorCommand;
//!
//! let log = "# header\n{\"command\": \"docking\"}\n\n\"quit\"\n";
//! let records: Vec<_> = ReplayReader::new(Cursor::new(log))
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//!
//! assert_eq!(records, vec![ReplayRecord::Command(OperatorCommand::Docking), ReplayRecord::Quit]);
//! ```

use std::io::BufRead;

use serde::{Deserialize, Serialize};
use tracing::debug;

use towcar_types::{DetectedMarker, OperatorCommand, Skeleton, TowError};

use crate::camera::CameraFrame;
use crate::detector::{FiducialDetector, KeypointEstimator};

// ────────────────────────────────────────────────────────────────────────────
// Records
// ────────────────────────────────────────────────────────────────────────────

/// Everything the external engines reported for one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordedFrame {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub markers: Vec<DetectedMarker>,
    #[serde(default)]
    pub skeletons: Vec<Skeleton>,
}

impl RecordedFrame {
    /// The pixel-less frame handed to the pipelines.
    pub fn camera_frame(&self, index: u64) -> CameraFrame {
        CameraFrame::empty(index, self.width, self.height)
    }
}

impl FiducialDetector for RecordedFrame {
    fn detect_markers(&mut self, _frame: &CameraFrame) -> Result<Vec<DetectedMarker>, TowError> {
        Ok(self.markers.clone())
    }
}

impl KeypointEstimator for RecordedFrame {
    fn estimate_skeletons(&mut self, _frame: &CameraFrame) -> Result<Vec<Skeleton>, TowError> {
        Ok(self.skeletons.clone())
    }
}

/// One line of a replay log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayRecord {
    /// Operator input, latched before the next frame.
    Command(OperatorCommand),
    Frame(RecordedFrame),
    /// Stop processing.
    Quit,
}

// ────────────────────────────────────────────────────────────────────────────
// Reader
// ────────────────────────────────────────────────────────────────────────────

/// Iterates the records of a replay log.
///
/// Parse and I/O failures are yielded as [`TowError::Replay`] carrying the
/// 1-based line number.  Iteration continues past a malformed line but ends
/// after the first I/O failure.
pub struct ReplayReader<R: BufRead> {
    reader: R,
    line: usize,
    buf: String,
    done: bool,
}

impl<R: BufRead> ReplayReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: String::new(),
            done: false,
        }
    }

    /// Number of lines consumed so far.
    pub fn line(&self) -> usize {
        self.line
    }
}

impl<R: BufRead> Iterator for ReplayReader<R> {
    type Item = Result<ReplayRecord, TowError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => {
                    self.done = true;
                    return None;
                }
                Ok(_) => self.line += 1,
                Err(e) => {
                    self.done = true;
                    return Some(Err(TowError::Replay {
                        line: self.line + 1,
                        details: e.to_string(),
                    }));
                }
            }

            let text = self.buf.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }

            debug!(line = self.line, "replay record");
            return Some(serde_json::from_str(text).map_err(|e| TowError::Replay {
                line: self.line,
                details: e.to_string(),
            }));
        }
    }
}
