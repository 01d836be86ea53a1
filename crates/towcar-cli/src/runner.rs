//! Replay runner – drives a [`Session`] from a replay log.
//!
//! Each record is handled in order:
//!
//! - `{"command": ...}` – latched for the next frame;
//! - `{"frame": ...}` – processed, and the report published to the sink;
//! - `"quit"` – stops the run.
//!
//! Malformed lines are logged and skipped; a read failure ends the run.  The
//! shutdown flag is polled before every record, so Ctrl-C stops after the
//! frame in flight.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use towcar_hal::{ReadingSink, ReplayReader, ReplayRecord};
use towcar_runtime::Session;
use towcar_types::TowError;

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndOfLog,
    Quit,
    Interrupted,
}

/// Counters reported when a run ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub commands: usize,
    pub skipped: usize,
    pub stopped: StopReason,
}

/// Feed every record from `reader` through `session`.
///
/// # Errors
///
/// Returns the sink's error if a report cannot be published; replay parse
/// errors are not fatal.
pub fn run<R, S>(
    session: &mut Session,
    reader: ReplayReader<R>,
    sink: &mut S,
    shutdown: &AtomicBool,
) -> Result<RunSummary, TowError>
where
    R: BufRead,
    S: ReadingSink + ?Sized,
{
    let mut summary = RunSummary {
        frames: 0,
        commands: 0,
        skipped: 0,
        stopped: StopReason::EndOfLog,
    };

    for record in reader {
        if shutdown.load(Ordering::SeqCst) {
            summary.stopped = StopReason::Interrupted;
            break;
        }

        match record {
            Ok(ReplayRecord::Command(command)) => {
                session.request(command);
                summary.commands += 1;
            }
            Ok(ReplayRecord::Frame(mut recorded)) => {
                summary.frames += 1;
                let frame = recorded.camera_frame(summary.frames);
                let report = session.process_frame(&frame, &mut recorded);
                sink.publish(&report)?;
            }
            Ok(ReplayRecord::Quit) => {
                summary.stopped = StopReason::Quit;
                break;
            }
            Err(e) => {
                warn!(error = %e, "skipping replay record");
                summary.skipped += 1;
            }
        }
    }

    info!(
        frames = summary.frames,
        commands = summary.commands,
        skipped = summary.skipped,
        stopped = ?summary.stopped,
        sink = sink.id(),
        "replay finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, BufReader, Cursor, Read};
    use towcar_hal::MemorySink;
    use towcar_perception::CameraIntrinsics;
    use towcar_runtime::PipelineConfig;
    use towcar_types::{FrameReading, FrameReport, GestureReading, OperatingMode};

    const MARKER: &str = r#"{"frame": {"width": 640, "height": 480, "markers": [{"id": 11, "corners": [[300,220],[340,220],[340,260],[300,260]]}]}}"#;
    const EMPTY: &str = r#"{"frame": {"width": 640, "height": 480}}"#;

    fn session() -> Session {
        Session::with_intrinsics(
            PipelineConfig::default(),
            CameraIntrinsics::pinhole(800.0, 800.0, 320.0, 240.0),
        )
    }

    fn replay(log: &str) -> ReplayReader<Cursor<String>> {
        ReplayReader::new(Cursor::new(log.to_string()))
    }

    /// Sink that refuses every report.
    struct ClosedSink;

    impl ReadingSink for ClosedSink {
        fn id(&self) -> &str {
            "closed"
        }

        fn publish(&mut self, _report: &FrameReport) -> Result<(), TowError> {
            Err(TowError::Sink("closed".to_string()))
        }
    }

    #[test]
    fn commands_switch_pipelines_between_frames() {
        let log = format!("{EMPTY}\n{{\"command\": \"docking\"}}\n{MARKER}\n{{\"command\": \"m\"}}\n");
        let mut sink = MemorySink::new();
        let shutdown = AtomicBool::new(false);

        let summary = run(&mut session(), replay(&log), &mut sink, &shutdown).unwrap();
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.stopped, StopReason::EndOfLog);

        let reports = sink.reports();
        assert_eq!(reports[0].reading, FrameReading::Marshal(GestureReading::idle()));
        let FrameReading::Docking(reading) = &reports[1].reading else {
            panic!("expected a docking reading");
        };
        assert!(reading.found);
        assert_eq!(reading.id, 11);
        assert_eq!(reading.center, (320, 240));
        // `m` is a keyboard shortcut, not a replay command name.
        assert_eq!(summary.skipped, 1);
    }

    #[test]
    fn quit_stops_before_later_frames() {
        let log = format!("{EMPTY}\n\"quit\"\n{EMPTY}\n");
        let mut sink = MemorySink::new();
        let summary = run(&mut session(), replay(&log), &mut sink, &AtomicBool::new(false)).unwrap();
        assert_eq!(summary.stopped, StopReason::Quit);
        assert_eq!(sink.reports().len(), 1);
    }

    #[test]
    fn shutdown_flag_interrupts_run() {
        let log = format!("{EMPTY}\n{EMPTY}\n");
        let mut sink = MemorySink::new();
        let summary = run(&mut session(), replay(&log), &mut sink, &AtomicBool::new(true)).unwrap();
        assert_eq!(summary.stopped, StopReason::Interrupted);
        assert!(sink.reports().is_empty());
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let log = format!("{{broken\n{EMPTY}\n");
        let mut sink = MemorySink::new();
        let mut s = session();
        let summary = run(&mut s, replay(&log), &mut sink, &AtomicBool::new(false)).unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.frames, 1);
        assert_eq!(s.mode(), OperatingMode::Marshal);
    }

    /// Input whose every read fails, like `towcar run /tmp`.
    struct Unreadable;

    impl Read for Unreadable {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("is a directory"))
        }
    }

    #[test]
    fn unreadable_input_ends_run() {
        let reader = ReplayReader::new(BufReader::new(Unreadable));
        let mut sink = MemorySink::new();
        let summary = run(&mut session(), reader, &mut sink, &AtomicBool::new(false)).unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.frames, 0);
        assert_eq!(summary.stopped, StopReason::EndOfLog);
    }

    #[test]
    fn sink_failure_aborts_run() {
        let log = format!("{EMPTY}\n");
        let err = run(&mut session(), replay(&log), &mut ClosedSink, &AtomicBool::new(false))
            .unwrap_err();
        assert_eq!(err, TowError::Sink("closed".to_string()));
    }
}
