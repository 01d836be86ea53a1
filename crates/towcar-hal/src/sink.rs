//! Generic `ReadingSink` trait for whatever consumes per-frame reports: an
//! overlay renderer, a vehicle controller, a log file.
//!
//! The pipelines never talk to a concrete consumer, so sinks can be swapped
//! without touching perception or mode logic.

use std::io::Write;

use towcar_types::{FrameReport, TowError};

/// A consumer of [`FrameReport`]s.
pub trait ReadingSink {
    /// Stable identifier for this sink, e.g. `"stdout"`.
    fn id(&self) -> &str;

    /// Hand one report to the consumer.
    ///
    /// # Errors
    ///
    /// Returns [`TowError::Sink`] if the report cannot be delivered.
    fn publish(&mut self, report: &FrameReport) -> Result<(), TowError>;
}

// ────────────────────────────────────────────────────────────────────────────
// JSON lines
// ────────────────────────────────────────────────────────────────────────────

/// Writes each report as one JSON object per line and flushes, so a
/// downstream process can follow the stream live.
pub struct JsonLinesSink<W: Write> {
    id: String,
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(id: impl Into<String>, writer: W) -> Self {
        Self {
            id: id.into(),
            writer,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ReadingSink for JsonLinesSink<W> {
    fn id(&self) -> &str {
        &self.id
    }

    fn publish(&mut self, report: &FrameReport) -> Result<(), TowError> {
        let line = serde_json::to_string(report).map_err(|e| TowError::Sink(e.to_string()))?;
        writeln!(self.writer, "{line}")
            .and_then(|_| self.writer.flush())
            .map_err(|e| TowError::Sink(format!("{}: {e}", self.id)))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory
// ────────────────────────────────────────────────────────────────────────────

/// Records every report it receives.  Always succeeds.
#[derive(Debug, Default)]
pub struct MemorySink {
    reports: Vec<FrameReport>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> &[FrameReport] {
        &self.reports
    }
}

impl ReadingSink for MemorySink {
    fn id(&self) -> &str {
        "memory"
    }

    fn publish(&mut self, report: &FrameReport) -> Result<(), TowError> {
        self.reports.push(report.clone());
        Ok(())
    }
}
