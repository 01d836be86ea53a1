//! `towcar-runtime` – the frame loop.
//!
//! # Modules
//!
//! - [`supervisor`] – [`ModeSupervisor`][supervisor::ModeSupervisor]:
//!   latches operator commands and fixes the operating mode per frame.
//! - [`session`] – [`Session`][session::Session]: owns all cross-frame state
//!   and routes each frame to the docking or marshalling pipeline.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.  Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable live trace export.

pub mod session;
pub mod supervisor;
pub mod telemetry;

pub use session::{PipelineConfig, Session};
pub use supervisor::ModeSupervisor;
pub use telemetry::{TracerProviderGuard, init_tracing};
