//! Execution tracing for Stepwise runs.
//!
//! Provides span-based tracing of every orchestrator phase (planning,
//! execution passes, individual steps, reflection, replanning, model
//! calls) with token accounting, collected into one trace per run.

pub mod engine;
pub mod model;
pub mod sink;

pub use engine::TelemetryEngine;
pub use model::{Span, SpanKind, SpanStatus, Trace};
pub use sink::{SpanRef, TraceSink};

/// Errors from the telemetry subsystem.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("unknown trace id: {0}")]
    UnknownTrace(String),

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}
