//! The observability sink contract consumed by the orchestrator.
//!
//! A sink receives span start/end events and builds a hierarchical trace
//! of a run. Sinks never influence control flow: every method is
//! infallible from the caller's side, and unknown span references are
//! ignored.

use crate::model::SpanKind;

/// Handle to a span inside a specific trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanRef {
    pub trace_id: String,
    pub span_id: String,
}

/// Receiver of span lifecycle events.
pub trait TraceSink: Send + Sync {
    /// Open a new trace with a root span and return a handle to that span.
    fn start_trace(&self, session_id: &str, kind: SpanKind, label: &str) -> SpanRef;

    /// Open a child span under `parent`.
    fn start_span(&self, parent: &SpanRef, kind: SpanKind, label: &str) -> SpanRef;

    /// Close a span successfully. Closing the root span ends the trace.
    fn end_span(&self, span: &SpanRef);

    /// Close a span as failed. Failing the root span ends the trace.
    fn fail_span(&self, span: &SpanRef, error: &str);

    /// Attach a metadata field to a span.
    fn annotate(&self, span: &SpanRef, key: &str, value: serde_json::Value);

    /// Record model token usage on a span.
    fn record_tokens(&self, span: &SpanRef, input_tokens: u32, output_tokens: u32);
}
