//! Thread-safe telemetry engine: collects run traces and serves them
//! back for inspection and export.

use crate::TelemetryError;
use crate::model::*;
use crate::sink::{SpanRef, TraceSink};
use std::sync::RwLock;

/// Retained traces before the oldest completed ones are pruned.
const MAX_TRACES: usize = 5_000;

/// The core telemetry engine.
///
/// Thread-safe via `RwLock`. Records the spans of every orchestrator run
/// into an in-memory trace store.
pub struct TelemetryEngine {
    /// All recorded traces (most recent last).
    traces: RwLock<Vec<Trace>>,
}

impl TelemetryEngine {
    pub fn new() -> Self {
        Self {
            traces: RwLock::new(Vec::new()),
        }
    }

    fn with_trace<R>(&self, trace_id: &str, f: impl FnOnce(&mut Trace) -> R) -> Option<R> {
        let mut traces = self.traces.write().unwrap_or_else(|e| e.into_inner());
        traces.iter_mut().find(|t| t.id == trace_id).map(f)
    }

    fn finish(&self, span: &SpanRef, status: SpanStatus) {
        let found = self.with_trace(&span.trace_id, |trace| {
            let Some(s) = trace.span_mut(&span.span_id) else {
                return false;
            };
            s.finish(status);
            if s.is_root() {
                trace.end();
            }
            true
        });
        if found != Some(true) {
            tracing::debug!(span_id = %span.span_id, "finish on unknown span ignored");
        }
    }

    // ── Queries ───────────────────────────────────────────────────────

    /// Get a specific trace by ID.
    pub fn get_trace(&self, trace_id: &str) -> Option<Trace> {
        let traces = self.traces.read().unwrap_or_else(|e| e.into_inner());
        traces.iter().find(|t| t.id == trace_id).cloned()
    }

    /// List recent traces (most recent first).
    pub fn recent_traces(&self, limit: usize) -> Vec<Trace> {
        let traces = self.traces.read().unwrap_or_else(|e| e.into_inner());
        traces.iter().rev().take(limit).cloned().collect()
    }

    /// Get traces for a specific session.
    pub fn traces_for_session(&self, session_id: &str) -> Vec<Trace> {
        let traces = self.traces.read().unwrap_or_else(|e| e.into_inner());
        traces
            .iter()
            .filter(|t| t.session_id == session_id)
            .cloned()
            .collect()
    }

    /// Total number of traces recorded.
    pub fn trace_count(&self) -> usize {
        self.traces.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Serialize a trace as pretty JSON.
    pub fn export_json(&self, trace_id: &str) -> Result<String, TelemetryError> {
        let trace = self
            .get_trace(trace_id)
            .ok_or_else(|| TelemetryError::UnknownTrace(trace_id.to_string()))?;
        Ok(serde_json::to_string_pretty(&trace)?)
    }
}

impl Default for TelemetryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceSink for TelemetryEngine {
    fn start_trace(&self, session_id: &str, kind: SpanKind, label: &str) -> SpanRef {
        let mut trace = Trace::new(session_id);
        let root = Span::new(kind, label);
        let span_ref = SpanRef {
            trace_id: trace.id.clone(),
            span_id: root.id.clone(),
        };
        trace.add_span(root);

        let mut traces = self.traces.write().unwrap_or_else(|e| e.into_inner());

        // Auto-prune completed traces if too many accumulate
        if traces.len() >= MAX_TRACES {
            let drain_count = MAX_TRACES / 10;
            let mut removed = 0;
            traces.retain(|t| {
                if removed >= drain_count || t.ended_at.is_none() {
                    return true;
                }
                removed += 1;
                false
            });
        }

        traces.push(trace);
        span_ref
    }

    fn start_span(&self, parent: &SpanRef, kind: SpanKind, label: &str) -> SpanRef {
        let span = Span::new(kind, label).with_parent(&parent.span_id);
        let span_ref = SpanRef {
            trace_id: parent.trace_id.clone(),
            span_id: span.id.clone(),
        };
        self.with_trace(&parent.trace_id, |trace| trace.add_span(span));
        span_ref
    }

    fn end_span(&self, span: &SpanRef) {
        self.finish(span, SpanStatus::Succeeded);
    }

    fn fail_span(&self, span: &SpanRef, error: &str) {
        self.finish(span, SpanStatus::Failed(error.to_string()));
    }

    fn annotate(&self, span: &SpanRef, key: &str, value: serde_json::Value) {
        self.with_trace(&span.trace_id, |trace| {
            if let Some(s) = trace.span_mut(&span.span_id) {
                s.metadata.insert(key.to_string(), value);
            }
        });
    }

    fn record_tokens(&self, span: &SpanRef, input_tokens: u32, output_tokens: u32) {
        self.with_trace(&span.trace_id, |trace| {
            if let Some(s) = trace.span_mut(&span.span_id) {
                s.record_tokens(input_tokens, output_tokens);
            }
        });
    }
}
