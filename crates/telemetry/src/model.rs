//! Data model for run traces and spans.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Span ──────────────────────────────────────────────────────────────────

/// The kind of work a span represents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    /// A whole orchestrator run (goal → final result).
    Run,
    /// Initial plan generation.
    Planning,
    /// One execution pass over a plan.
    Execution,
    /// A single plan step.
    Step,
    /// Evaluation of an execution result.
    Reflection,
    /// Plan regeneration after feedback.
    Replanning,
    /// A model call.
    LlmCall,
}

impl std::fmt::Display for SpanKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Run => write!(f, "run"),
            Self::Planning => write!(f, "planning"),
            Self::Execution => write!(f, "execution"),
            Self::Step => write!(f, "step"),
            Self::Reflection => write!(f, "reflection"),
            Self::Replanning => write!(f, "replanning"),
            Self::LlmCall => write!(f, "llm_call"),
        }
    }
}

/// Completion state of a span.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", content = "error", rename_all = "snake_case")]
pub enum SpanStatus {
    Running,
    Succeeded,
    Failed(String),
}

/// A single traced execution unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    /// Unique identifier.
    pub id: String,
    /// Parent span id (None for the root span).
    pub parent_id: Option<String>,
    /// What kind of work this represents.
    pub kind: SpanKind,
    /// Human-readable label (agent name, step id, model name).
    pub label: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Duration in milliseconds (computed on end).
    pub duration_ms: Option<u64>,
    /// Input tokens consumed (for LLM calls).
    pub input_tokens: Option<u32>,
    /// Output tokens produced (for LLM calls).
    pub output_tokens: Option<u32>,
    pub status: SpanStatus,
    /// Arbitrary metadata.
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Span {
    /// Create a new running span with the given kind and label.
    pub fn new(kind: SpanKind, label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            parent_id: None,
            kind,
            label: label.into(),
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
            input_tokens: None,
            output_tokens: None,
            status: SpanStatus::Running,
            metadata: serde_json::Map::new(),
        }
    }

    /// Set the parent span.
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Close the span with the given status. Closing twice keeps the first status.
    pub fn finish(&mut self, status: SpanStatus) {
        if self.ended_at.is_some() {
            return;
        }
        let now = Utc::now();
        self.ended_at = Some(now);
        self.duration_ms = Some(
            now.signed_duration_since(self.started_at)
                .num_milliseconds()
                .max(0) as u64,
        );
        self.status = status;
    }

    /// Record token usage.
    pub fn record_tokens(&mut self, input: u32, output: u32) {
        self.input_tokens = Some(input);
        self.output_tokens = Some(output);
    }

    /// Total tokens (input + output), or 0 if not recorded.
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens.unwrap_or(0) + self.output_tokens.unwrap_or(0)
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

// ── Trace ─────────────────────────────────────────────────────────────────

/// All spans recorded for one orchestrator run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    /// Unique trace id.
    pub id: String,
    /// Session the run belonged to.
    pub session_id: String,
    /// All spans in start order; the first is the root.
    pub spans: Vec<Span>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Trace {
    /// Create a new trace for a session.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            spans: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn add_span(&mut self, span: Span) {
        self.spans.push(span);
    }

    pub fn span(&self, span_id: &str) -> Option<&Span> {
        self.spans.iter().find(|s| s.id == span_id)
    }

    pub fn span_mut(&mut self, span_id: &str) -> Option<&mut Span> {
        self.spans.iter_mut().find(|s| s.id == span_id)
    }

    /// The root span, if one was recorded.
    pub fn root(&self) -> Option<&Span> {
        self.spans.iter().find(|s| s.is_root())
    }

    /// Direct children of a span, in start order.
    pub fn children(&self, span_id: &str) -> Vec<&Span> {
        self.spans
            .iter()
            .filter(|s| s.parent_id.as_deref() == Some(span_id))
            .collect()
    }

    /// Mark the trace as complete.
    pub fn end(&mut self) {
        self.ended_at = Some(Utc::now());
    }

    /// Total tokens across all spans.
    pub fn total_tokens(&self) -> u32 {
        self.spans.iter().map(|s| s.total_tokens()).sum()
    }

    /// Number of spans of a given kind.
    pub fn count(&self, kind: SpanKind) -> usize {
        self.spans.iter().filter(|s| s.kind == kind).count()
    }

    /// Whether the run as a whole succeeded.
    pub fn succeeded(&self) -> bool {
        self.root()
            .is_some_and(|s| s.status == SpanStatus::Succeeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_lifecycle() {
        let mut span = Span::new(SpanKind::LlmCall, "gpt-4o");
        assert!(span.ended_at.is_none());
        assert_eq!(span.status, SpanStatus::Running);
        assert_eq!(span.total_tokens(), 0);

        span.record_tokens(100, 50);
        assert_eq!(span.total_tokens(), 150);

        span.finish(SpanStatus::Succeeded);
        assert!(span.ended_at.is_some());
        assert!(span.duration_ms.is_some());
        assert_eq!(span.status, SpanStatus::Succeeded);
    }

    #[test]
    fn finish_is_idempotent() {
        let mut span = Span::new(SpanKind::Step, "step-1");
        span.finish(SpanStatus::Failed("boom".into()));
        span.finish(SpanStatus::Succeeded);
        assert_eq!(span.status, SpanStatus::Failed("boom".into()));
    }

    #[test]
    fn trace_hierarchy() {
        let mut trace = Trace::new("session-1");
        let root = Span::new(SpanKind::Run, "planner");
        let root_id = root.id.clone();
        trace.add_span(root);
        trace.add_span(Span::new(SpanKind::Planning, "plan").with_parent(&root_id));
        trace.add_span(Span::new(SpanKind::Execution, "attempt-1").with_parent(&root_id));

        assert_eq!(trace.root().unwrap().id, root_id);
        assert_eq!(trace.children(&root_id).len(), 2);
        assert_eq!(trace.count(SpanKind::Planning), 1);
        assert!(!trace.succeeded());
    }

    #[test]
    fn span_kind_display() {
        assert_eq!(SpanKind::Run.to_string(), "run");
        assert_eq!(SpanKind::Replanning.to_string(), "replanning");
        assert_eq!(SpanKind::LlmCall.to_string(), "llm_call");
    }

    #[test]
    fn failed_status_serializes_with_error() {
        let json = serde_json::to_value(SpanStatus::Failed("bad json".into())).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["error"], "bad json");
    }
}
