//! Shared context: the session-scoped key/value store a run publishes into.
//!
//! The orchestrator writes its current plan and every step result here so
//! the host application (or nested tooling) can inspect progress mid-run.
//! The store is passed explicitly by `&mut` and is never global.
//!
//! Well-known keys:
//!
//! | Key | Value |
//! |-----|-------|
//! | `agent_name` | Name of the orchestrator driving the run |
//! | `current_plan` | The plan currently being executed (planner wire format) |
//! | `step_<id>_result` | Text produced by step `<id>` |

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

/// Key under which the running agent records its name.
pub const AGENT_NAME_KEY: &str = "agent_name";

/// Key under which the current plan is published.
pub const CURRENT_PLAN_KEY: &str = "current_plan";

/// Key under which the result of step `id` is published.
pub fn step_result_key(id: i64) -> String {
    format!("step_{id}_result")
}

/// A session-scoped key/value store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SharedContext {
    /// Session this context belongs to.
    pub session_id: String,

    values: serde_json::Map<String, Value>,
}

impl SharedContext {
    /// Create an empty context for a session.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            values: serde_json::Map::new(),
        }
    }

    /// Look up a value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Look up a value, falling back to `default` when absent.
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.values.get(key).cloned().unwrap_or(default)
    }

    /// Look up a string value.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Insert or replace a value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        trace!(session = %self.session_id, key = %key, "context set");
        self.values.insert(key, value.into());
    }

    /// Remove a value, returning it if present.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Whether a key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// All keys currently stored.
    pub fn keys(&self) -> Vec<&str> {
        self.values.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_and_get() {
        let mut ctx = SharedContext::new("session-1");
        ctx.set("answer", 42);
        assert_eq!(ctx.get("answer"), Some(&json!(42)));
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn get_or_falls_back() {
        let ctx = SharedContext::new("session-1");
        assert_eq!(ctx.get_or("missing", json!("fallback")), json!("fallback"));
    }

    #[test]
    fn set_replaces_existing_value() {
        let mut ctx = SharedContext::new("s");
        ctx.set(CURRENT_PLAN_KEY, json!({"goal": "a"}));
        ctx.set(CURRENT_PLAN_KEY, json!({"goal": "b"}));
        assert_eq!(ctx.get(CURRENT_PLAN_KEY).unwrap()["goal"], "b");
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn step_result_key_format() {
        assert_eq!(step_result_key(3), "step_3_result");
    }

    #[test]
    fn get_str_and_remove() {
        let mut ctx = SharedContext::new("s");
        ctx.set(AGENT_NAME_KEY, "planner");
        assert_eq!(ctx.get_str(AGENT_NAME_KEY), Some("planner"));
        assert!(ctx.remove(AGENT_NAME_KEY).is_some());
        assert!(!ctx.contains(AGENT_NAME_KEY));
        assert!(ctx.is_empty());
    }
}
