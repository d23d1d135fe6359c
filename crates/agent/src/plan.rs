//! Plan, PlanStep and Reflection: the values the loop reasons about.
//!
//! Each is parsed from model output in the planner / reflection wire
//! format. Parsing goes through [`extract_json`] first, so surrounding
//! prose and code fences are tolerated; anything that still fails to
//! deserialize is a [`OrchestratorError::MalformedOutput`].

use serde::{Deserialize, Serialize};
use stepwise_core::error::{OrchestratorError, OutputPhase};

use crate::json::extract_json;

/// One candidate strategy for reaching a goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// What the plan is trying to achieve.
    #[serde(default)]
    pub goal: String,

    /// Steps in the order the planner produced them.
    pub steps: Vec<PlanStep>,

    /// Advisory acceptance statements. Only the reflection prompt reads them.
    #[serde(default)]
    pub success_criteria: Vec<String>,
}

/// One unit of work inside a [`Plan`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: i64,

    /// Instruction describing what must be done.
    pub action: String,

    /// Ids of steps that must have produced a result before this one runs.
    #[serde(default)]
    pub dependencies: Vec<i64>,

    /// Tool names the step might need. Informational only.
    #[serde(default)]
    pub tools: Vec<String>,

    #[serde(default)]
    pub completed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl PlanStep {
    pub fn new(id: i64, action: impl Into<String>) -> Self {
        Self {
            id,
            action: action.into(),
            dependencies: Vec::new(),
            tools: Vec::new(),
            completed: false,
            result: None,
        }
    }

    pub fn depends_on(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.dependencies.extend(ids);
        self
    }

    pub fn with_tools(mut self, tools: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tools.extend(tools.into_iter().map(Into::into));
        self
    }

    /// Clear any outcome recorded by a previous execution pass.
    pub fn reset(&mut self) {
        self.completed = false;
        self.result = None;
    }

    /// Record a successful outcome.
    pub fn complete(&mut self, result: impl Into<String>) {
        self.completed = true;
        self.result = Some(result.into());
    }
}

impl Plan {
    pub fn new(goal: impl Into<String>, steps: Vec<PlanStep>) -> Self {
        Self {
            goal: goal.into(),
            steps,
            success_criteria: Vec::new(),
        }
    }

    pub fn with_success_criteria(
        mut self,
        criteria: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.success_criteria
            .extend(criteria.into_iter().map(Into::into));
        self
    }

    /// Parse planner output.
    ///
    /// `fallback_goal` fills in the goal when the model left it out.
    pub fn parse(raw: &str, fallback_goal: &str) -> Result<Self, OrchestratorError> {
        let mut plan: Plan =
            serde_json::from_str(extract_json(raw)).map_err(|e| OrchestratorError::MalformedOutput {
                phase: OutputPhase::Planning,
                reason: e.to_string(),
            })?;
        if plan.goal.trim().is_empty() {
            plan.goal = fallback_goal.to_string();
        }
        Ok(plan)
    }

    /// Serialized form embedded in reflection prompts.
    pub fn render(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// The plan as a JSON value, for publishing into the shared context.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn step(&self, id: i64) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Every step has completed in the last execution pass.
    pub fn is_complete(&self) -> bool {
        self.steps.iter().all(|s| s.completed)
    }
}

/// An evaluation of one execution result against the goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reflection {
    pub satisfactory: bool,

    /// Quality score in `[0, 1]`.
    pub score: f64,

    #[serde(default)]
    pub strengths: Vec<String>,

    #[serde(default)]
    pub weaknesses: Vec<String>,

    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl Reflection {
    /// Parse reflection output. Scores outside `[0, 1]` are clamped.
    pub fn parse(raw: &str) -> Result<Self, OrchestratorError> {
        let mut reflection: Reflection = serde_json::from_str(extract_json(raw)).map_err(|e| {
            OrchestratorError::MalformedOutput {
                phase: OutputPhase::Reflection,
                reason: e.to_string(),
            }
        })?;
        reflection.score = reflection.score.clamp(0.0, 1.0);
        Ok(reflection)
    }

    /// Whether this verdict ends the loop.
    pub fn accepts(&self, threshold: f64) -> bool {
        self.satisfactory || self.score >= threshold
    }

    /// Replan feedback built from the weaknesses and suggestions.
    pub fn feedback(&self) -> String {
        format!(
            "Weaknesses: {}; Suggestions: {}",
            self.weaknesses.join(", "),
            self.suggestions.join(", ")
        )
    }
}

/// What the planner is told about the previous attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplanFeedback {
    /// The result was produced but judged insufficient.
    Reflection(Reflection),
    /// The execution pass aborted; carries the raw error message.
    ExecutionError(String),
}

impl ReplanFeedback {
    pub fn text(&self) -> String {
        match self {
            Self::Reflection(r) => r.feedback(),
            Self::ExecutionError(message) => message.clone(),
        }
    }
}

impl From<Reflection> for ReplanFeedback {
    fn from(reflection: Reflection) -> Self {
        Self::Reflection(reflection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN_PLAN: &str = r#"Here is my plan:
```json
{
  "goal": "Build a login form",
  "steps": [
    {"id": 1, "action": "Design the fields", "dependencies": [], "tools": ["figma"]},
    {"id": 2, "action": "Write the handler", "dependencies": [1]}
  ],
  "success_criteria": ["Form validates input"]
}
```"#;

    #[test]
    fn parse_plan_from_prose() {
        let plan = Plan::parse(LOGIN_PLAN, "ignored").unwrap();
        assert_eq!(plan.goal, "Build a login form");
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[0].tools, vec!["figma"]);
        assert!(plan.steps[1].tools.is_empty());
        assert_eq!(plan.steps[1].dependencies, vec![1]);
        assert_eq!(plan.success_criteria, vec!["Form validates input"]);
        assert!(!plan.steps[0].completed);
        assert!(plan.steps[0].result.is_none());
    }

    #[test]
    fn missing_goal_falls_back_to_input() {
        let plan = Plan::parse(r#"{"steps": [{"id": 1, "action": "x"}]}"#, "the input").unwrap();
        assert_eq!(plan.goal, "the input");
        assert!(plan.success_criteria.is_empty());
    }

    #[test]
    fn missing_steps_is_malformed() {
        let err = Plan::parse(r#"{"goal": "x"}"#, "x").unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::MalformedOutput {
                phase: OutputPhase::Planning,
                ..
            }
        ));
    }

    #[test]
    fn non_json_plan_is_malformed() {
        let err = Plan::parse("I cannot help with that.", "x").unwrap_err();
        assert!(err.to_string().contains("Malformed plan output"));
    }

    #[test]
    fn render_uses_wire_field_names() {
        let plan = Plan::new("g", vec![PlanStep::new(1, "a"), PlanStep::new(2, "b").depends_on([1])])
            .with_success_criteria(["done"]);
        let rendered = plan.render();
        assert!(rendered.contains("\"success_criteria\""));
        assert!(rendered.contains("\"dependencies\""));
        assert!(!rendered.contains("\"result\""));

        let back = Plan::parse(&rendered, "other").unwrap();
        assert_eq!(back, plan);
    }

    #[test]
    fn step_complete_and_reset() {
        let mut step = PlanStep::new(3, "compile");
        step.complete("ok");
        assert!(step.completed);
        assert_eq!(step.result.as_deref(), Some("ok"));
        step.reset();
        assert!(!step.completed);
        assert!(step.result.is_none());
    }

    #[test]
    fn parse_reflection() {
        let raw = r#"Evaluation: {"satisfactory": false, "score": 0.5,
            "strengths": ["clear"], "weaknesses": ["no tests", "no css"],
            "suggestions": ["add tests"]}"#;
        let r = Reflection::parse(raw).unwrap();
        assert!(!r.satisfactory);
        assert!((r.score - 0.5).abs() < f64::EPSILON);
        assert_eq!(r.strengths, vec!["clear"]);
        assert_eq!(r.feedback(), "Weaknesses: no tests, no css; Suggestions: add tests");
    }

    #[test]
    fn reflection_optional_lists_default_empty() {
        let r = Reflection::parse(r#"{"satisfactory": true, "score": 1}"#).unwrap();
        assert!(r.weaknesses.is_empty());
        assert_eq!(r.feedback(), "Weaknesses: ; Suggestions: ");
    }

    #[test]
    fn reflection_score_is_clamped() {
        let high = Reflection::parse(r#"{"satisfactory": false, "score": 7.5}"#).unwrap();
        assert!((high.score - 1.0).abs() < f64::EPSILON);
        let low = Reflection::parse(r#"{"satisfactory": false, "score": -2}"#).unwrap();
        assert!(low.score.abs() < f64::EPSILON);
    }

    #[test]
    fn reflection_missing_score_is_malformed() {
        let err = Reflection::parse(r#"{"satisfactory": true}"#).unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::MalformedOutput {
                phase: OutputPhase::Reflection,
                ..
            }
        ));
    }

    #[test]
    fn acceptance_by_flag_or_score() {
        let mut r = Reflection::parse(r#"{"satisfactory": false, "score": 0.8}"#).unwrap();
        assert!(r.accepts(0.8));
        assert!(!r.accepts(0.81));
        r.satisfactory = true;
        assert!(r.accepts(0.99));
    }

    #[test]
    fn replan_feedback_text() {
        let r = Reflection {
            satisfactory: false,
            score: 0.2,
            strengths: vec!["fast".into()],
            weaknesses: vec!["wrong".into()],
            suggestions: vec!["retry".into()],
        };
        let text = ReplanFeedback::from(r).text();
        assert_eq!(text, "Weaknesses: wrong; Suggestions: retry");
        assert!(!text.contains("fast"));

        let err = ReplanFeedback::ExecutionError("Step 2 failed: disk full".into());
        assert_eq!(err.text(), "Step 2 failed: disk full");
    }
}
