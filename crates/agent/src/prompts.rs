//! Planner and reflection instructions, and the user prompts for each phase.

/// System instructions for plan generation and replanning.
pub const DEFAULT_PLANNER_INSTRUCTIONS: &str = r#"You are a planning agent. Break the user's goal into a small number of concrete steps.

Respond with a single JSON object and nothing else, using this schema:
{
  "goal": "restated objective",
  "steps": [
    {"id": 1, "action": "what to do", "dependencies": [], "tools": []}
  ],
  "success_criteria": ["how to tell the goal was met"]
}

Rules:
- Step ids are integers. Steps run in ascending id order.
- A step may only depend on steps with a lower id.
- "tools" lists tool names the step may need; leave it empty if none."#;

/// System instructions for evaluating an execution result.
pub const DEFAULT_REFLECTION_INSTRUCTIONS: &str = r#"You are a critical reviewer. Evaluate whether the result achieves the original goal and meets the plan's success criteria.

Respond with a single JSON object and nothing else, using this schema:
{
  "satisfactory": true,
  "score": 0.0,
  "strengths": ["..."],
  "weaknesses": ["..."],
  "suggestions": ["..."]
}

"score" is a number between 0 and 1."#;

/// User prompt for the initial plan.
pub fn planning_prompt(input: &str) -> String {
    format!("Create a plan to achieve the following goal:\n\n{input}")
}

/// User prompt for evaluating `result` produced by `rendered_plan`.
pub fn reflection_prompt(input: &str, rendered_plan: &str, result: &str) -> String {
    format!(
        "Original goal:\n{input}\n\nPlan that was executed:\n{rendered_plan}\n\nResult:\n{result}\n\nEvaluate this result."
    )
}

/// User prompt for a new plan after a failed attempt.
pub fn replanning_prompt(input: &str, previous_result: Option<&str>, feedback: &str) -> String {
    let previous = previous_result.unwrap_or("(no result was produced)");
    format!(
        "Original goal:\n{input}\n\nPrevious result:\n{previous}\n\nFeedback on the previous attempt:\n{feedback}\n\nCreate an improved plan that addresses this feedback."
    )
}
