//! The plan-execute-reflect loop: the heart of Stepwise.
//!
//! The orchestrator drives a model through a structured task:
//!
//! 1. **Plan**: ask the model for a JSON plan of numbered, dependency-gated steps
//! 2. **Execute**: run the steps in ascending id order through a [`StepExecutor`],
//!    then combine their results with a [`ResultSynthesizer`]
//! 3. **Reflect**: ask the model to score the result against the goal
//! 4. **Replan**: if the score is too low, or a step failed, ask for a new plan
//!    using the feedback, and go back to step 2
//!
//! The loop ends on an accepted result or after `max_replan_attempts`
//! execution passes, whichever comes first.

pub mod execution;
pub mod generator;
pub mod json;
pub mod orchestrator;
pub mod plan;
pub mod prompts;
pub mod strategy;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use execution::{ExecutionOutcome, SchedulingPolicy};
pub use generator::{Generation, ProviderTextGenerator, TextGenerator};
pub use json::extract_json;
pub use orchestrator::{Orchestrator, OrchestratorState, RunOutcome, RunReport};
pub use plan::{Plan, PlanStep, Reflection, ReplanFeedback};
pub use strategy::{
    FnResultSynthesizer, FnStepExecutor, LlmResultSynthesizer, LlmStepExecutor,
    ResultSynthesizer, StepExecutor, StepResults,
};
