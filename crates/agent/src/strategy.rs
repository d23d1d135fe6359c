//! Step execution and result synthesis strategies.
//!
//! The orchestrator is parameterized by a [`StepExecutor`] (run one step)
//! and a [`ResultSynthesizer`] (combine all step results into an answer).
//! Hosts supply their own, wrap plain closures with [`FnStepExecutor`] /
//! [`FnResultSynthesizer`], or use the model-backed defaults.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;
use stepwise_core::context::SharedContext;
use stepwise_core::error::StepError;

use crate::generator::TextGenerator;
use crate::plan::{Plan, PlanStep};

/// Results of the current execution pass, keyed by step id.
pub type StepResults = BTreeMap<i64, String>;

/// Runs a single plan step.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// Execute `step`. `previous` holds the results produced earlier in
    /// the same pass.
    async fn execute_step(
        &self,
        step: &PlanStep,
        previous: &StepResults,
        context: &mut SharedContext,
    ) -> Result<String, StepError>;
}

/// Combines the results of a fully executed plan into a final answer.
#[async_trait]
pub trait ResultSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        plan: &Plan,
        results: &StepResults,
        context: &mut SharedContext,
    ) -> Result<String, StepError>;
}

// ── Closure adapters ──────────────────────────────────────────────────────

/// A [`StepExecutor`] backed by a synchronous closure.
pub struct FnStepExecutor<F>(F);

impl<F> FnStepExecutor<F>
where
    F: Fn(&PlanStep, &StepResults, &mut SharedContext) -> Result<String, StepError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> StepExecutor for FnStepExecutor<F>
where
    F: Fn(&PlanStep, &StepResults, &mut SharedContext) -> Result<String, StepError> + Send + Sync,
{
    async fn execute_step(
        &self,
        step: &PlanStep,
        previous: &StepResults,
        context: &mut SharedContext,
    ) -> Result<String, StepError> {
        (self.0)(step, previous, context)
    }
}

/// A [`ResultSynthesizer`] backed by a synchronous closure.
pub struct FnResultSynthesizer<F>(F);

impl<F> FnResultSynthesizer<F>
where
    F: Fn(&Plan, &StepResults, &mut SharedContext) -> Result<String, StepError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> ResultSynthesizer for FnResultSynthesizer<F>
where
    F: Fn(&Plan, &StepResults, &mut SharedContext) -> Result<String, StepError> + Send + Sync,
{
    async fn synthesize(
        &self,
        plan: &Plan,
        results: &StepResults,
        context: &mut SharedContext,
    ) -> Result<String, StepError> {
        (self.0)(plan, results, context)
    }
}

// ── Model-backed defaults ─────────────────────────────────────────────────

const STEP_INSTRUCTIONS: &str = "You are executing one step of a larger plan. \
Carry out the step described by the user and reply with its result only. \
Use the results of earlier steps when they are relevant.";

const SYNTHESIS_INSTRUCTIONS: &str = "You are given a goal and the results of every step \
of the plan executed to reach it. Combine them into a single, complete final answer \
for the goal. Reply with the answer only.";

fn write_results(out: &mut String, results: &StepResults) {
    for (id, result) in results {
        let _ = writeln!(out, "[step {id}]\n{result}\n");
    }
}

/// Executes each step by asking the model to carry it out.
pub struct LlmStepExecutor {
    generator: Arc<dyn TextGenerator>,
}

impl LlmStepExecutor {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    fn prompt(step: &PlanStep, previous: &StepResults) -> String {
        let mut prompt = format!("Step {}: {}\n", step.id, step.action);
        if !step.tools.is_empty() {
            let _ = writeln!(prompt, "Suggested tools: {}", step.tools.join(", "));
        }
        if !previous.is_empty() {
            prompt.push_str("\nResults of earlier steps:\n");
            write_results(&mut prompt, previous);
        }
        prompt
    }
}

#[async_trait]
impl StepExecutor for LlmStepExecutor {
    async fn execute_step(
        &self,
        step: &PlanStep,
        previous: &StepResults,
        _context: &mut SharedContext,
    ) -> Result<String, StepError> {
        let generation = self
            .generator
            .generate(STEP_INSTRUCTIONS, &Self::prompt(step, previous))
            .await?;
        Ok(generation.text)
    }
}

/// Asks the model to merge every step result into the final answer.
pub struct LlmResultSynthesizer {
    generator: Arc<dyn TextGenerator>,
}

impl LlmResultSynthesizer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    fn prompt(plan: &Plan, results: &StepResults) -> String {
        let mut prompt = format!("Goal: {}\n\nStep results:\n", plan.goal);
        write_results(&mut prompt, results);
        if !plan.success_criteria.is_empty() {
            let _ = writeln!(
                prompt,
                "The answer should satisfy: {}",
                plan.success_criteria.join("; ")
            );
        }
        prompt
    }
}

#[async_trait]
impl ResultSynthesizer for LlmResultSynthesizer {
    async fn synthesize(
        &self,
        plan: &Plan,
        results: &StepResults,
        _context: &mut SharedContext,
    ) -> Result<String, StepError> {
        let generation = self
            .generator
            .generate(SYNTHESIS_INSTRUCTIONS, &Self::prompt(plan, results))
            .await
            .map_err(|e| StepError::SynthesisFailed(e.to_string()))?;
        Ok(generation.text)
    }
}
