//! Plan → Execute → Reflect orchestrator.
//!
//! Turns a natural-language goal into a plan of dependency-gated steps,
//! executes it, has the model judge the result, and replans from the
//! feedback until the result is accepted or the attempt budget runs out.
//!
//! ```text
//! PLANNING ─▶ EXECUTING ─▶ REFLECTING ─▶ DONE
//!                 ▲            │
//!                 │            ▼
//!                 └──────  REPLANNING ──(budget spent)──▶ EXHAUSTED
//! ```
//!
//! A failed execution pass (unmet dependency or step error) skips
//! reflection and goes straight to replanning with the error message as
//! feedback. Either way the pass counts against `max_replan_attempts`.
//! Running out of attempts is not an error: the last result, or a fixed
//! fallback message, is returned. Malformed planner or reflection output,
//! provider failures and synthesizer failures abort the run.

use std::sync::Arc;
use stepwise_config::OrchestratorConfig;
use stepwise_core::context::{AGENT_NAME_KEY, CURRENT_PLAN_KEY, SharedContext, step_result_key};
use stepwise_core::error::{Error, OrchestratorError, Result};
use stepwise_telemetry::{SpanKind, SpanRef, TraceSink};
use tracing::{debug, error, info, warn};

use crate::execution::{ExecutionOutcome, SchedulingPolicy, missing_dependencies};
use crate::generator::TextGenerator;
use crate::plan::{Plan, Reflection, ReplanFeedback};
use crate::prompts;
use crate::strategy::{ResultSynthesizer, StepExecutor, StepResults};

pub const DEFAULT_MAX_REPLAN_ATTEMPTS: u32 = 3;
pub const DEFAULT_SATISFACTION_THRESHOLD: f64 = 0.8;

/// States of the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Planning,
    Executing,
    Reflecting,
    Replanning,
    Done,
    Exhausted,
}

impl std::fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Planning => write!(f, "planning"),
            Self::Executing => write!(f, "executing"),
            Self::Reflecting => write!(f, "reflecting"),
            Self::Replanning => write!(f, "replanning"),
            Self::Done => write!(f, "done"),
            Self::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// A reflection accepted the result.
    Completed,
    /// Attempts ran out without an accepted result.
    Exhausted,
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// The accepted result, the last result, or the fallback message.
    pub output: String,
    pub outcome: RunOutcome,
    /// Execution passes performed.
    pub attempts: u32,
    /// Plans generated after the initial one.
    pub replans: u32,
    /// The most recent plan.
    pub final_plan: Plan,
    /// Every reflection, in order.
    pub reflections: Vec<Reflection>,
    /// States visited, starting with `Planning`.
    pub transitions: Vec<OrchestratorState>,
    /// Trace recorded for this run, when telemetry is attached.
    pub trace_id: Option<String>,
}

/// The plan-execute-reflect control loop.
pub struct Orchestrator {
    name: String,
    generator: Arc<dyn TextGenerator>,
    executor: Arc<dyn StepExecutor>,
    synthesizer: Arc<dyn ResultSynthesizer>,
    max_replan_attempts: u32,
    satisfaction_threshold: f64,
    planner_instructions: String,
    reflection_instructions: String,
    scheduling: SchedulingPolicy,
    telemetry: Option<Arc<dyn TraceSink>>,
}

impl Orchestrator {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        executor: Arc<dyn StepExecutor>,
        synthesizer: Arc<dyn ResultSynthesizer>,
    ) -> Self {
        Self {
            name: "stepwise".into(),
            generator,
            executor,
            synthesizer,
            max_replan_attempts: DEFAULT_MAX_REPLAN_ATTEMPTS,
            satisfaction_threshold: DEFAULT_SATISFACTION_THRESHOLD,
            planner_instructions: prompts::DEFAULT_PLANNER_INSTRUCTIONS.into(),
            reflection_instructions: prompts::DEFAULT_REFLECTION_INSTRUCTIONS.into(),
            scheduling: SchedulingPolicy::default(),
            telemetry: None,
        }
    }

    /// Name recorded under `agent_name` and used as the trace label.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Attach a trace sink.
    pub fn with_telemetry(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.telemetry = Some(sink);
        self
    }

    pub fn with_planner_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.set_planner_instructions(instructions);
        self
    }

    pub fn with_reflection_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.set_reflection_instructions(instructions);
        self
    }

    pub fn with_scheduling(mut self, policy: SchedulingPolicy) -> Self {
        self.scheduling = policy;
        self
    }

    // ── Configuration ─────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_replan_attempts(&self) -> u32 {
        self.max_replan_attempts
    }

    pub fn satisfaction_threshold(&self) -> f64 {
        self.satisfaction_threshold
    }

    pub fn planner_instructions(&self) -> &str {
        &self.planner_instructions
    }

    pub fn reflection_instructions(&self) -> &str {
        &self.reflection_instructions
    }

    /// Set the number of execution passes per run. Must be at least 1.
    pub fn set_max_replan_attempts(
        &mut self,
        attempts: u32,
    ) -> std::result::Result<(), OrchestratorError> {
        check_attempts(attempts)?;
        self.max_replan_attempts = attempts;
        Ok(())
    }

    /// Set the score at which a result is accepted. Must lie in `[0, 1]`;
    /// a rejected value leaves the current threshold in place.
    pub fn set_satisfaction_threshold(
        &mut self,
        threshold: f64,
    ) -> std::result::Result<(), OrchestratorError> {
        check_threshold(threshold)?;
        self.satisfaction_threshold = threshold;
        Ok(())
    }

    /// Set both limits at once. Nothing changes unless both are valid.
    pub fn configure(
        &mut self,
        max_replan_attempts: u32,
        satisfaction_threshold: f64,
    ) -> std::result::Result<(), OrchestratorError> {
        check_attempts(max_replan_attempts)?;
        check_threshold(satisfaction_threshold)?;
        self.max_replan_attempts = max_replan_attempts;
        self.satisfaction_threshold = satisfaction_threshold;
        Ok(())
    }

    pub fn set_planner_instructions(&mut self, instructions: impl Into<String>) {
        self.planner_instructions = instructions.into();
    }

    pub fn set_reflection_instructions(&mut self, instructions: impl Into<String>) {
        self.reflection_instructions = instructions.into();
    }

    /// Apply the `[orchestrator]` config section.
    pub fn apply_config(
        &mut self,
        config: &OrchestratorConfig,
    ) -> std::result::Result<(), OrchestratorError> {
        self.configure(config.max_replan_attempts, config.satisfaction_threshold)?;
        self.name = config.agent_name.clone();
        if let Some(instructions) = &config.planner_instructions {
            self.set_planner_instructions(instructions.clone());
        }
        if let Some(instructions) = &config.reflection_instructions {
            self.set_reflection_instructions(instructions.clone());
        }
        Ok(())
    }

    // ── Entry points ──────────────────────────────────────────────────

    /// Drive `input` to a terminal state and return the final text.
    pub async fn run(&self, input: &str, context: &mut SharedContext) -> Result<String> {
        self.run_detailed(input, context).await.map(|report| report.output)
    }

    /// Like [`run`](Self::run), but return the full [`RunReport`].
    pub async fn run_detailed(&self, input: &str, context: &mut SharedContext) -> Result<RunReport> {
        context.set(AGENT_NAME_KEY, self.name.clone());
        let root = self
            .telemetry
            .as_ref()
            .map(|t| t.start_trace(&context.session_id, SpanKind::Run, &self.name));

        info!(
            agent = %self.name,
            max_attempts = self.max_replan_attempts,
            threshold = self.satisfaction_threshold,
            "orchestrator run starting"
        );

        match self.drive(input, context, root.as_ref()).await {
            Ok(mut report) => {
                if let (Some(t), Some(root)) = (&self.telemetry, &root) {
                    t.annotate(root, "attempts", report.attempts.into());
                    t.annotate(root, "outcome", format!("{:?}", report.outcome).into());
                    t.end_span(root);
                }
                report.trace_id = root.map(|r| r.trace_id);
                Ok(report)
            }
            Err(e) => {
                error!(agent = %self.name, error = %e, "orchestrator run failed");
                self.fail_span(root.as_ref(), &e.to_string());
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        input: &str,
        context: &mut SharedContext,
        root: Option<&SpanRef>,
    ) -> Result<RunReport> {
        let mut transitions = vec![OrchestratorState::Planning];
        let mut reflections = Vec::new();
        let mut replans = 0u32;
        let mut last_result: Option<String> = None;

        let mut plan = self.plan_traced(input, context, root).await?;

        for attempt in 1..=self.max_replan_attempts {
            transitions.push(OrchestratorState::Executing);
            debug!(attempt, steps = plan.steps.len(), "execution pass");
            let outcome = self.execute_traced(&mut plan, context, root, attempt).await?;

            let (previous, feedback) = match outcome {
                ExecutionOutcome::Completed(result) => {
                    transitions.push(OrchestratorState::Reflecting);
                    let reflection = self.reflect_traced(input, &result, &plan, root).await?;
                    reflections.push(reflection.clone());

                    if reflection.accepts(self.satisfaction_threshold) {
                        info!(
                            attempt,
                            score = reflection.score,
                            satisfactory = reflection.satisfactory,
                            "result accepted"
                        );
                        transitions.push(OrchestratorState::Done);
                        return Ok(RunReport {
                            output: result,
                            outcome: RunOutcome::Completed,
                            attempts: attempt,
                            replans,
                            final_plan: plan,
                            reflections,
                            transitions,
                            trace_id: None,
                        });
                    }

                    info!(attempt, score = reflection.score, "result rejected, replanning");
                    last_result = Some(result.clone());
                    (Some(result), ReplanFeedback::Reflection(reflection))
                }
                ExecutionOutcome::DependencyGap { ref step, ref missing } => {
                    warn!(attempt, step_id = step.id, ?missing, "dependency gap, replanning");
                    let message = outcome.error_message().unwrap_or_default();
                    (None, ReplanFeedback::ExecutionError(message))
                }
                ExecutionOutcome::StepFailure { ref step, ref cause, .. } => {
                    warn!(attempt, step_id = step.id, error = %cause, "step failed, replanning");
                    let message = outcome.error_message().unwrap_or_default();
                    (None, ReplanFeedback::ExecutionError(message))
                }
            };

            transitions.push(OrchestratorState::Replanning);
            plan = self
                .replan_traced(input, previous.as_deref(), &feedback, context, root)
                .await?;
            replans += 1;
        }

        warn!(
            attempts = self.max_replan_attempts,
            has_result = last_result.is_some(),
            "replan attempts exhausted"
        );
        transitions.push(OrchestratorState::Exhausted);
        Ok(RunReport {
            output: last_result.unwrap_or_else(|| fallback_message(self.max_replan_attempts)),
            outcome: RunOutcome::Exhausted,
            attempts: self.max_replan_attempts,
            replans,
            final_plan: plan,
            reflections,
            transitions,
            trace_id: None,
        })
    }

    // ── Phases ────────────────────────────────────────────────────────

    /// Ask the planner for an initial plan and publish it as `current_plan`.
    pub async fn generate_plan(&self, input: &str, context: &mut SharedContext) -> Result<Plan> {
        self.plan_traced(input, context, None).await
    }

    /// Run one execution pass over `plan`.
    ///
    /// Every pass starts from an empty result set, so steps completed in an
    /// earlier pass run again. Each result is recorded on its step and
    /// published under `step_<id>_result`, and `current_plan` is refreshed
    /// after every completed step. Dependency gaps and step errors
    /// come back as non-completed outcomes; only a synthesizer failure is
    /// an `Err`.
    pub async fn execute_plan(
        &self,
        plan: &mut Plan,
        context: &mut SharedContext,
    ) -> Result<ExecutionOutcome> {
        self.run_steps(plan, context, None).await
    }

    /// Have the model judge `result` against the goal and `plan`.
    pub async fn reflect(&self, input: &str, result: &str, plan: &Plan) -> Result<Reflection> {
        self.reflect_traced(input, result, plan, None).await
    }

    /// Ask the planner for a new plan given feedback on the previous
    /// attempt, and publish it as `current_plan`.
    pub async fn replan(
        &self,
        input: &str,
        previous_result: Option<&str>,
        feedback: &ReplanFeedback,
        context: &mut SharedContext,
    ) -> Result<Plan> {
        self.replan_traced(input, previous_result, feedback, context, None)
            .await
    }

    async fn plan_traced(
        &self,
        input: &str,
        context: &mut SharedContext,
        parent: Option<&SpanRef>,
    ) -> Result<Plan> {
        let span = self.child_span(parent, SpanKind::Planning, "plan");
        let result = async {
            let raw = self
                .call_model(
                    &self.planner_instructions,
                    &prompts::planning_prompt(input),
                    span.as_ref(),
                    "planning",
                )
                .await?;
            Ok::<_, Error>(Plan::parse(&raw, input)?)
        }
        .await;
        self.close_span(span.as_ref(), &result);

        let plan = result?;
        info!(steps = plan.steps.len(), goal = %plan.goal, "plan generated");
        context.set(CURRENT_PLAN_KEY, plan.to_value());
        Ok(plan)
    }

    async fn replan_traced(
        &self,
        input: &str,
        previous_result: Option<&str>,
        feedback: &ReplanFeedback,
        context: &mut SharedContext,
        parent: Option<&SpanRef>,
    ) -> Result<Plan> {
        let span = self.child_span(parent, SpanKind::Replanning, "replan");
        let feedback_text = feedback.text();
        debug!(feedback = %feedback_text, "replanning");

        let result = async {
            let raw = self
                .call_model(
                    &self.planner_instructions,
                    &prompts::replanning_prompt(input, previous_result, &feedback_text),
                    span.as_ref(),
                    "replanning",
                )
                .await?;
            Ok::<_, Error>(Plan::parse(&raw, input)?)
        }
        .await;
        self.close_span(span.as_ref(), &result);

        let plan = result?;
        info!(steps = plan.steps.len(), "new plan generated");
        context.set(CURRENT_PLAN_KEY, plan.to_value());
        Ok(plan)
    }

    async fn reflect_traced(
        &self,
        input: &str,
        result: &str,
        plan: &Plan,
        parent: Option<&SpanRef>,
    ) -> Result<Reflection> {
        let span = self.child_span(parent, SpanKind::Reflection, "reflect");
        let reflection = async {
            let raw = self
                .call_model(
                    &self.reflection_instructions,
                    &prompts::reflection_prompt(input, &plan.render(), result),
                    span.as_ref(),
                    "reflection",
                )
                .await?;
            Ok::<_, Error>(Reflection::parse(&raw)?)
        }
        .await;

        if let (Some(t), Some(span), Ok(r)) = (&self.telemetry, &span, &reflection) {
            t.annotate(span, "score", r.score.into());
            t.annotate(span, "satisfactory", r.satisfactory.into());
        }
        self.close_span(span.as_ref(), &reflection);
        reflection
    }

    async fn execute_traced(
        &self,
        plan: &mut Plan,
        context: &mut SharedContext,
        parent: Option<&SpanRef>,
        attempt: u32,
    ) -> Result<ExecutionOutcome> {
        let span = self.child_span(parent, SpanKind::Execution, &format!("attempt-{attempt}"));
        let outcome = self.run_steps(plan, context, span.as_ref()).await;
        match &outcome {
            Ok(ExecutionOutcome::Completed(_)) => self.end_span(span.as_ref()),
            Ok(failed) => {
                self.fail_span(span.as_ref(), &failed.error_message().unwrap_or_default())
            }
            Err(e) => self.fail_span(span.as_ref(), &e.to_string()),
        }
        outcome
    }

    async fn run_steps(
        &self,
        plan: &mut Plan,
        context: &mut SharedContext,
        parent: Option<&SpanRef>,
    ) -> Result<ExecutionOutcome> {
        for step in &mut plan.steps {
            step.reset();
        }
        context.set(CURRENT_PLAN_KEY, plan.to_value());
        let mut results = StepResults::new();

        for index in self.scheduling.order(plan) {
            let step = &plan.steps[index];
            let missing = missing_dependencies(step, &results);
            if !missing.is_empty() {
                return Ok(ExecutionOutcome::DependencyGap {
                    step: step.clone(),
                    missing,
                });
            }

            let span = self.child_span(parent, SpanKind::Step, &format!("step-{}", step.id));
            debug!(step_id = step.id, action = %step.action, "executing step");
            let executed = self.executor.execute_step(step, &results, context).await;

            match executed {
                Ok(output) => {
                    self.end_span(span.as_ref());
                    let id = step.id;
                    context.set(step_result_key(id), output.clone());
                    results.insert(id, output.clone());
                    plan.steps[index].complete(output);
                    context.set(CURRENT_PLAN_KEY, plan.to_value());
                }
                Err(cause) => {
                    self.fail_span(span.as_ref(), &cause.to_string());
                    return Ok(ExecutionOutcome::step_failure(step, cause));
                }
            }
        }

        let result = self.synthesizer.synthesize(plan, &results, context).await?;
        debug!(steps = results.len(), chars = result.len(), "results synthesized");
        Ok(ExecutionOutcome::Completed(result))
    }

    // ── Model calls and spans ─────────────────────────────────────────

    async fn call_model(
        &self,
        system: &str,
        user: &str,
        parent: Option<&SpanRef>,
        phase: &str,
    ) -> Result<String> {
        let span = self.child_span(parent, SpanKind::LlmCall, phase);
        match self.generator.generate(system, user).await {
            Ok(generation) => {
                if let (Some(t), Some(span)) = (&self.telemetry, &span) {
                    if let Some(usage) = generation.usage {
                        t.record_tokens(span, usage.prompt_tokens, usage.completion_tokens);
                    }
                    if let Some(model) = &generation.model {
                        t.annotate(span, "model", model.as_str().into());
                    }
                    t.end_span(span);
                }
                Ok(generation.text)
            }
            Err(e) => {
                self.fail_span(span.as_ref(), &e.to_string());
                Err(e.into())
            }
        }
    }

    fn child_span(&self, parent: Option<&SpanRef>, kind: SpanKind, label: &str) -> Option<SpanRef> {
        match (&self.telemetry, parent) {
            (Some(t), Some(parent)) => Some(t.start_span(parent, kind, label)),
            _ => None,
        }
    }

    fn end_span(&self, span: Option<&SpanRef>) {
        if let (Some(t), Some(span)) = (&self.telemetry, span) {
            t.end_span(span);
        }
    }

    fn fail_span(&self, span: Option<&SpanRef>, error: &str) {
        if let (Some(t), Some(span)) = (&self.telemetry, span) {
            t.fail_span(span, error);
        }
    }

    fn close_span<T>(&self, span: Option<&SpanRef>, result: &Result<T>) {
        match result {
            Ok(_) => self.end_span(span),
            Err(e) => self.fail_span(span, &e.to_string()),
        }
    }
}

fn check_attempts(attempts: u32) -> std::result::Result<(), OrchestratorError> {
    if attempts == 0 {
        return Err(OrchestratorError::Configuration(
            "max_replan_attempts must be at least 1".into(),
        ));
    }
    Ok(())
}

fn check_threshold(threshold: f64) -> std::result::Result<(), OrchestratorError> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(OrchestratorError::Configuration(format!(
            "satisfaction_threshold must be between 0 and 1, got {threshold}"
        )));
    }
    Ok(())
}

/// Returned when attempts run out before any pass produced a result.
pub fn fallback_message(attempts: u32) -> String {
    format!("Unable to complete the task after {attempts} attempts.")
}
