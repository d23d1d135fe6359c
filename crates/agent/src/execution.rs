//! Execution-pass vocabulary: step ordering and the outcome of a pass.

use stepwise_core::error::StepError;

use crate::plan::{Plan, PlanStep};
use crate::strategy::StepResults;

/// How steps of a plan are ordered for execution.
///
/// Dependencies never influence the order; they only gate whether a step
/// may run once its turn comes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SchedulingPolicy {
    /// Strictly ascending step id, one step at a time. Steps sharing an id
    /// keep the planner's order. A step depending on a higher id can never
    /// run and aborts the pass.
    #[default]
    AscendingId,
}

impl SchedulingPolicy {
    /// Indices into `plan.steps` in execution order.
    pub fn order(&self, plan: &Plan) -> Vec<usize> {
        match self {
            Self::AscendingId => {
                let mut order: Vec<usize> = (0..plan.steps.len()).collect();
                order.sort_by_key(|&i| plan.steps[i].id);
                order
            }
        }
    }
}

/// Dependency ids of `step` that have no result yet, in declaration order.
pub fn missing_dependencies(step: &PlanStep, results: &StepResults) -> Vec<i64> {
    step.dependencies
        .iter()
        .copied()
        .filter(|id| !results.contains_key(id))
        .collect()
}

/// How one execution pass ended.
#[derive(Debug)]
pub enum ExecutionOutcome {
    /// Every step ran; carries the synthesized result.
    Completed(String),

    /// A step's prerequisites were never produced.
    DependencyGap { step: PlanStep, missing: Vec<i64> },

    /// The step executor failed.
    StepFailure {
        step: PlanStep,
        message: String,
        cause: StepError,
    },
}

impl ExecutionOutcome {
    pub fn step_failure(step: &PlanStep, cause: StepError) -> Self {
        Self::StepFailure {
            step: step.clone(),
            message: cause.to_string(),
            cause,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Text handed to the planner when the pass did not complete.
    pub fn error_message(&self) -> Option<String> {
        match self {
            Self::Completed(_) => None,
            Self::DependencyGap { step, missing } => {
                let ids: Vec<String> = missing.iter().map(i64::to_string).collect();
                Some(format!(
                    "Step {} has unmet dependencies: {}",
                    step.id,
                    ids.join(", ")
                ))
            }
            // `StepError::Failed` already names its step.
            Self::StepFailure {
                message,
                cause: StepError::Failed { .. },
                ..
            } => Some(message.clone()),
            Self::StepFailure { step, message, .. } => {
                Some(format!("Step {} failed: {message}", step.id))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascending_order_ignores_dependencies() {
        let plan = Plan::new(
            "g",
            vec![
                PlanStep::new(10, "c"),
                PlanStep::new(2, "b").depends_on([10]),
                PlanStep::new(1, "a"),
            ],
        );
        let ids: Vec<i64> = SchedulingPolicy::AscendingId
            .order(&plan)
            .into_iter()
            .map(|i| plan.steps[i].id)
            .collect();
        assert_eq!(ids, vec![1, 2, 10]);
    }

    #[test]
    fn duplicate_ids_keep_planner_order() {
        let plan = Plan::new(
            "g",
            vec![PlanStep::new(2, "first"), PlanStep::new(1, "x"), PlanStep::new(2, "second")],
        );
        let actions: Vec<&str> = SchedulingPolicy::default()
            .order(&plan)
            .into_iter()
            .map(|i| plan.steps[i].action.as_str())
            .collect();
        assert_eq!(actions, vec!["x", "first", "second"]);
    }

    #[test]
    fn missing_dependencies_reports_unproduced_ids() {
        let mut results = StepResults::new();
        results.insert(1, "a".into());
        let step = PlanStep::new(3, "c").depends_on([1, 2, 7]);
        assert_eq!(missing_dependencies(&step, &results), vec![2, 7]);
        assert!(missing_dependencies(&PlanStep::new(4, "d").depends_on([1]), &results).is_empty());
    }

    #[test]
    fn error_messages() {
        let gap = ExecutionOutcome::DependencyGap {
            step: PlanStep::new(2, "b"),
            missing: vec![5, 6],
        };
        assert_eq!(
            gap.error_message().as_deref(),
            Some("Step 2 has unmet dependencies: 5, 6")
        );

        let failure = ExecutionOutcome::step_failure(
            &PlanStep::new(1, "a"),
            StepError::Provider(stepwise_core::error::ProviderError::Network("timeout".into())),
        );
        assert_eq!(
            failure.error_message().as_deref(),
            Some("Step 1 failed: Network error: timeout")
        );

        assert!(ExecutionOutcome::Completed("ok".into()).error_message().is_none());
    }

    #[test]
    fn failed_cause_is_not_prefixed_twice() {
        let failure = ExecutionOutcome::step_failure(
            &PlanStep::new(4, "deploy"),
            StepError::Failed {
                step_id: 4,
                reason: "disk full".into(),
            },
        );
        assert_eq!(
            failure.error_message().as_deref(),
            Some("Step 4 failed: disk full")
        );
    }
}
