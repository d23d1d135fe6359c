//! Shared test helpers for orchestrator tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use stepwise_core::error::ProviderError;
use stepwise_core::provider::Usage;

use crate::generator::{Generation, TextGenerator};

/// A generator that replays a queue of scripted answers.
///
/// Every call records its `(system, user)` prompt pair. Panics if more
/// calls are made than answers were scripted.
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<Generation, ProviderError>>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedGenerator {
    pub fn new(responses: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            responses: Mutex::new(
                responses
                    .into_iter()
                    .map(|text| {
                        Ok(Generation {
                            text: text.into(),
                            usage: Some(Usage {
                                prompt_tokens: 10,
                                completion_tokens: 5,
                                total_tokens: 15,
                            }),
                            model: Some("mock-model".into()),
                        })
                    })
                    .collect(),
            ),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A generator whose first call fails with `error`.
    pub fn failing(error: ProviderError) -> Self {
        let generator = Self::new(Vec::<String>::new());
        generator.responses.lock().unwrap().push_back(Err(error));
        generator
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// User prompt of the `n`-th call.
    pub fn prompt(&self, n: usize) -> Option<String> {
        self.calls.lock().unwrap().get(n).map(|(_, user)| user.clone())
    }

    /// System instruction of the `n`-th call.
    pub fn system(&self, n: usize) -> Option<String> {
        self.calls.lock().unwrap().get(n).map(|(system, _)| system.clone())
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, system: &str, user: &str) -> Result<Generation, ProviderError> {
        let mut calls = self.calls.lock().unwrap();
        calls.push((system.to_string(), user.to_string()));
        let call = calls.len();
        drop(calls);

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("ScriptedGenerator: no more responses (call #{call})"))
    }
}

/// Planner output for a plan whose steps have the given `(id, deps)`.
pub fn plan_json(goal: &str, steps: &[(i64, &[i64])]) -> String {
    let steps: Vec<serde_json::Value> = steps
        .iter()
        .map(|(id, deps)| {
            serde_json::json!({
                "id": id,
                "action": format!("do step {id}"),
                "dependencies": deps,
                "tools": [],
            })
        })
        .collect();
    serde_json::json!({
        "goal": goal,
        "steps": steps,
        "success_criteria": ["it works"],
    })
    .to_string()
}

/// Reflection output with the given verdict and score.
pub fn reflection_json(satisfactory: bool, score: f64) -> String {
    serde_json::json!({
        "satisfactory": satisfactory,
        "score": score,
        "strengths": ["clear structure"],
        "weaknesses": ["missing validation"],
        "suggestions": ["validate the email field"],
    })
    .to_string()
}
