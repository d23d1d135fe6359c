//! Error types for the Stepwise domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Stepwise operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Orchestrator errors ---
    #[error("Orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),

    // --- Step errors ---
    #[error("Step error: {0}")]
    Step(#[from] StepError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// The phase of the plan-execute-reflect loop that produced model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputPhase {
    Planning,
    Reflection,
}

impl std::fmt::Display for OutputPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Planning => write!(f, "plan"),
            Self::Reflection => write!(f, "reflection"),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum OrchestratorError {
    /// The model's answer could not be parsed into the expected JSON shape.
    #[error("Malformed {phase} output: {reason}")]
    MalformedOutput { phase: OutputPhase, reason: String },

    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

/// Failure raised by a step executor or result synthesizer.
#[derive(Debug, Clone, Error)]
pub enum StepError {
    #[error("Step {step_id} failed: {reason}")]
    Failed { step_id: i64, reason: String },

    #[error("Result synthesis failed: {0}")]
    SynthesisFailed(String),

    #[error("{0}")]
    Provider(#[from] ProviderError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn malformed_output_names_phase() {
        let err = Error::Orchestrator(OrchestratorError::MalformedOutput {
            phase: OutputPhase::Reflection,
            reason: "missing field `score`".into(),
        });
        assert!(err.to_string().contains("reflection"));
        assert!(err.to_string().contains("score"));
    }

    #[test]
    fn step_error_wraps_provider_error() {
        let err: StepError = ProviderError::Network("connection reset".into()).into();
        assert_eq!(err.to_string(), "Network error: connection reset");
    }
}
