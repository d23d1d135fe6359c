//! # Stepwise Core
//!
//! Domain types, traits, and error definitions for the Stepwise
//! plan-execute-reflect runtime. This crate has **no framework
//! dependencies**; it defines the model every other crate builds on.
//!
//! ## Design Philosophy
//!
//! External capabilities (LLM backends, the shared context store) are
//! defined here. Implementations live in their respective crates, which
//! keeps the dependency graph pointing inward and makes every capability
//! easy to stub in tests.

pub mod context;
pub mod error;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use context::{SharedContext, AGENT_NAME_KEY, CURRENT_PLAN_KEY, step_result_key};
pub use error::{Error, OrchestratorError, OutputPhase, ProviderError, Result, StepError};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage};
