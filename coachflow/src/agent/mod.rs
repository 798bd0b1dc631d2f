//! The seam to the language-model agents.
//!
//! An [`AgentRuntime`] is whatever actually runs a stage's agent: a hosted
//! service, a local model, or a scripted double in tests. The
//! [`AgentInvoker`] wraps one runtime call per stage attempt with a
//! timeout and turns the reply into a JSON object.

#[cfg(feature = "http")]
mod http;
mod invoker;
mod parse;

#[cfg(feature = "http")]
pub use http::HttpAgentRuntime;
pub use invoker::AgentInvoker;
pub use parse::extract_json;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::RuntimeError;

/// Everything a runtime needs to run one stage agent once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRequest {
    /// Stage id, e.g. `training-plan`.
    pub stage_id: String,
    /// Catalog code, e.g. `E5`.
    pub code: String,
    /// What the stage is expected to produce.
    pub description: String,
    /// Serialized JSON input assembled from the questionnaire and earlier
    /// validated outputs.
    pub input: String,
    /// Strict JSON Schema the output must satisfy.
    pub output_schema: Value,
}

/// What a runtime answered.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentReply {
    /// Already structured output.
    Json(Value),
    /// Free text that should contain a JSON object.
    Text(String),
}

/// Runs stage agents.
///
/// Implementations make exactly one call per request; retries belong to
/// the orchestrator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Runs the agent for `request.stage_id`.
    async fn call(&self, request: AgentRequest) -> Result<AgentReply, RuntimeError>;
}
