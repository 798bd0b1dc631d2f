//! Error types for the coachflow pipeline.
//!
//! The taxonomy separates what can go wrong while building the stage
//! catalog, while calling the agent runtime, and while driving a run.
//! Only [`PipelineError`] crosses the ingress boundary.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// The crate-wide error type.
#[derive(Debug, Error)]
pub enum CoachflowError {
    /// A pipeline run failed, was cancelled, or timed out.
    #[error("{0}")]
    Pipeline(#[from] PipelineError),

    /// The stage registry could not be built.
    #[error("{0}")]
    Registry(#[from] RegistryError),

    /// A stage id was not found.
    #[error("{0}")]
    UnknownStage(#[from] UnknownStageError),

    /// A single agent call failed.
    #[error("{0}")]
    Invocation(#[from] AgentInvocationError),

    /// Configuration could not be loaded.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Classification of a failed or cancelled run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Output did not match the declared shape of its stage.
    StructuralValidation,
    /// Output matched its shape but broke a domain rule.
    SemanticValidation,
    /// The agent runtime call errored or returned something unparseable.
    InvocationFailure,
    /// The agent runtime call did not finish within its timeout.
    Timeout,
    /// The caller cancelled the run.
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StructuralValidation => write!(f, "structural_validation"),
            Self::SemanticValidation => write!(f, "semantic_validation"),
            Self::InvocationFailure => write!(f, "invocation_failure"),
            Self::Timeout => write!(f, "timeout"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl ErrorKind {
    /// Returns true for the two validation kinds.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::StructuralValidation | Self::SemanticValidation)
    }

    /// Returns true if a stage may be re-invoked after this kind of failure.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

/// Terminal error of a pipeline run.
///
/// Carries enough detail for the calling service to answer with a
/// meaningful 5xx body. Messages never contain raw agent-runtime output.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Pipeline {kind} at stage '{failed_stage_id}': {}", messages.join("; "))]
pub struct PipelineError {
    /// The stage that was executing when the run stopped.
    pub failed_stage_id: String,
    /// What went wrong.
    pub kind: ErrorKind,
    /// Ordered, human-readable details.
    pub messages: Vec<String>,
}

impl PipelineError {
    /// Creates a new pipeline error.
    #[must_use]
    pub fn new(
        failed_stage_id: impl Into<String>,
        kind: ErrorKind,
        messages: Vec<String>,
    ) -> Self {
        Self {
            failed_stage_id: failed_stage_id.into(),
            kind,
            messages,
        }
    }

    /// Creates a cancellation error for the given stage.
    #[must_use]
    pub fn cancelled(failed_stage_id: impl Into<String>, reason: Option<String>) -> Self {
        let reason = reason.unwrap_or_else(|| "cancelled by caller".to_string());
        Self::new(failed_stage_id, ErrorKind::Cancelled, vec![reason])
    }

    /// Returns true if the run was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }

    /// Converts to the JSON body the calling service returns.
    #[must_use]
    pub fn to_response_body(&self) -> serde_json::Value {
        serde_json::json!({
            "error": "plan_generation_failed",
            "failed_stage_id": self.failed_stage_id,
            "kind": self.kind,
            "messages": self.messages,
        })
    }
}

/// Error raised when a stage id is not registered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown stage: '{stage_id}'")]
pub struct UnknownStageError {
    /// The id that was looked up.
    pub stage_id: String,
}

impl UnknownStageError {
    /// Creates a new unknown stage error.
    #[must_use]
    pub fn new(stage_id: impl Into<String>) -> Self {
        Self {
            stage_id: stage_id.into(),
        }
    }
}

/// Errors raised while building a stage registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The registry has no stages.
    #[error("Stage registry is empty")]
    Empty,

    /// Two stages share an id.
    #[error("Duplicate stage id: '{stage_id}'")]
    DuplicateStage {
        /// The repeated id.
        stage_id: String,
    },

    /// Two stages share a catalog code.
    #[error("Duplicate stage code: '{code}'")]
    DuplicateCode {
        /// The repeated code.
        code: String,
    },

    /// A stage reads a stage that does not exist.
    #[error("Stage '{stage_id}' reads unknown stage '{reads}'")]
    UnknownReference {
        /// The reading stage.
        stage_id: String,
        /// The missing stage.
        reads: String,
    },

    /// A stage reads itself or a stage that runs after it.
    #[error("Stage '{stage_id}' reads '{reads}', which does not run before it")]
    ForwardReference {
        /// The reading stage.
        stage_id: String,
        /// The stage at the same or a later position.
        reads: String,
    },
}

impl RegistryError {
    /// Stable error code for diagnostics.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Empty => "REGISTRY-001-EMPTY",
            Self::DuplicateStage { .. } => "REGISTRY-002-DUPLICATE_ID",
            Self::DuplicateCode { .. } => "REGISTRY-002-DUPLICATE_CODE",
            Self::UnknownReference { .. } => "REGISTRY-003-MISSING_READ",
            Self::ForwardReference { .. } => "REGISTRY-004-FORWARD_READ",
        }
    }
}

/// Errors surfaced by an [`AgentRuntime`](crate::agent::AgentRuntime) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// Transport-level failure (connection refused, reset, DNS...).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The provider answered with an error status.
    #[error("Provider error (status {status}): {message}")]
    Provider {
        /// HTTP-like status code.
        status: u16,
        /// Provider message.
        message: String,
    },

    /// The provider answered, but the body could not be read as a reply.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Anything else.
    #[error("Runtime error: {0}")]
    Other(String),
}

/// Errors from a single agent invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgentInvocationError {
    /// The runtime call itself failed.
    #[error("Agent runtime failed for stage '{stage_id}': {source}")]
    Runtime {
        /// The invoked stage.
        stage_id: String,
        /// The underlying runtime error.
        #[source]
        source: RuntimeError,
    },

    /// The runtime answered, but the reply could not be read as a JSON object.
    #[error("Malformed agent reply for stage '{stage_id}': {reason}")]
    Malformed {
        /// The invoked stage.
        stage_id: String,
        /// Why parsing failed.
        reason: String,
    },

    /// The call exceeded its timeout.
    #[error("Agent call for stage '{stage_id}' timed out after {}s", timeout.as_secs_f64())]
    Timeout {
        /// The invoked stage.
        stage_id: String,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The input could not be serialized for the runtime.
    #[error("Could not serialize input for stage '{stage_id}': {reason}")]
    Serialization {
        /// The invoked stage.
        stage_id: String,
        /// Serializer message.
        reason: String,
    },
}

impl AgentInvocationError {
    /// The stage the call was made for.
    #[must_use]
    pub fn stage_id(&self) -> &str {
        match self {
            Self::Runtime { stage_id, .. }
            | Self::Malformed { stage_id, .. }
            | Self::Timeout { stage_id, .. }
            | Self::Serialization { stage_id, .. } => stage_id,
        }
    }

    /// Maps to the run-level error kind.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout { .. } => ErrorKind::Timeout,
            _ => ErrorKind::InvocationFailure,
        }
    }

    /// A short description that is safe to return to callers.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Runtime { .. } => "agent runtime call failed".to_string(),
            Self::Malformed { .. } => "agent returned a non-parseable response".to_string(),
            Self::Timeout { timeout, .. } => {
                format!("agent call timed out after {}s", timeout.as_secs())
            }
            Self::Serialization { .. } => "stage input could not be serialized".to_string(),
        }
    }

    /// Converts to a dictionary representation for event payloads.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("stage_id".to_string(), serde_json::json!(self.stage_id()));
        map.insert("kind".to_string(), serde_json::json!(self.kind()));
        map.insert("message".to_string(), serde_json::json!(self.public_message()));
        map
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// An environment variable held an unusable value.
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue {
        /// The variable name.
        key: String,
        /// The offending value.
        value: String,
    },

    /// The configuration document could not be parsed.
    #[error("Invalid configuration: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_error_display() {
        let err = PipelineError::new(
            "training-plan",
            ErrorKind::StructuralValidation,
            vec!["training_plan.weeks: expected 4".to_string()],
        );

        let text = err.to_string();
        assert!(text.contains("structural_validation"));
        assert!(text.contains("training-plan"));
        assert!(text.contains("expected 4"));
    }

    #[test]
    fn test_pipeline_error_response_body() {
        let err = PipelineError::cancelled("objectives", None);
        let body = err.to_response_body();

        assert_eq!(body["failed_stage_id"], "objectives");
        assert_eq!(body["kind"], "cancelled");
        assert_eq!(body["messages"][0], "cancelled by caller");
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_error_kind_classification() {
        assert!(ErrorKind::StructuralValidation.is_validation());
        assert!(ErrorKind::SemanticValidation.is_validation());
        assert!(!ErrorKind::Timeout.is_validation());
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(!ErrorKind::Cancelled.is_retryable());
    }

    #[test]
    fn test_invocation_error_kind() {
        let timeout = AgentInvocationError::Timeout {
            stage_id: "e1".to_string(),
            timeout: Duration::from_secs(90),
        };
        assert_eq!(timeout.kind(), ErrorKind::Timeout);
        assert_eq!(timeout.public_message(), "agent call timed out after 90s");

        let runtime = AgentInvocationError::Runtime {
            stage_id: "e1".to_string(),
            source: RuntimeError::Provider {
                status: 502,
                message: "upstream secret detail".to_string(),
            },
        };
        assert_eq!(runtime.kind(), ErrorKind::InvocationFailure);
        assert!(!runtime.public_message().contains("secret"));
        assert_eq!(runtime.to_dict().get("stage_id").unwrap(), "e1");
    }

    #[test]
    fn test_registry_error_codes() {
        let err = RegistryError::ForwardReference {
            stage_id: "a".to_string(),
            reads: "b".to_string(),
        };
        assert_eq!(err.code(), "REGISTRY-004-FORWARD_READ");
        assert!(err.to_string().contains("does not run before it"));
    }
}
