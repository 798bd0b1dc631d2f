//! Outcome of validating one stage attempt.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::contracts::ValidationOutcome;
use crate::errors::ErrorKind;

/// Validated (or rejected) output of a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    /// The stage that produced the output.
    pub stage_id: String,
    /// The object the agent returned, before validation.
    pub raw_output: Value,
    /// The accepted value, possibly annotated by domain rules.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validated_output: Option<Value>,
    /// Whether the output satisfied the contract.
    pub valid: bool,
    /// Rejection kind, when invalid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Field-level violations as `path: message`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    /// Non-blocking findings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Attempts the stage needed, including this one.
    pub attempts: u32,
}

impl StageResult {
    /// Builds a result from a validation outcome.
    #[must_use]
    pub fn from_outcome(
        stage_id: impl Into<String>,
        raw_output: Value,
        outcome: ValidationOutcome,
        attempts: u32,
    ) -> Self {
        let stage_id = stage_id.into();
        match outcome {
            ValidationOutcome::Accepted { value, warnings } => Self {
                stage_id,
                raw_output,
                validated_output: Some(value),
                valid: true,
                error_kind: None,
                errors: Vec::new(),
                warnings,
                attempts,
            },
            rejected @ ValidationOutcome::Rejected { .. } => Self {
                stage_id,
                raw_output,
                validated_output: None,
                valid: false,
                error_kind: rejected.kind(),
                errors: rejected.messages(),
                warnings: Vec::new(),
                attempts,
            },
        }
    }

    /// The validated output, if valid.
    #[must_use]
    pub fn output(&self) -> Option<&Value> {
        self.validated_output.as_ref()
    }
}
