//! Single-shot agent invocation with timeout.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::parse::extract_json;
use super::{AgentReply, AgentRequest, AgentRuntime};
use crate::contracts::StageDefinition;
use crate::errors::{AgentInvocationError, RuntimeError};

/// Calls a stage's agent exactly once and returns a JSON object.
///
/// The invoker never retries and never validates; both are the
/// orchestrator's job.
#[derive(Clone)]
pub struct AgentInvoker {
    runtime: Arc<dyn AgentRuntime>,
}

impl AgentInvoker {
    /// Creates an invoker over `runtime`.
    #[must_use]
    pub fn new(runtime: Arc<dyn AgentRuntime>) -> Self {
        Self { runtime }
    }

    /// Runs `stage` on `input`, giving up after `timeout`.
    pub async fn invoke(
        &self,
        stage: &StageDefinition,
        input: &Value,
        timeout: Duration,
    ) -> Result<Value, AgentInvocationError> {
        let payload =
            serde_json::to_string(input).map_err(|e| AgentInvocationError::Serialization {
                stage_id: stage.id.clone(),
                reason: e.to_string(),
            })?;

        let request = AgentRequest {
            stage_id: stage.id.clone(),
            code: stage.code.clone(),
            description: stage.description.clone(),
            input: payload,
            output_schema: stage.output_schema().clone(),
        };

        let started = Instant::now();
        let reply = match tokio::time::timeout(timeout, self.runtime.call(request)).await {
            Err(_) => {
                return Err(AgentInvocationError::Timeout {
                    stage_id: stage.id.clone(),
                    timeout,
                })
            }
            Ok(Err(RuntimeError::Malformed(reason))) => {
                return Err(AgentInvocationError::Malformed {
                    stage_id: stage.id.clone(),
                    reason,
                })
            }
            Ok(Err(source)) => {
                return Err(AgentInvocationError::Runtime {
                    stage_id: stage.id.clone(),
                    source,
                })
            }
            Ok(Ok(reply)) => reply,
        };

        tracing::debug!(
            stage_id = %stage.id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Agent replied"
        );

        into_object(&stage.id, reply)
    }
}

impl fmt::Debug for AgentInvoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentInvoker").finish_non_exhaustive()
    }
}

fn into_object(stage_id: &str, reply: AgentReply) -> Result<Value, AgentInvocationError> {
    let value = match reply {
        AgentReply::Json(Value::String(text)) | AgentReply::Text(text) => extract_json(&text)
            .ok_or_else(|| AgentInvocationError::Malformed {
                stage_id: stage_id.to_string(),
                reason: "no JSON object found in reply".to_string(),
            })?,
        AgentReply::Json(value) => value,
    };

    if value.is_object() {
        Ok(value)
    } else {
        Err(AgentInvocationError::Malformed {
            stage_id: stage_id.to_string(),
            reason: "reply is not a JSON object".to_string(),
        })
    }
}
