//! Scripted agent runtime for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use super::fixtures::stub_output;
use crate::agent::{AgentReply, AgentRequest, AgentRuntime};
use crate::cancellation::CancellationToken;
use crate::errors::RuntimeError;

#[derive(Debug)]
enum Step {
    Reply(AgentReply),
    Fail(RuntimeError),
    Slow(Duration, AgentReply),
    Cancel(Arc<CancellationToken>),
}

/// An [`AgentRuntime`] that answers from per-stage queues.
///
/// Each call pops the next scripted step of its stage. Once a stage's
/// queue is empty the runtime answers with [`stub_output`], so a test only
/// scripts the stages it cares about.
#[derive(Debug, Default)]
pub struct ScriptedAgentRuntime {
    steps: Mutex<HashMap<String, VecDeque<Step>>>,
    requests: Mutex<Vec<AgentRequest>>,
    delay: Option<Duration>,
}

impl ScriptedAgentRuntime {
    /// Creates a runtime that answers every stage with its stub output.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every call by `delay`.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queues a structured reply.
    #[must_use]
    pub fn reply(self, stage_id: &str, value: Value) -> Self {
        self.push(stage_id, Step::Reply(AgentReply::Json(value)))
    }

    /// Queues a free-text reply.
    #[must_use]
    pub fn reply_text(self, stage_id: &str, text: impl Into<String>) -> Self {
        self.push(stage_id, Step::Reply(AgentReply::Text(text.into())))
    }

    /// Queues a runtime failure.
    #[must_use]
    pub fn fail(self, stage_id: &str, error: RuntimeError) -> Self {
        self.push(stage_id, Step::Fail(error))
    }

    /// Queues a reply that arrives only after `delay`.
    #[must_use]
    pub fn slow(self, stage_id: &str, delay: Duration, value: Value) -> Self {
        self.push(stage_id, Step::Slow(delay, AgentReply::Json(value)))
    }

    /// Queues a call that cancels `token` and then never answers.
    #[must_use]
    pub fn cancel_on(self, stage_id: &str, token: Arc<CancellationToken>) -> Self {
        self.push(stage_id, Step::Cancel(token))
    }

    /// Every request received, in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<AgentRequest> {
        self.requests.lock().clone()
    }

    /// Requests received for one stage.
    #[must_use]
    pub fn requests_for(&self, stage_id: &str) -> Vec<AgentRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.stage_id == stage_id)
            .cloned()
            .collect()
    }

    /// Number of calls made for one stage.
    #[must_use]
    pub fn call_count(&self, stage_id: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.stage_id == stage_id)
            .count()
    }

    fn push(self, stage_id: &str, step: Step) -> Self {
        self.steps
            .lock()
            .entry(stage_id.to_string())
            .or_default()
            .push_back(step);
        self
    }

    fn next_step(&self, stage_id: &str) -> Option<Step> {
        self.steps
            .lock()
            .get_mut(stage_id)
            .and_then(VecDeque::pop_front)
    }
}

#[async_trait]
impl AgentRuntime for ScriptedAgentRuntime {
    async fn call(&self, request: AgentRequest) -> Result<AgentReply, RuntimeError> {
        let stage_id = request.stage_id.clone();
        self.requests.lock().push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.next_step(&stage_id) {
            None => Ok(AgentReply::Json(stub_output(&stage_id))),
            Some(Step::Reply(reply)) => Ok(reply),
            Some(Step::Fail(error)) => Err(error),
            Some(Step::Slow(delay, reply)) => {
                tokio::time::sleep(delay).await;
                Ok(reply)
            }
            Some(Step::Cancel(token)) => {
                token.cancel(format!("cancelled during '{stage_id}'"));
                std::future::pending().await
            }
        }
    }
}
