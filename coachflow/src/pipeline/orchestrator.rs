//! Sequential driver of a stage chain.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn, Instrument};

use super::context::PipelineContext;
use super::result::StageResult;
use super::retry::RetryPolicy;
use super::state::{transition, ChainPosition, RunEvent, RunState};
use crate::agent::AgentInvoker;
use crate::cancellation::CancellationToken;
use crate::contracts::{StageDefinition, StageRegistry};
use crate::errors::{ErrorKind, PipelineError};
use crate::events::{event_types, EventSink, NoOpEventSink};

/// Default per-call agent timeout.
pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(180);

/// Caller controls for a single run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Wall-clock budget for the whole run.
    pub deadline: Option<Duration>,
    /// Token the caller may cancel at any time.
    pub cancel: Arc<CancellationToken>,
}

impl RunOptions {
    /// Options with no deadline and a fresh token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the run deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Uses the caller's cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancel = token;
        self
    }
}

/// Drives the stages of a registry strictly in order.
///
/// Each stage is invoked, validated and either recorded or retried within
/// its budget. The first stage that exhausts its budget ends the run; a
/// later stage never sees an unvalidated output.
pub struct Orchestrator {
    registry: Arc<StageRegistry>,
    invoker: AgentInvoker,
    policy: RetryPolicy,
    stage_timeout: Duration,
    events: Arc<dyn EventSink>,
}

impl Orchestrator {
    /// Creates an orchestrator with the default policy, timeout and a
    /// no-op event sink.
    #[must_use]
    pub fn new(registry: Arc<StageRegistry>, invoker: AgentInvoker) -> Self {
        Self {
            registry,
            invoker,
            policy: RetryPolicy::default(),
            stage_timeout: DEFAULT_STAGE_TIMEOUT,
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the per-call agent timeout.
    #[must_use]
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// The chain being driven.
    #[must_use]
    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    /// Runs every stage on `seed` and returns the populated context.
    pub async fn run(
        &self,
        seed: Value,
        options: &RunOptions,
    ) -> Result<PipelineContext, PipelineError> {
        let ctx = PipelineContext::new(seed);
        let span = tracing::info_span!(
            "pipeline.run",
            run_id = %ctx.run_id(),
            chain = %self.registry.chain(),
        );
        self.drive(ctx, options).instrument(span).await
    }

    #[allow(clippy::too_many_lines)]
    async fn drive(
        &self,
        mut ctx: PipelineContext,
        options: &RunOptions,
    ) -> Result<PipelineContext, PipelineError> {
        let chain = ChainPosition::new(self.registry.len());
        let run_id = ctx.run_id().to_string();
        let cancel = options.cancel.as_ref();
        let started = Instant::now();
        let deadline = options.deadline.map(|d| started + d);

        let mut state = RunState::Pending;
        let mut pending: Option<Value> = None;
        // latest rejection of the current stage; kept until replaced or the stage advances
        let mut feedback: Option<(u32, Vec<String>)> = None;
        let mut last_errors: Vec<String> = Vec::new();
        let mut last_failure: Option<HashMap<String, Value>> = None;
        let mut last_delay: Option<Duration> = None;

        self.emit(
            event_types::PIPELINE_STARTED,
            json!({
                "run_id": run_id,
                "chain": self.registry.chain(),
                "stages": self.registry.stage_ids(),
            }),
        )
        .await;
        info!(stages = chain.stage_count, "Pipeline run started");

        loop {
            if !state.is_terminal() {
                if cancel.is_cancelled() {
                    state = self.step(state, RunEvent::Cancel, &chain);
                    continue;
                }
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    last_errors = vec![format!(
                        "run deadline of {}s exceeded",
                        options.deadline.unwrap_or_default().as_secs()
                    )];
                    state = self.step(state, RunEvent::DeadlineExceeded, &chain);
                    continue;
                }
            }

            match state {
                RunState::Pending => {
                    state = self.step(state, RunEvent::Start, &chain);
                }

                RunState::Invoking(cursor) => {
                    let stage = self.stage_at(cursor.index)?;
                    let mut input = ctx.input_for(stage);
                    if let Some((attempt, errors)) = &feedback {
                        input["retry_feedback"] = json!({
                            "attempt": attempt,
                            "errors": errors,
                        });
                    }

                    self.emit(
                        event_types::STAGE_STARTED,
                        json!({
                            "run_id": run_id,
                            "stage_id": stage.id,
                            "code": stage.code,
                            "attempt": cursor.attempt,
                        }),
                    )
                    .await;

                    let timeout = deadline.map_or(self.stage_timeout, |d| {
                        self.stage_timeout
                            .min(d.saturating_duration_since(Instant::now()))
                    });
                    let span = tracing::debug_span!(
                        "stage",
                        stage_id = %stage.id,
                        attempt = cursor.attempt,
                    );
                    let call = self.invoker.invoke(stage, &input, timeout).instrument(span);

                    let outcome = tokio::select! {
                        () = cancel.cancelled() => None,
                        result = call => Some(result),
                    };

                    state = match outcome {
                        None => self.step(state, RunEvent::Cancel, &chain),
                        Some(Ok(raw)) => {
                            pending = Some(raw);
                            self.step(state, RunEvent::Replied, &chain)
                        }
                        Some(Err(err)) => {
                            warn!(
                                stage_id = %stage.id,
                                attempt = cursor.attempt,
                                error = %err,
                                "Agent invocation failed"
                            );
                            last_errors = vec![err.public_message()];
                            last_failure = Some(err.to_dict());
                            self.step(state, RunEvent::InvocationFailed(err.kind()), &chain)
                        }
                    };
                }

                RunState::Validating(cursor) => {
                    let stage = self.stage_at(cursor.index)?;
                    let raw = pending.take().unwrap_or(Value::Null);
                    let outcome = stage.validate(&raw);
                    let result = StageResult::from_outcome(&stage.id, raw, outcome, cursor.attempt);

                    if result.valid {
                        for warning in &result.warnings {
                            warn!(stage_id = %stage.id, %warning, "Stage accepted with warning");
                        }
                        ctx.record(result).map_err(|e| {
                            PipelineError::new(
                                stage.id.clone(),
                                ErrorKind::StructuralValidation,
                                vec![e.to_string()],
                            )
                        })?;
                        state = self.step(state, RunEvent::Accepted, &chain);
                    } else {
                        let kind = result
                            .error_kind
                            .unwrap_or(ErrorKind::StructuralValidation);
                        debug!(
                            stage_id = %stage.id,
                            attempt = cursor.attempt,
                            %kind,
                            errors = ?result.errors,
                            "Stage output rejected"
                        );
                        feedback = Some((cursor.attempt, result.errors.clone()));
                        last_errors = result.errors;
                        state = self.step(state, RunEvent::Rejected(kind), &chain);
                    }
                }

                RunState::Retrying { cursor, cause } => {
                    let stage = self.stage_at(cursor.index)?;
                    let mut payload = json!({
                        "run_id": run_id,
                        "stage_id": stage.id,
                        "attempt": cursor.attempt,
                        "kind": cause,
                        "errors": last_errors,
                    });
                    if let Some(failure) = last_failure.take() {
                        payload["error"] = json!(failure);
                    }
                    self.emit(event_types::STAGE_RETRYING, payload).await;
                    info!(
                        stage_id = %stage.id,
                        attempt = cursor.attempt,
                        kind = %cause,
                        "Retrying stage"
                    );

                    if cause.is_validation() {
                        state = self.step(state, RunEvent::RetryReady, &chain);
                    } else {
                        let retry = cursor.invocation_retries.saturating_sub(1);
                        let delay = self.policy.delay_for(retry, last_delay);
                        last_delay = Some(delay);

                        let cancelled = tokio::select! {
                            () = cancel.cancelled() => true,
                            () = tokio::time::sleep(delay) => false,
                        };
                        let event = if cancelled {
                            RunEvent::Cancel
                        } else {
                            RunEvent::RetryReady
                        };
                        state = self.step(state, event, &chain);
                    }
                }

                RunState::Advancing { completed } => {
                    let stage = self.stage_at(completed)?;
                    let attempts = ctx.results().last().map_or(1, |r| r.attempts);
                    self.emit(
                        event_types::STAGE_COMPLETED,
                        json!({
                            "run_id": run_id,
                            "stage_id": stage.id,
                            "attempts": attempts,
                        }),
                    )
                    .await;
                    debug!(stage_id = %stage.id, attempts, "Stage completed");

                    feedback = None;
                    last_errors.clear();
                    last_delay = None;
                    state = self.step(state, RunEvent::Next, &chain);
                }

                RunState::Completed => {
                    let duration_ms = millis(started.elapsed());
                    self.emit(
                        event_types::PIPELINE_COMPLETED,
                        json!({ "run_id": run_id, "duration_ms": duration_ms }),
                    )
                    .await;
                    info!(duration_ms, "Pipeline run completed");
                    return Ok(ctx);
                }

                RunState::Failed { stage_index, kind } => {
                    let messages = if last_errors.is_empty() {
                        vec![kind.to_string()]
                    } else {
                        std::mem::take(&mut last_errors)
                    };
                    let err = PipelineError::new(self.stage_id_at(stage_index), kind, messages);
                    self.emit(
                        event_types::PIPELINE_FAILED,
                        json!({ "run_id": run_id, "error": err.to_response_body() }),
                    )
                    .await;
                    error!(
                        failed_stage_id = %err.failed_stage_id,
                        %kind,
                        messages = ?err.messages,
                        "Pipeline run failed"
                    );
                    return Err(err);
                }

                RunState::Cancelled { stage_index } => {
                    let err = PipelineError::cancelled(self.stage_id_at(stage_index), cancel.reason());
                    self.emit(
                        event_types::PIPELINE_CANCELLED,
                        json!({
                            "run_id": run_id,
                            "stage_id": err.failed_stage_id,
                            "reason": err.messages,
                        }),
                    )
                    .await;
                    info!(stage_id = %err.failed_stage_id, "Pipeline run cancelled");
                    return Err(err);
                }
            }
        }
    }

    fn step(&self, state: RunState, event: RunEvent, chain: &ChainPosition) -> RunState {
        let next = transition(state, event, chain, &self.policy);
        tracing::trace!(?state, ?event, ?next, "Run state transition");
        next
    }

    fn stage_at(&self, index: usize) -> Result<&StageDefinition, PipelineError> {
        self.registry.at(index).ok_or_else(|| {
            PipelineError::new(
                format!("#{index}"),
                ErrorKind::InvocationFailure,
                vec![format!("no stage at position {index}")],
            )
        })
    }

    fn stage_id_at(&self, index: usize) -> String {
        self.registry
            .at(index)
            .map_or_else(|| format!("#{index}"), |s| s.id.clone())
    }

    async fn emit(&self, event_type: &str, data: Value) {
        self.events.emit(event_type, Some(data)).await;
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("stages", &self.registry.stage_ids())
            .field("policy", &self.policy)
            .field("stage_timeout", &self.stage_timeout)
            .finish_non_exhaustive()
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
