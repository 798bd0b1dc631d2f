//! Pipeline execution.
//!
//! This module provides:
//! - The per-run context of validated outputs
//! - The pure run state machine
//! - Retry budgets with backoff and jitter
//! - The orchestrator that drives a chain stage by stage

mod context;
mod orchestrator;
mod result;
mod retry;
mod state;

#[cfg(test)]
mod integration_tests;

pub use context::{PipelineContext, RecordError, QUESTIONNAIRE_KEY};
pub use orchestrator::{Orchestrator, RunOptions, DEFAULT_STAGE_TIMEOUT};
pub use result::StageResult;
pub use retry::{BackoffStrategy, JitterStrategy, RetryPolicy};
pub use state::{transition, ChainPosition, RunEvent, RunState, StageCursor};
