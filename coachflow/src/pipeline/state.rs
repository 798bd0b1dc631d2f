//! Run state machine.
//!
//! [`transition`] is a pure function of the current state, an event, the
//! chain length and the retry policy. The orchestrator performs the
//! effects (agent calls, validation, sleeps, event emission) and feeds
//! the outcome back in as the next [`RunEvent`].

use serde::{Deserialize, Serialize};

use super::retry::RetryPolicy;
use crate::errors::ErrorKind;

/// Where a run is inside one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCursor {
    /// Position of the stage in the registry.
    pub index: usize,
    /// 1-based attempt number.
    pub attempt: u32,
    /// Validation retries used so far.
    pub validation_retries: u32,
    /// Invocation retries used so far.
    pub invocation_retries: u32,
}

impl StageCursor {
    /// First attempt of the stage at `index`.
    #[must_use]
    pub fn first(index: usize) -> Self {
        Self {
            index,
            attempt: 1,
            validation_retries: 0,
            invocation_retries: 0,
        }
    }

    fn retried(self, kind: ErrorKind) -> Self {
        let mut next = self;
        next.attempt += 1;
        if kind.is_validation() {
            next.validation_retries += 1;
        } else {
            next.invocation_retries += 1;
        }
        next
    }

    fn retries_used(&self, kind: ErrorKind) -> u32 {
        if kind.is_validation() {
            self.validation_retries
        } else {
            self.invocation_retries
        }
    }
}

/// State of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    /// Not started.
    Pending,
    /// Waiting for the agent of the current stage.
    Invoking(StageCursor),
    /// Checking the agent's reply against the stage contract.
    Validating(StageCursor),
    /// The current stage is done; the next one has not started.
    Advancing {
        /// Index of the stage that just completed.
        completed: usize,
    },
    /// About to re-invoke the current stage.
    Retrying {
        /// Cursor of the upcoming attempt.
        cursor: StageCursor,
        /// Failure that caused the retry.
        cause: ErrorKind,
    },
    /// Every stage completed.
    Completed,
    /// The run stopped on an error.
    Failed {
        /// Stage that failed.
        stage_index: usize,
        /// Why.
        kind: ErrorKind,
    },
    /// The caller cancelled the run.
    Cancelled {
        /// Stage that was current when cancellation was observed.
        stage_index: usize,
    },
}

impl RunState {
    /// Returns true for `Completed`, `Failed` and `Cancelled`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed { .. } | Self::Cancelled { .. }
        )
    }

    /// Index of the stage the state refers to, if any.
    #[must_use]
    pub fn stage_index(&self) -> Option<usize> {
        match self {
            Self::Invoking(c) | Self::Validating(c) | Self::Retrying { cursor: c, .. } => {
                Some(c.index)
            }
            Self::Advancing { completed } => Some(*completed),
            Self::Failed { stage_index, .. } | Self::Cancelled { stage_index } => {
                Some(*stage_index)
            }
            Self::Pending | Self::Completed => None,
        }
    }
}

/// Something that happened while driving a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "kind", rename_all = "snake_case")]
pub enum RunEvent {
    /// Begin the run.
    Start,
    /// The agent answered with a JSON object.
    Replied,
    /// The agent call failed or timed out.
    InvocationFailed(ErrorKind),
    /// The reply satisfied the stage contract.
    Accepted,
    /// The reply broke the stage contract.
    Rejected(ErrorKind),
    /// The retry delay, if any, has elapsed.
    RetryReady,
    /// Move on from a completed stage.
    Next,
    /// The run's deadline passed.
    DeadlineExceeded,
    /// The caller cancelled.
    Cancel,
}

/// Static facts about the chain being run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainPosition {
    /// Number of stages in the chain.
    pub stage_count: usize,
}

impl ChainPosition {
    /// Creates a position for a chain of `stage_count` stages.
    #[must_use]
    pub fn new(stage_count: usize) -> Self {
        Self { stage_count }
    }
}

/// Computes the next state.
///
/// Terminal states absorb every event. Events that make no sense in the
/// current state leave it unchanged.
#[must_use]
pub fn transition(
    state: RunState,
    event: RunEvent,
    chain: &ChainPosition,
    policy: &RetryPolicy,
) -> RunState {
    if state.is_terminal() {
        return state;
    }

    match (state, event) {
        (_, RunEvent::Cancel) => RunState::Cancelled {
            stage_index: state.stage_index().unwrap_or(0),
        },
        (_, RunEvent::DeadlineExceeded) => RunState::Failed {
            stage_index: state.stage_index().unwrap_or(0),
            kind: ErrorKind::Timeout,
        },

        (RunState::Pending, RunEvent::Start) => start_stage(0, chain),

        (RunState::Invoking(cursor), RunEvent::Replied) => RunState::Validating(cursor),
        (RunState::Invoking(cursor), RunEvent::InvocationFailed(kind))
        | (RunState::Validating(cursor), RunEvent::Rejected(kind)) => retry_or_fail(cursor, kind, policy),

        (RunState::Validating(cursor), RunEvent::Accepted) => RunState::Advancing {
            completed: cursor.index,
        },

        (RunState::Retrying { cursor, .. }, RunEvent::RetryReady) => RunState::Invoking(cursor),

        (RunState::Advancing { completed }, RunEvent::Next) => start_stage(completed + 1, chain),

        (other, _) => other,
    }
}

fn start_stage(index: usize, chain: &ChainPosition) -> RunState {
    if index < chain.stage_count {
        RunState::Invoking(StageCursor::first(index))
    } else {
        RunState::Completed
    }
}

fn retry_or_fail(cursor: StageCursor, kind: ErrorKind, policy: &RetryPolicy) -> RunState {
    if kind.is_retryable() && cursor.retries_used(kind) < policy.budget_for(kind) {
        RunState::Retrying {
            cursor: cursor.retried(kind),
            cause: kind,
        }
    } else {
        RunState::Failed {
            stage_index: cursor.index,
            kind,
        }
    }
}
