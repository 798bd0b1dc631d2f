//! Run lifecycle events.
//!
//! The orchestrator reports progress through an injected [`EventSink`].
//! Every payload carries the `run_id` so events of concurrent runs can be
//! told apart.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Names of the events emitted during a run.
pub mod event_types {
    /// A run began.
    pub const PIPELINE_STARTED: &str = "pipeline.started";
    /// A stage attempt began.
    pub const STAGE_STARTED: &str = "stage.started";
    /// A stage attempt failed and will be repeated.
    pub const STAGE_RETRYING: &str = "stage.retrying";
    /// A stage produced a validated output.
    pub const STAGE_COMPLETED: &str = "stage.completed";
    /// Every stage completed.
    pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
    /// The run stopped on an error.
    pub const PIPELINE_FAILED: &str = "pipeline.failed";
    /// The caller cancelled the run.
    pub const PIPELINE_CANCELLED: &str = "pipeline.cancelled";
}
