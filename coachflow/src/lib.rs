//! # Coachflow
//!
//! A schema-validated, multi-stage agent pipeline that turns a client
//! questionnaire into a four-week training or nutrition plan.
//!
//! Coachflow provides:
//!
//! - **Stage contracts**: an ordered registry of stages, each with a strict
//!   output shape, declared reads and optional domain rules
//! - **Sequential orchestration**: a pure run state machine with bounded
//!   validation and invocation retries
//! - **The K1 block**: closed taxonomies and abstract scales for Block B of
//!   every training session
//! - **Pluggable agents**: one [`AgentRuntime`](agent::AgentRuntime) trait,
//!   with an HTTP implementation behind the `http` feature
//! - **Cancellation and deadlines**: runs stop at the next suspension point
//!   and never return a partial plan
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use coachflow::prelude::*;
//!
//! let runtime = Arc::new(HttpAgentRuntime::new(HttpRuntimeConfig::new("http://agents"))?);
//! let pipeline = PlanPipeline::training(runtime, &PipelineConfig::from_env()?)?
//!     .with_event_sink(Arc::new(LoggingEventSink::default()));
//!
//! let plan = pipeline
//!     .run_pipeline(QuestionnaireBlob::from_text(&body))
//!     .await?;
//! let response = plan.to_response();
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod agent;
pub mod cancellation;
pub mod catalog;
pub mod config;
pub mod contracts;
pub mod errors;
pub mod events;
pub mod ingress;
pub mod observability;
pub mod pipeline;
pub mod plan;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::agent::{AgentInvoker, AgentReply, AgentRequest, AgentRuntime};
    #[cfg(feature = "http")]
    pub use crate::agent::HttpAgentRuntime;
    pub use crate::cancellation::CancellationToken;
    pub use crate::catalog::{nutrition_chain, training_chain};
    pub use crate::config::{HttpRuntimeConfig, PipelineConfig};
    pub use crate::contracts::{Chain, Shape, StageDefinition, StageRegistry, ValidationOutcome};
    pub use crate::errors::{
        AgentInvocationError, CoachflowError, ErrorKind, PipelineError, RegistryError,
        RuntimeError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::ingress::{AssembledPlan, PlanPipeline, QuestionnaireBlob};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{Orchestrator, RetryPolicy, RunOptions, StageResult};
    pub use crate::plan::{CoverageRules, Severity, TrainingPlan};
    pub use std::sync::Arc;
}
