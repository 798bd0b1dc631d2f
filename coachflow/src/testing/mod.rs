//! Testing utilities for plan pipelines.
//!
//! This module provides:
//! - A scripted agent runtime with per-stage reply queues
//! - Conforming outputs for every catalog stage
//! - A sample questionnaire

mod fixtures;
mod mocks;

pub use fixtures::{k1_output, questionnaire, stub_output};
pub use mocks::ScriptedAgentRuntime;
