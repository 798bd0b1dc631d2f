//! Per-run state: identity, seed and validated outputs.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use super::result::StageResult;
use crate::contracts::StageDefinition;

/// Key under which the questionnaire appears in stage inputs.
pub const QUESTIONNAIRE_KEY: &str = "questionnaire";

/// Why a result could not be recorded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// The stage already has a validated output in this run.
    #[error("Stage '{0}' already has a recorded output")]
    AlreadyRecorded(String),

    /// Only validated results may be recorded.
    #[error("Stage '{0}' output is not valid and cannot be recorded")]
    NotValid(String),
}

/// Accumulates the validated outputs of one run.
///
/// Owned by a single run and never shared, so concurrent runs cannot see
/// each other's data.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    seed: Value,
    results: Vec<StageResult>,
}

impl PipelineContext {
    /// Creates a context for a new run seeded with the questionnaire.
    #[must_use]
    pub fn new(seed: Value) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            seed,
            results: Vec::new(),
        }
    }

    /// Unique id of the run.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// When the run started.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// The questionnaire the run was seeded with.
    #[must_use]
    pub fn seed(&self) -> &Value {
        &self.seed
    }

    /// Records a validated result. Each stage is recorded at most once.
    pub fn record(&mut self, result: StageResult) -> Result<(), RecordError> {
        if !result.valid || result.validated_output.is_none() {
            return Err(RecordError::NotValid(result.stage_id));
        }
        if self.output(&result.stage_id).is_some() {
            return Err(RecordError::AlreadyRecorded(result.stage_id));
        }
        self.results.push(result);
        Ok(())
    }

    /// Validated output of a stage, if it has run.
    #[must_use]
    pub fn output(&self, stage_id: &str) -> Option<&Value> {
        self.results
            .iter()
            .find(|r| r.stage_id == stage_id)
            .and_then(StageResult::output)
    }

    /// Recorded results in execution order.
    #[must_use]
    pub fn results(&self) -> &[StageResult] {
        &self.results
    }

    /// Consumes the context, returning its results.
    #[must_use]
    pub fn into_results(self) -> Vec<StageResult> {
        self.results
    }

    /// Warnings of every recorded stage, in execution order.
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        self.results
            .iter()
            .flat_map(|r| r.warnings.iter().cloned())
            .collect()
    }

    /// Builds the input of `stage` from its declared reads only.
    ///
    /// The input is an object with the questionnaire under
    /// [`QUESTIONNAIRE_KEY`] (when the stage reads it) and each read
    /// stage's validated output under that stage's id.
    #[must_use]
    pub fn input_for(&self, stage: &StageDefinition) -> Value {
        let mut input = Map::new();
        if stage.input.questionnaire {
            input.insert(QUESTIONNAIRE_KEY.to_string(), self.seed.clone());
        }
        for read in &stage.input.reads {
            if let Some(output) = self.output(read) {
                input.insert(read.clone(), output.clone());
            }
        }
        Value::Object(input)
    }
}
