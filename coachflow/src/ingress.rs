//! Entry point used by the calling service.
//!
//! Wraps the orchestrator with questionnaire intake and response assembly.
//! A run either returns a complete [`AssembledPlan`] or a
//! [`PipelineError`]; nothing partial ever leaves this module.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::agent::{AgentInvoker, AgentRuntime};
use crate::catalog::{nutrition_chain, training_chain};
use crate::config::PipelineConfig;
use crate::contracts::{extract_field, Chain, StageRegistry};
use crate::errors::{ErrorKind, PipelineError, RegistryError};
use crate::events::EventSink;
use crate::pipeline::{Orchestrator, PipelineContext, RunOptions, StageResult};
use crate::plan::TrainingPlan;

/// The client questionnaire as submitted.
///
/// Free text, JSON, or a mix of both; the content is passed to the agents
/// untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionnaireBlob(Value);

impl QuestionnaireBlob {
    /// Reads `text` as JSON when it parses, otherwise keeps it as a string.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        match serde_json::from_str::<Value>(text.trim()) {
            Ok(value) => Self(value),
            Err(_) => Self(Value::String(text.to_string())),
        }
    }

    /// Wraps an already-parsed value.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    /// True when there is nothing for the agents to read.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match &self.0 {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            Value::Array(a) => a.is_empty(),
            Value::Object(o) => o.is_empty(),
            Value::Bool(_) | Value::Number(_) => false,
        }
    }

    /// The questionnaire as JSON.
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consumes the blob.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }

    /// SHA-256 of the compact JSON form, hex encoded.
    ///
    /// Identifies a questionnaire in logs without logging its content.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.0.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl From<Value> for QuestionnaireBlob {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

impl From<&str> for QuestionnaireBlob {
    fn from(text: &str) -> Self {
        Self::from_text(text)
    }
}

/// The result of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledPlan {
    /// Id of the run that produced the plan.
    pub run_id: Uuid,
    /// The chain that ran.
    pub chain: Chain,
    /// When the plan was assembled.
    pub generated_at: DateTime<Utc>,
    /// Validated result of every stage, in execution order.
    pub stages: Vec<StageResult>,
    /// Non-blocking findings of every stage.
    pub warnings: Vec<String>,
    /// Top-level keys of every validated output merged in order, later
    /// stages winning.
    pub program: Value,
}

impl AssembledPlan {
    /// Assembles the plan from a completed run.
    #[must_use]
    pub fn from_context(chain: Chain, ctx: PipelineContext) -> Self {
        let run_id = ctx.run_id();
        let warnings = ctx.warnings();
        let stages = ctx.into_results();

        let mut program = Map::new();
        for output in stages.iter().filter_map(StageResult::output) {
            if let Value::Object(fields) = output {
                for (key, value) in fields {
                    program.insert(key.clone(), value.clone());
                }
            }
        }

        Self {
            run_id,
            chain,
            generated_at: Utc::now(),
            stages,
            warnings,
            program: Value::Object(program),
        }
    }

    /// The result of one stage.
    #[must_use]
    pub fn stage(&self, stage_id: &str) -> Option<&StageResult> {
        self.stages.iter().find(|s| s.stage_id == stage_id)
    }

    /// The validated output of one stage.
    #[must_use]
    pub fn output(&self, stage_id: &str) -> Option<&Value> {
        self.stage(stage_id).and_then(StageResult::output)
    }

    /// The typed training plan, for training runs.
    #[must_use]
    pub fn training_plan(&self) -> Option<TrainingPlan> {
        extract_field(&self.program, "training_plan").ok()
    }

    /// The JSON body returned to the calling service.
    #[must_use]
    pub fn to_response(&self) -> Value {
        let mut body = json!({
            "run_id": self.run_id,
            "chain": self.chain,
            "generated_at": self.generated_at,
            "warnings": self.warnings,
        });
        body[self.chain.program_key()] = self.program.clone();
        body
    }
}

/// A configured chain ready to turn questionnaires into plans.
///
/// Holds no per-run state; one instance serves any number of concurrent
/// runs.
#[derive(Debug)]
pub struct PlanPipeline {
    orchestrator: Orchestrator,
}

impl PlanPipeline {
    /// Creates a pipeline over `registry`.
    #[must_use]
    pub fn new(
        registry: StageRegistry,
        runtime: Arc<dyn AgentRuntime>,
        config: &PipelineConfig,
    ) -> Self {
        let orchestrator = Orchestrator::new(Arc::new(registry), AgentInvoker::new(runtime))
            .with_retry_policy(config.retry.clone())
            .with_stage_timeout(config.stage_timeout());
        Self { orchestrator }
    }

    /// The E1..E9 training pipeline.
    pub fn training(
        runtime: Arc<dyn AgentRuntime>,
        config: &PipelineConfig,
    ) -> Result<Self, RegistryError> {
        Ok(Self::new(training_chain(&config.coverage)?, runtime, config))
    }

    /// The N0..N8 nutrition pipeline.
    pub fn nutrition(
        runtime: Arc<dyn AgentRuntime>,
        config: &PipelineConfig,
    ) -> Result<Self, RegistryError> {
        Ok(Self::new(nutrition_chain()?, runtime, config))
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.orchestrator = self.orchestrator.with_event_sink(sink);
        self
    }

    /// The chain being run.
    #[must_use]
    pub fn registry(&self) -> &StageRegistry {
        self.orchestrator.registry()
    }

    /// Runs the chain with no deadline.
    pub async fn run_pipeline(
        &self,
        questionnaire: QuestionnaireBlob,
    ) -> Result<AssembledPlan, PipelineError> {
        self.run_pipeline_with(questionnaire, &RunOptions::default())
            .await
    }

    /// Runs the chain under the caller's deadline and cancellation token.
    pub async fn run_pipeline_with(
        &self,
        questionnaire: QuestionnaireBlob,
        options: &RunOptions,
    ) -> Result<AssembledPlan, PipelineError> {
        let registry = self.registry();
        let chain = registry.chain();

        if questionnaire.is_blank() {
            return Err(PipelineError::new(
                registry.first().id.clone(),
                ErrorKind::StructuralValidation,
                vec!["questionnaire is empty".to_string()],
            ));
        }

        info!(
            %chain,
            questionnaire = %questionnaire.fingerprint(),
            "Plan requested"
        );
        let ctx = self
            .orchestrator
            .run(questionnaire.into_value(), options)
            .await?;
        Ok(AssembledPlan::from_context(chain, ctx))
    }

    /// Runs several questionnaires concurrently, each in its own run.
    ///
    /// Results come back in input order.
    pub async fn run_batch(
        &self,
        questionnaires: Vec<QuestionnaireBlob>,
    ) -> Vec<Result<AssembledPlan, PipelineError>> {
        join_all(
            questionnaires
                .into_iter()
                .map(|q| self.run_pipeline(q)),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::training_ids;
    use crate::contracts::{Shape, StageDefinition};
    use crate::pipeline::RetryPolicy;
    use crate::testing::{k1_output, questionnaire, stub_output, ScriptedAgentRuntime};
    use pretty_assertions::assert_eq;

    fn config() -> PipelineConfig {
        PipelineConfig::default().with_retry(RetryPolicy::default().with_base_delay_ms(1))
    }

    #[test]
    fn test_blob_from_text() {
        let json = QuestionnaireBlob::from_text(r#" { "edad": 30 } "#);
        assert_eq!(json.as_value(), &json!({ "edad": 30 }));

        let text = QuestionnaireBlob::from_text("Quiero ganar fuerza. I train 3 days.");
        assert_eq!(
            text.into_value(),
            json!("Quiero ganar fuerza. I train 3 days.")
        );

        assert!(QuestionnaireBlob::from_text("   ").is_blank());
        assert!(QuestionnaireBlob::from_text("{}").is_blank());
        assert!(!QuestionnaireBlob::from_text("0").is_blank());
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = QuestionnaireBlob::from_text(r#"{"a":1,"b":2}"#);
        let b = QuestionnaireBlob::from_text(r#"{ "b": 2, "a": 1 }"#);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
        assert_ne!(a.fingerprint(), QuestionnaireBlob::from_text("x").fingerprint());
    }

    #[tokio::test]
    async fn test_blank_questionnaire_is_rejected_before_any_call() {
        let runtime = Arc::new(ScriptedAgentRuntime::new());
        let pipeline = PlanPipeline::training(runtime.clone(), &config()).unwrap();

        let err = pipeline
            .run_pipeline(QuestionnaireBlob::from_text(""))
            .await
            .unwrap_err();
        assert_eq!(err.failed_stage_id, training_ids::CLIENT_PROFILE);
        assert_eq!(err.kind, ErrorKind::StructuralValidation);
        assert!(runtime.requests().is_empty());
    }

    #[tokio::test]
    async fn test_training_run_assembles_program() {
        let runtime = Arc::new(ScriptedAgentRuntime::new());
        let pipeline = PlanPipeline::training(runtime, &config()).unwrap();

        let plan = pipeline
            .run_pipeline(QuestionnaireBlob::from_value(questionnaire()))
            .await
            .unwrap();

        assert_eq!(plan.chain, Chain::Training);
        assert_eq!(plan.stages.len(), 9);
        assert!(plan.warnings.is_empty());
        assert_eq!(
            plan.program["client_profile"],
            stub_output(training_ids::CLIENT_PROFILE)["client_profile"]
        );
        assert_eq!(plan.program["training_plan"], k1_output()["training_plan"]);
        assert_eq!(plan.program["program_summary"]["weeks"], 4);

        let typed = plan.training_plan().unwrap();
        assert_eq!(typed.sessions.len(), 2);

        let response = plan.to_response();
        assert_eq!(response["chain"], "training");
        assert_eq!(response["run_id"], json!(plan.run_id));
        assert_eq!(
            response["client_training_program_enriched"]["k1_decisions"],
            k1_output()["k1_decisions"]
        );
    }

    #[tokio::test]
    async fn test_later_stage_wins_on_key_collision() {
        let runtime = Arc::new(
            ScriptedAgentRuntime::new()
                .reply("first", json!({ "shared": 1, "only_first": true }))
                .reply("second", json!({ "shared": 2 })),
        );
        let registry = StageRegistry::builder()
            .stage(
                StageDefinition::new("first", "X1", Chain::Nutrition, Shape::Any)
                    .reads_questionnaire(),
            )
            .stage(StageDefinition::new("second", "X2", Chain::Nutrition, Shape::Any))
            .build()
            .unwrap();
        let pipeline = PlanPipeline::new(registry, runtime, &config());

        let plan = pipeline
            .run_pipeline(QuestionnaireBlob::from_text("hola"))
            .await
            .unwrap();
        assert_eq!(plan.program, json!({ "shared": 2, "only_first": true }));
        assert!(plan.training_plan().is_none());
        assert!(plan.to_response()["client_nutrition_program_enriched"].is_object());
    }

    #[tokio::test]
    async fn test_run_batch_keeps_input_order() {
        let runtime = Arc::new(ScriptedAgentRuntime::new());
        let pipeline = PlanPipeline::nutrition(runtime.clone(), &config()).unwrap();

        let results = pipeline
            .run_batch(vec![
                QuestionnaireBlob::from_text("peso 60 kg"),
                QuestionnaireBlob::from_text(""),
                QuestionnaireBlob::from_text("peso 80 kg"),
            ])
            .await;

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());

        let first = results[0].as_ref().unwrap();
        let third = results[2].as_ref().unwrap();
        assert_ne!(first.run_id, third.run_id);
        assert_eq!(runtime.requests().len(), 18);
    }
}
