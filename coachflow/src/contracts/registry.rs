//! Ordered, immutable catalog of stage contracts.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use super::errors::{codes, FieldError};
use super::shape::Shape;
use crate::errors::{ErrorKind, RegistryError, UnknownStageError};

/// Which agent chain a stage belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Chain {
    /// The E1..E9 training chain.
    Training,
    /// The N0..N8 nutrition chain.
    Nutrition,
}

impl Chain {
    /// Key under which the assembled program is returned to the caller.
    #[must_use]
    pub fn program_key(&self) -> &'static str {
        match self {
            Self::Training => "client_training_program_enriched",
            Self::Nutrition => "client_nutrition_program_enriched",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Training => write!(f, "training"),
            Self::Nutrition => write!(f, "nutrition"),
        }
    }
}

/// What a stage is allowed to read when its input is assembled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSpec {
    /// Whether the raw questionnaire is part of the input.
    pub questionnaire: bool,
    /// Earlier stages whose validated output is part of the input.
    pub reads: Vec<String>,
}

/// Findings of a domain-rule check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SemanticReport {
    /// Violations that reject the candidate.
    pub errors: Vec<FieldError>,
    /// Findings recorded but not blocking.
    pub warnings: Vec<String>,
}

/// Domain rules that a shape cannot express.
///
/// Runs only on structurally valid candidates and may coerce the value,
/// for example by recording warnings inside it.
pub trait SemanticValidator: Send + Sync + fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Checks (and possibly annotates) a structurally valid candidate.
    fn check(&self, value: &mut Value) -> SemanticReport;
}

/// Result of validating a candidate against a stage contract.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    /// The candidate satisfies the contract.
    Accepted {
        /// The validated (possibly annotated) value.
        value: Value,
        /// Non-blocking findings.
        warnings: Vec<String>,
    },
    /// The candidate was rejected.
    Rejected {
        /// Structural if any structural violation exists, semantic otherwise.
        kind: ErrorKind,
        /// Every violation found.
        errors: Vec<FieldError>,
    },
}

impl ValidationOutcome {
    /// Returns true when accepted.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    /// The violations, empty when accepted.
    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        match self {
            Self::Accepted { .. } => &[],
            Self::Rejected { errors, .. } => errors,
        }
    }

    /// Violations rendered as `path: message` lines.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.errors().iter().map(ToString::to_string).collect()
    }

    /// The rejection kind, if rejected.
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Accepted { .. } => None,
            Self::Rejected { kind, .. } => Some(*kind),
        }
    }
}

/// Contract of a single stage.
#[derive(Debug, Clone)]
pub struct StageDefinition {
    /// Unique stage id, e.g. `training-plan`.
    pub id: String,
    /// Catalog label, e.g. `E5`.
    pub code: String,
    /// Owning chain.
    pub chain: Chain,
    /// What the stage produces.
    pub description: String,
    /// What the stage may read.
    pub input: InputSpec,
    /// Shape of the output.
    pub output: Shape,
    /// Domain rules applied after the shape check.
    pub semantic: Option<Arc<dyn SemanticValidator>>,
    output_schema: Value,
}

impl StageDefinition {
    /// Creates a new stage definition.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        code: impl Into<String>,
        chain: Chain,
        output: Shape,
    ) -> Self {
        let output_schema = output.to_json_schema();
        Self {
            id: id.into(),
            code: code.into(),
            chain,
            description: String::new(),
            input: InputSpec::default(),
            output,
            semantic: None,
            output_schema,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Lets the stage read the raw questionnaire.
    #[must_use]
    pub fn reads_questionnaire(mut self) -> Self {
        self.input.questionnaire = true;
        self
    }

    /// Lets the stage read the given earlier stages.
    #[must_use]
    pub fn reads(mut self, stages: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.input.reads.extend(stages.into_iter().map(Into::into));
        self
    }

    /// Attaches domain rules.
    #[must_use]
    pub fn with_semantic(mut self, validator: Arc<dyn SemanticValidator>) -> Self {
        self.semantic = Some(validator);
        self
    }

    /// Strict JSON Schema of the output.
    #[must_use]
    pub fn output_schema(&self) -> &Value {
        &self.output_schema
    }

    /// Validates a candidate output against this contract.
    #[must_use]
    pub fn validate(&self, candidate: &Value) -> ValidationOutcome {
        let mut errors = self.output.validate(candidate);
        if errors.iter().any(FieldError::is_structural) {
            return ValidationOutcome::Rejected {
                kind: ErrorKind::StructuralValidation,
                errors,
            };
        }

        let mut value = candidate.clone();
        let mut warnings = Vec::new();
        if let Some(ref validator) = self.semantic {
            let report = validator.check(&mut value);
            tracing::trace!(
                stage_id = %self.id,
                validator = validator.name(),
                errors = report.errors.len(),
                warnings = report.warnings.len(),
                "Semantic check finished"
            );
            // a typed read of values the shape already rejected repeats the same finding
            let shape_rejected = !errors.is_empty();
            errors.extend(
                report
                    .errors
                    .into_iter()
                    .filter(|e| !(shape_rejected && e.code == codes::TYPED_READ)),
            );
            warnings = report.warnings;
        }

        if errors.is_empty() {
            ValidationOutcome::Accepted { value, warnings }
        } else {
            let kind = if errors.iter().any(FieldError::is_structural) {
                ErrorKind::StructuralValidation
            } else {
                ErrorKind::SemanticValidation
            };
            ValidationOutcome::Rejected { kind, errors }
        }
    }
}

/// Ordered catalog of stages. Position defines execution order.
#[derive(Debug, Clone)]
pub struct StageRegistry {
    stages: Vec<StageDefinition>,
}

impl StageRegistry {
    /// Starts a registry builder.
    #[must_use]
    pub fn builder() -> StageRegistryBuilder {
        StageRegistryBuilder::default()
    }

    /// Looks up a stage by id.
    pub fn get_stage(&self, stage_id: &str) -> Result<&StageDefinition, UnknownStageError> {
        self.stages
            .iter()
            .find(|s| s.id == stage_id)
            .ok_or_else(|| UnknownStageError::new(stage_id))
    }

    /// Validates a candidate against the named stage.
    pub fn validate(
        &self,
        stage_id: &str,
        candidate: &Value,
    ) -> Result<ValidationOutcome, UnknownStageError> {
        Ok(self.get_stage(stage_id)?.validate(candidate))
    }

    /// Execution position of a stage.
    #[must_use]
    pub fn position(&self, stage_id: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.id == stage_id)
    }

    /// Stage at a position.
    #[must_use]
    pub fn at(&self, index: usize) -> Option<&StageDefinition> {
        self.stages.get(index)
    }

    /// Iterates stages in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &StageDefinition> {
        self.stages.iter()
    }

    /// Stage ids in execution order.
    #[must_use]
    pub fn stage_ids(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.id.clone()).collect()
    }

    /// The first stage.
    #[must_use]
    pub fn first(&self) -> &StageDefinition {
        // build() guarantees at least one stage
        &self.stages[0]
    }

    /// The chain of the first stage.
    #[must_use]
    pub fn chain(&self) -> Chain {
        self.first().chain
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always false for a built registry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Builder that checks the catalog before freezing it.
#[derive(Debug, Default)]
pub struct StageRegistryBuilder {
    stages: Vec<StageDefinition>,
}

impl StageRegistryBuilder {
    /// Appends a stage; order of calls is execution order.
    #[must_use]
    pub fn stage(mut self, stage: StageDefinition) -> Self {
        self.stages.push(stage);
        self
    }

    /// Validates ids, codes and read references, then freezes the registry.
    pub fn build(self) -> Result<StageRegistry, RegistryError> {
        if self.stages.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut ids = HashSet::new();
        let mut stage_codes = HashSet::new();
        for stage in &self.stages {
            if !ids.insert(stage.id.as_str()) {
                return Err(RegistryError::DuplicateStage {
                    stage_id: stage.id.clone(),
                });
            }
            if !stage_codes.insert(stage.code.as_str()) {
                return Err(RegistryError::DuplicateCode {
                    code: stage.code.clone(),
                });
            }
        }

        for (index, stage) in self.stages.iter().enumerate() {
            for read in &stage.input.reads {
                match self.stages.iter().position(|s| &s.id == read) {
                    None => {
                        return Err(RegistryError::UnknownReference {
                            stage_id: stage.id.clone(),
                            reads: read.clone(),
                        })
                    }
                    Some(pos) if pos >= index => {
                        return Err(RegistryError::ForwardReference {
                            stage_id: stage.id.clone(),
                            reads: read.clone(),
                        })
                    }
                    Some(_) => {}
                }
            }
        }

        Ok(StageRegistry {
            stages: self.stages,
        })
    }
}
