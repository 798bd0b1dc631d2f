//! Stage contracts: shapes, validation and the stage registry.
//!
//! This module provides:
//! - Declarative output shapes with field-level error reporting
//! - The ordered stage registry
//! - Typed reads of validated outputs

mod errors;
mod registry;
mod shape;
mod typed;

pub use errors::{codes, FieldError};
pub use registry::{
    Chain, InputSpec, SemanticReport, SemanticValidator, StageDefinition, StageRegistry,
    StageRegistryBuilder, ValidationOutcome,
};
pub use shape::{Field, Shape};
pub use typed::{extract_field, TypedOutput};
