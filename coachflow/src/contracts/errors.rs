//! Field-level contract violations.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::ErrorKind;

/// A single offending field in a candidate stage output.
///
/// Validation produces one of these per violation so the orchestrator can
/// hand the complete list back to the agent on retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Dotted path to the field, e.g. `training_plan.sessions[0].blocks[0].id`.
    pub path: String,
    /// Stable identifier of the violated rule (see [`codes`]).
    pub code: String,
    /// Human-readable description of the issue.
    pub message: String,
    /// Whether the violation is structural or semantic.
    pub kind: ErrorKind,
}

impl FieldError {
    /// Creates a structural violation.
    #[must_use]
    pub fn structural(
        path: impl Into<String>,
        code: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            code: code.to_string(),
            message: message.into(),
            kind: ErrorKind::StructuralValidation,
        }
    }

    /// Creates a semantic violation.
    #[must_use]
    pub fn semantic(
        path: impl Into<String>,
        code: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            code: code.to_string(),
            message: message.into(),
            kind: ErrorKind::SemanticValidation,
        }
    }

    /// Returns true for structural violations.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        self.kind == ErrorKind::StructuralValidation
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "$" } else { &self.path };
        write!(f, "{}: {}", path, self.message)
    }
}

/// Contract violation codes.
pub mod codes {
    /// A required field is absent.
    pub const MISSING_FIELD: &str = "CONTRACT-001-MISSING";
    /// A field not declared by the shape.
    pub const UNEXPECTED_FIELD: &str = "CONTRACT-001-UNEXPECTED";
    /// Wrong JSON type.
    pub const TYPE_MISMATCH: &str = "CONTRACT-002-TYPE";
    /// Value outside a closed enum.
    pub const ENUM_VALUE: &str = "CONTRACT-002-ENUM";
    /// Fixed literal violated.
    pub const FIXED_LITERAL: &str = "CONTRACT-002-LITERAL";
    /// Integer outside its bounds.
    pub const OUT_OF_RANGE: &str = "CONTRACT-002-RANGE";
    /// Array shorter than its minimum.
    pub const TOO_FEW_ITEMS: &str = "CONTRACT-002-MIN_ITEMS";
    /// Empty string where text is required.
    pub const EMPTY_TEXT: &str = "CONTRACT-002-EMPTY";
    /// Raw number or free text where an abstract level is required.
    pub const ABSTRACT_SCALE: &str = "DOMAIN-001-ABSTRACT_SCALE";
    /// Missing or incomplete decision audit trail.
    pub const AUDIT_TRAIL: &str = "DOMAIN-002-AUDIT_TRAIL";
    /// Movement-pattern coverage below the configured minimum.
    pub const PATTERN_COVERAGE: &str = "DOMAIN-003-COVERAGE";
    /// Exercise ordering inside a block is inconsistent.
    pub const EXERCISE_ORDER: &str = "DOMAIN-004-ORDER";
    /// Two sessions of one plan share an id.
    pub const SESSION_ID: &str = "DOMAIN-005-SESSION_ID";
    /// Typed model could not be read back.
    pub const TYPED_READ: &str = "CONTRACT-003-TYPED";
}
