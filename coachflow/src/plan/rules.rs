//! Domain rules of the training-plan stage.
//!
//! These run after the shape check and catch output that is well formed
//! but wrong for a coach: missing audit trail, broken exercise ordering,
//! thin movement-pattern coverage.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::contracts::{codes, FieldError, SemanticReport, SemanticValidator, TypedOutput};

use super::model::TrainingPlanOutput;
use super::scales::Patron;

/// Prefix of coverage findings recorded in `k1_decisions.reglas_aplicadas`.
pub const WARNING_PREFIX: &str = "aviso:";

/// How a coverage violation is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Recorded in the audit trail, not blocking.
    #[default]
    Warning,
    /// Rejects the candidate.
    Error,
}

/// Movement-pattern coverage rules for Block B.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageRules {
    /// Minimum distinct patterns per session.
    #[serde(default = "default_min_distinct_patterns")]
    pub min_distinct_patterns: usize,
    /// Patterns that must appear somewhere in the plan.
    #[serde(default)]
    pub required_patterns: Vec<Patron>,
    /// What a violation does.
    #[serde(default)]
    pub severity: Severity,
}

fn default_min_distinct_patterns() -> usize {
    3
}

impl Default for CoverageRules {
    fn default() -> Self {
        Self {
            min_distinct_patterns: default_min_distinct_patterns(),
            required_patterns: Vec::new(),
            severity: Severity::default(),
        }
    }
}

impl CoverageRules {
    /// Creates the default rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-session minimum.
    #[must_use]
    pub fn with_min_distinct_patterns(mut self, min: usize) -> Self {
        self.min_distinct_patterns = min;
        self
    }

    /// Requires a pattern somewhere in the plan.
    #[must_use]
    pub fn require(mut self, pattern: Patron) -> Self {
        self.required_patterns.push(pattern);
        self
    }

    /// Sets the severity.
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

/// Semantic validator of the K1 training-plan output.
#[derive(Debug, Clone, Default)]
pub struct K1Validator {
    rules: CoverageRules,
}

impl K1Validator {
    /// Creates a validator with the given coverage rules.
    #[must_use]
    pub fn new(rules: CoverageRules) -> Self {
        Self { rules }
    }

    /// The coverage rules in force.
    #[must_use]
    pub fn rules(&self) -> &CoverageRules {
        &self.rules
    }

    fn check_session_ids(sessions: &[Value], errors: &mut Vec<FieldError>) {
        let mut seen = BTreeSet::new();
        for (s, session) in sessions.iter().enumerate() {
            if let Some(id) = session.get("id").and_then(Value::as_str) {
                if !seen.insert(id) {
                    errors.push(FieldError::semantic(
                        format!("training_plan.sessions[{s}].id"),
                        codes::SESSION_ID,
                        format!("session id '{id}' is already used by an earlier session"),
                    ));
                }
            }
        }
    }

    fn check_exercise_order(sessions: &[Value], errors: &mut Vec<FieldError>) {
        for (s, session) in sessions.iter().enumerate() {
            for (b, block) in blocks(session).iter().enumerate() {
                let exercises = array(block, "exercises");
                let mut orders: Vec<u64> = exercises
                    .iter()
                    .filter_map(|e| e.get("order").and_then(Value::as_u64))
                    .collect();
                orders.sort_unstable();
                let expected: Vec<u64> = (1..=exercises.len() as u64).collect();
                if orders != expected {
                    errors.push(FieldError::semantic(
                        format!("training_plan.sessions[{s}].blocks[{b}].exercises"),
                        codes::EXERCISE_ORDER,
                        format!(
                            "exercise order must run 1..={} without gaps or repeats, found {:?}",
                            exercises.len(),
                            orders
                        ),
                    ));
                }
            }
        }
    }

    fn check_audit_trail(value: &Value, sessions: &[Value], errors: &mut Vec<FieldError>) {
        let decisions = match value.get("k1_decisions") {
            Some(d) if d.is_object() => d,
            _ => {
                errors.push(FieldError::semantic(
                    "k1_decisions",
                    codes::AUDIT_TRAIL,
                    "audit trail is missing",
                ));
                return;
            }
        };

        if array(decisions, "reglas_aplicadas").is_empty() {
            errors.push(FieldError::semantic(
                "k1_decisions.reglas_aplicadas",
                codes::AUDIT_TRAIL,
                "must list every rule applied",
            ));
        }

        let listed: BTreeSet<&str> = array(decisions, "metodos_usados")
            .iter()
            .filter_map(Value::as_str)
            .collect();
        if listed.is_empty() {
            errors.push(FieldError::semantic(
                "k1_decisions.metodos_usados",
                codes::AUDIT_TRAIL,
                "must list every training method used",
            ));
            return;
        }

        for (s, session) in sessions.iter().enumerate() {
            for (b, block) in blocks(session).iter().enumerate() {
                if let Some(method) = block.get("metodo_entrenamiento").and_then(Value::as_str) {
                    if !listed.contains(method) {
                        errors.push(FieldError::semantic(
                            format!("training_plan.sessions[{s}].blocks[{b}].metodo_entrenamiento"),
                            codes::AUDIT_TRAIL,
                            format!("method '{method}' is not listed in k1_decisions.metodos_usados"),
                        ));
                    }
                }
            }
        }
    }

    fn coverage_findings(&self, sessions: &[Value]) -> Vec<(String, String)> {
        let mut findings = Vec::new();
        let mut plan_patterns = BTreeSet::new();

        for (s, session) in sessions.iter().enumerate() {
            let patterns: BTreeSet<&str> = blocks(session)
                .iter()
                .flat_map(|b| array(b, "exercises"))
                .filter_map(|e| e.get("patron").and_then(Value::as_str))
                .collect();
            plan_patterns.extend(patterns.iter().copied());

            if patterns.len() < self.rules.min_distinct_patterns {
                let id = session.get("id").and_then(Value::as_str).unwrap_or("?");
                findings.push((
                    format!("training_plan.sessions[{s}]"),
                    format!(
                        "cobertura_patrones: sesion '{}' usa {} patrones distintos (minimo {})",
                        id,
                        patterns.len(),
                        self.rules.min_distinct_patterns
                    ),
                ));
            }
        }

        for required in &self.rules.required_patterns {
            if !plan_patterns.contains(required.as_str()) {
                findings.push((
                    "training_plan.sessions".to_string(),
                    format!("cobertura_patrones: patron '{required}' no aparece en el plan"),
                ));
            }
        }

        findings
    }
}

impl SemanticValidator for K1Validator {
    fn name(&self) -> &str {
        "k1"
    }

    fn check(&self, value: &mut Value) -> SemanticReport {
        let mut report = SemanticReport::default();
        let sessions = value
            .pointer("/training_plan/sessions")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Self::check_session_ids(&sessions, &mut report.errors);
        Self::check_exercise_order(&sessions, &mut report.errors);
        Self::check_audit_trail(value, &sessions, &mut report.errors);

        let findings = self.coverage_findings(&sessions);
        match self.rules.severity {
            Severity::Error => {
                report.errors.extend(findings.into_iter().map(|(path, message)| {
                    FieldError::semantic(path, codes::PATTERN_COVERAGE, message)
                }));
            }
            Severity::Warning => {
                report.warnings = findings
                    .into_iter()
                    .map(|(_, message)| format!("{WARNING_PREFIX} {message}"))
                    .collect();
            }
        }

        if !report.errors.is_empty() {
            return report;
        }

        if let Some(rules) = value
            .pointer_mut("/k1_decisions/reglas_aplicadas")
            .and_then(Value::as_array_mut)
        {
            rules.extend(report.warnings.iter().cloned().map(Value::String));
        }

        // structure has already passed, so a failed typed read means raw
        // values where abstract levels belong
        if let Err(err) = TypedOutput::<TrainingPlanOutput>::new().from_json(value.clone()) {
            report
                .errors
                .push(FieldError::semantic(err.path, &err.code, err.message));
        }

        report
    }
}

fn blocks(session: &Value) -> &[Value] {
    array(session, "blocks")
}

fn array<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}
