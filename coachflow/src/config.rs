//! Configuration of plan pipelines and the HTTP agent runtime.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::errors::ConfigError;
use crate::pipeline::RetryPolicy;
use crate::plan::{CoverageRules, Severity};

/// Overrides the per-call agent timeout, in seconds.
pub const ENV_STAGE_TIMEOUT_SECS: &str = "COACHFLOW_STAGE_TIMEOUT_SECS";
/// Overrides the validation retry budget.
pub const ENV_MAX_VALIDATION_RETRIES: &str = "COACHFLOW_MAX_VALIDATION_RETRIES";
/// Overrides the invocation retry budget.
pub const ENV_MAX_INVOCATION_RETRIES: &str = "COACHFLOW_MAX_INVOCATION_RETRIES";
/// Overrides the coverage severity (`warning` or `error`).
pub const ENV_COVERAGE_SEVERITY: &str = "COACHFLOW_COVERAGE_SEVERITY";

/// Settings of a plan pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Per-call agent timeout in seconds.
    #[serde(default = "default_stage_timeout_secs")]
    pub stage_timeout_secs: u64,
    /// Retry budgets and backoff.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Movement-pattern coverage rules of the training-plan stage.
    #[serde(default)]
    pub coverage: CoverageRules,
}

fn default_stage_timeout_secs() -> u64 {
    180
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stage_timeout_secs: default_stage_timeout_secs(),
            retry: RetryPolicy::default(),
            coverage: CoverageRules::default(),
        }
    }
}

impl PipelineConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON document; missing keys take their defaults.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Defaults overridden by the `COACHFLOW_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides read through `lookup`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parsed(&lookup, ENV_STAGE_TIMEOUT_SECS)? {
            self.stage_timeout_secs = v;
        }
        if let Some(v) = parsed(&lookup, ENV_MAX_VALIDATION_RETRIES)? {
            self.retry.max_validation_retries = v;
        }
        if let Some(v) = parsed(&lookup, ENV_MAX_INVOCATION_RETRIES)? {
            self.retry.max_invocation_retries = v;
        }
        if let Some(raw) = lookup(ENV_COVERAGE_SEVERITY) {
            self.coverage.severity = match raw.trim().to_ascii_lowercase().as_str() {
                "warning" | "warn" => Severity::Warning,
                "error" => Severity::Error,
                _ => return Err(invalid(ENV_COVERAGE_SEVERITY, &raw)),
            };
        }
        Ok(self)
    }

    /// Sets the per-call agent timeout.
    #[must_use]
    pub fn with_stage_timeout_secs(mut self, secs: u64) -> Self {
        self.stage_timeout_secs = secs;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the coverage rules.
    #[must_use]
    pub fn with_coverage(mut self, coverage: CoverageRules) -> Self {
        self.coverage = coverage;
        self
    }

    /// The per-call agent timeout.
    #[must_use]
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }
}

/// Settings of the HTTP agent runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRuntimeConfig {
    /// Base URL of the agent service.
    pub base_url: String,
    /// Bearer token, if the service requires one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Transport-level timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    240
}

impl HttpRuntimeConfig {
    /// Creates a configuration for `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    /// Sets the bearer token.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

fn parsed<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| raw.trim().parse().map_err(|_| invalid(key, &raw)))
        .transpose()
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}
