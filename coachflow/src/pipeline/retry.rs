//! Per-stage retry budgets with configurable backoff and jitter.
//!
//! Validation failures are retried immediately with feedback; invocation
//! failures and timeouts are retried after a backoff delay.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::ErrorKind;

/// Backoff strategy for retry delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// delay = base * 2^retry
    #[default]
    Exponential,
    /// delay = base * (retry + 1)
    Linear,
    /// delay = base
    Constant,
}

/// Jitter strategy applied on top of the backoff delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter
    None,
    /// Random from 0 to delay
    #[default]
    Full,
    /// Half fixed, half random
    Equal,
    /// min(max, random(base, prev * 3))
    Decorrelated,
}

/// Retry budgets of a single stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Re-invocations allowed after structural or semantic rejection.
    #[serde(default = "default_validation_retries")]
    pub max_validation_retries: u32,
    /// Re-invocations allowed after runtime errors or timeouts.
    #[serde(default = "default_invocation_retries")]
    pub max_invocation_retries: u32,
    /// Base backoff delay in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Backoff cap in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Backoff strategy.
    #[serde(default)]
    pub backoff: BackoffStrategy,
    /// Jitter strategy.
    #[serde(default)]
    pub jitter: JitterStrategy,
}

fn default_validation_retries() -> u32 {
    2
}

fn default_invocation_retries() -> u32 {
    2
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_validation_retries: default_validation_retries(),
            max_invocation_retries: default_invocation_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff: BackoffStrategy::default(),
            jitter: JitterStrategy::default(),
        }
    }
}

impl RetryPolicy {
    /// Creates the default policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that never retries.
    #[must_use]
    pub fn no_retries() -> Self {
        Self::default()
            .with_max_validation_retries(0)
            .with_max_invocation_retries(0)
    }

    /// Sets the validation retry budget.
    #[must_use]
    pub fn with_max_validation_retries(mut self, retries: u32) -> Self {
        self.max_validation_retries = retries;
        self
    }

    /// Sets the invocation retry budget.
    #[must_use]
    pub fn with_max_invocation_retries(mut self, retries: u32) -> Self {
        self.max_invocation_retries = retries;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the backoff strategy.
    #[must_use]
    pub fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff = strategy;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, strategy: JitterStrategy) -> Self {
        self.jitter = strategy;
        self
    }

    /// Retry budget for a failure kind. Cancellation has none.
    #[must_use]
    pub fn budget_for(&self, kind: ErrorKind) -> u32 {
        match kind {
            ErrorKind::StructuralValidation | ErrorKind::SemanticValidation => {
                self.max_validation_retries
            }
            ErrorKind::InvocationFailure | ErrorKind::Timeout => self.max_invocation_retries,
            ErrorKind::Cancelled => 0,
        }
    }

    /// Backoff before invocation retry number `retry` (0-based).
    ///
    /// `previous` is the last delay used for this stage, consulted by
    /// decorrelated jitter.
    #[must_use]
    pub fn delay_for(&self, retry: u32, previous: Option<Duration>) -> Duration {
        let base = self.base_delay_ms;
        let max = self.max_delay_ms;

        let delay = match self.backoff {
            BackoffStrategy::Exponential => base.saturating_mul(2u64.saturating_pow(retry)),
            BackoffStrategy::Linear => base.saturating_mul(u64::from(retry) + 1),
            BackoffStrategy::Constant => base,
        }
        .min(max);

        let jittered = match self.jitter {
            JitterStrategy::None => delay,
            JitterStrategy::Full => {
                if delay == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..=delay)
                }
            }
            JitterStrategy::Equal => {
                let half = delay / 2;
                if half == 0 {
                    delay
                } else {
                    half + rand::thread_rng().gen_range(0..=half)
                }
            }
            JitterStrategy::Decorrelated => {
                let prev = previous.map_or(base, |d| {
                    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
                });
                let upper = prev.saturating_mul(3).min(max);
                if upper <= base {
                    base.min(max)
                } else {
                    rand::thread_rng().gen_range(base..=upper)
                }
            }
        };

        Duration::from_millis(jittered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_validation_retries, 2);
        assert_eq!(policy.max_invocation_retries, 2);
        assert_eq!(policy.backoff, BackoffStrategy::Exponential);
        assert_eq!(policy.jitter, JitterStrategy::Full);

        let parsed: RetryPolicy = serde_json::from_str(r#"{"jitter": "none"}"#).unwrap();
        assert_eq!(parsed.max_invocation_retries, 2);
        assert_eq!(parsed.jitter, JitterStrategy::None);
    }

    #[test]
    fn test_budget_for_kind() {
        let policy = RetryPolicy::new()
            .with_max_validation_retries(1)
            .with_max_invocation_retries(3);
        assert_eq!(policy.budget_for(ErrorKind::StructuralValidation), 1);
        assert_eq!(policy.budget_for(ErrorKind::SemanticValidation), 1);
        assert_eq!(policy.budget_for(ErrorKind::Timeout), 3);
        assert_eq!(policy.budget_for(ErrorKind::Cancelled), 0);
        assert_eq!(RetryPolicy::no_retries().budget_for(ErrorKind::Timeout), 0);
    }

    #[test]
    fn test_exponential_and_linear_without_jitter() {
        let exp = RetryPolicy::new()
            .with_base_delay_ms(100)
            .with_jitter(JitterStrategy::None);
        assert_eq!(exp.delay_for(0, None), Duration::from_millis(100));
        assert_eq!(exp.delay_for(1, None), Duration::from_millis(200));
        assert_eq!(exp.delay_for(2, None), Duration::from_millis(400));

        let linear = exp.clone().with_backoff(BackoffStrategy::Linear);
        assert_eq!(linear.delay_for(2, None), Duration::from_millis(300));

        let constant = exp.with_backoff(BackoffStrategy::Constant);
        assert_eq!(constant.delay_for(7, None), Duration::from_millis(100));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let policy = RetryPolicy::new()
            .with_base_delay_ms(1000)
            .with_max_delay_ms(5000)
            .with_jitter(JitterStrategy::None);
        assert_eq!(policy.delay_for(10, None), Duration::from_millis(5000));
    }

    #[test]
    fn test_jitter_bounds() {
        let full = RetryPolicy::new()
            .with_base_delay_ms(100)
            .with_backoff(BackoffStrategy::Constant);
        for _ in 0..20 {
            assert!(full.delay_for(0, None) <= Duration::from_millis(100));
        }

        let equal = full.clone().with_jitter(JitterStrategy::Equal);
        for _ in 0..20 {
            let d = equal.delay_for(0, None);
            assert!(d >= Duration::from_millis(50) && d <= Duration::from_millis(100));
        }

        let decorrelated = full.with_jitter(JitterStrategy::Decorrelated);
        for _ in 0..20 {
            let d = decorrelated.delay_for(1, Some(Duration::from_millis(200)));
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(600));
        }
    }
}
