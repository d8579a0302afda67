//! Retry loop around a single client operation.
//!
//! Only timeout-classified faults are retried. A rejected store, a miss and
//! every other fault surface on the first attempt.

use std::time::Duration;

use crate::error::Result;

/// Timeout and retry settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Per-attempt timeout applied by the transport; informational here.
    pub timeout: Option<Duration>,
    /// Retries after the first attempt.
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: None,
            max_retries: 5,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OperationExecutor {
    policy: RetryPolicy,
}

impl OperationExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run `attempt` until it succeeds, fails with a non-retryable error, or
    /// `max_retries` retries are used up. The closure receives the zero-based
    /// attempt number.
    pub fn execute<R, F>(&self, operation: &'static str, mut attempt: F) -> Result<R>
    where
        F: FnMut(u32) -> Result<R>,
    {
        let mut retries = 0;
        loop {
            metrics::counter!("cache_client_attempts_total", "operation" => operation).increment(1);
            let err = match attempt(retries) {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retryable() {
                return Err(err);
            }
            if retries >= self.policy.max_retries {
                metrics::counter!("cache_client_timeouts_total", "operation" => operation).increment(1);
                tracing::warn!(operation, attempts = retries + 1, error = %err, "giving up after timeouts");
                return Err(err);
            }

            retries += 1;
            metrics::counter!("cache_client_retries_total", "operation" => operation).increment(1);
            tracing::warn!(
                operation,
                retry = retries,
                max_retries = self.policy.max_retries,
                error = %err,
                "operation timed out, retrying"
            );
        }
    }
}
