//! Retry logic.
//!
//! # Responsibilities
//! - Decide whether a failure is worth another attempt
//! - Execute retries with exponential backoff
//! - Bound the total number of attempts to `max_retries + 1`
//!
//! # Design Decisions
//! - Network failures and 5xx are retryable; 4xx never are
//! - Open-circuit rejections are never retried (they would only burn delay)
//! - No jitter unless the config asks for it
//! - The gateway only wraps idempotent methods in a policy

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::error::{ErrorCode, Retryable};

/// Bounded retry with backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    retryable_codes: HashSet<ErrorCode>,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        let retryable_codes = config.retryable_error_codes.iter().copied().collect();
        Self {
            config,
            retryable_codes,
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Retryable if the code is allow-listed, the status is 5xx, or no
    /// response was received at all.
    pub fn is_retryable<E: Retryable>(&self, error: &E) -> bool {
        if error.is_circuit_open() {
            return false;
        }
        if let Some(code) = error.error_code() {
            if self.retryable_codes.contains(&code) {
                return true;
            }
        }
        if let Some(status) = error.status() {
            return (500..600).contains(&status);
        }
        !error.response_received()
    }

    /// Delay after failed attempt number `attempt` (1-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, &self.config)
    }

    /// Run `operation` with the configured `max_retries`.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        self.execute_with(operation, self.config.max_retries).await
    }

    /// Run `operation`, retrying at most `max_retries` times.
    pub async fn execute_with<T, E, F, Fut>(&self, mut operation: F, max_retries: u32) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if attempt > max_retries {
                        if max_retries > 0 {
                            tracing::warn!(attempts = attempt, error = %e, "Retries exhausted");
                        }
                        return Err(e);
                    }
                    if !self.is_retryable(&e) {
                        tracing::debug!(attempt, error = %e, "Error is not retryable");
                        return Err(e);
                    }

                    let delay = self.delay_for(attempt);
                    tracing::info!(
                        attempt,
                        max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying after failure"
                    );
                    metrics::record_retry(retry_reason(&e));
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

fn retry_reason<E: Retryable>(error: &E) -> &'static str {
    match (error.error_code(), error.status()) {
        (Some(code), _) => code.as_str(),
        (None, Some(_)) => "status",
        (None, None) => "network",
    }
}
