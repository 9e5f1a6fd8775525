//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway
//! and the resilience primitives it wires together. All types derive Serde
//! traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::resilience::error::ErrorCode;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Default circuit breaker settings for every upstream.
    pub breaker: BreakerConfig,

    /// Retry configuration for idempotent upstream calls.
    pub retries: RetryConfig,

    /// Upstream service definitions.
    pub services: Vec<ServiceConfig>,

    /// Timeout configuration for the inbound side.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Name reported by the health endpoint.
    pub service_name: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            service_name: "api-gateway".to_string(),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,

    /// Time in milliseconds an open circuit waits before admitting a probe.
    pub reset_timeout_ms: u64,

    /// Per-call timeout in milliseconds.
    pub call_timeout_ms: u64,
}

impl BreakerConfig {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 60_000,
            call_timeout_ms: 10_000,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries in the gateway.
    pub enabled: bool,

    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,

    /// Base delay for backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Upper bound for a single backoff delay in milliseconds.
    pub max_delay_ms: u64,

    /// Double the delay on every attempt; constant delay otherwise.
    pub exponential_backoff: bool,

    /// Add 0-10% random jitter on top of each delay.
    pub jitter: bool,

    /// Network error codes that are always worth another attempt.
    pub retryable_error_codes: Vec<ErrorCode>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
            exponential_backoff: true,
            jitter: false,
            retryable_error_codes: vec![
                ErrorCode::ConnectionAborted,
                ErrorCode::TimedOut,
                ErrorCode::HostNotFound,
                ErrorCode::ConnectionReset,
            ],
        }
    }
}

/// Upstream service definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Service name used in `/api/{name}/...` and as breaker name.
    pub name: String,

    /// Base URL (e.g., "http://product-service:3009").
    pub url: String,

    /// Per-service breaker override.
    #[serde(default)]
    pub breaker: Option<BreakerConfig>,
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Total time an inbound request may take, including retries, in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 60 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the circuit administration routes.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breaker_defaults() {
        let config = BreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.reset_timeout(), Duration::from_secs(60));
        assert_eq!(config.call_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_retry_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.base_delay_ms, 1000);
        assert!(config.exponential_backoff);
        assert!(!config.jitter);
        assert_eq!(config.retryable_error_codes.len(), 4);
        assert!(!config.retryable_error_codes.contains(&ErrorCode::ConnectionRefused));
    }
}
