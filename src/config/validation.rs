//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and referential
//! sanity. All errors are collected, not just the first.

use std::collections::HashSet;
use thiserror::Error;
use url::Url;

use crate::config::schema::{BreakerConfig, GatewayConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{scope}: failure_threshold must be greater than zero")]
    ZeroFailureThreshold { scope: String },

    #[error("{scope}: {field} must be greater than zero")]
    ZeroTimeout { scope: String, field: &'static str },

    #[error("retries: base_delay_ms ({base}) exceeds max_delay_ms ({max})")]
    DelayBounds { base: u64, max: u64 },

    #[error("service '{name}': invalid url '{url}'")]
    InvalidUrl { name: String, url: String },

    #[error("service name must not be empty")]
    EmptyServiceName,

    #[error("service '{0}' is defined more than once")]
    DuplicateService(String),

    #[error("listener: invalid bind address '{0}'")]
    InvalidBindAddress(String),

    #[error("admin: api_key must not be empty when admin is enabled")]
    EmptyApiKey,
}

/// Validate a configuration, returning every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    check_breaker("breaker", &config.breaker, &mut errors);

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout {
            scope: "timeouts".to_string(),
            field: "request_secs",
        });
    }

    if config.retries.base_delay_ms > config.retries.max_delay_ms {
        errors.push(ValidationError::DelayBounds {
            base: config.retries.base_delay_ms,
            max: config.retries.max_delay_ms,
        });
    }

    let mut seen = HashSet::new();
    for service in &config.services {
        if service.name.trim().is_empty() {
            errors.push(ValidationError::EmptyServiceName);
            continue;
        }
        if !seen.insert(service.name.as_str()) {
            errors.push(ValidationError::DuplicateService(service.name.clone()));
        }
        match Url::parse(&service.url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => errors.push(ValidationError::InvalidUrl {
                name: service.name.clone(),
                url: service.url.clone(),
            }),
        }
        if let Some(breaker) = &service.breaker {
            check_breaker(&format!("service '{}'", service.name), breaker, &mut errors);
        }
    }

    if config.admin.enabled && config.admin.api_key.is_empty() {
        errors.push(ValidationError::EmptyApiKey);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_breaker(scope: &str, breaker: &BreakerConfig, errors: &mut Vec<ValidationError>) {
    if breaker.failure_threshold == 0 {
        errors.push(ValidationError::ZeroFailureThreshold {
            scope: scope.to_string(),
        });
    }
    if breaker.reset_timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout {
            scope: scope.to_string(),
            field: "reset_timeout_ms",
        });
    }
    if breaker.call_timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout {
            scope: scope.to_string(),
            field: "call_timeout_ms",
        });
    }
}
