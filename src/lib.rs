//! Resilience toolkit and API gateway for the Flores Victoria storefront
//! services: circuit breakers, bounded retry with backoff, and a
//! breaker-guarded HTTP client per upstream service.

pub mod admin;
pub mod client;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use client::{ServiceClient, ServiceDirectory};
pub use config::schema::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use resilience::{BreakerRegistry, CircuitBreaker, CircuitState, ResilienceError, RetryPolicy};
