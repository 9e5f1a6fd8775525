//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to an upstream service:
//!     → retries.rs (optional outer layer: retry retryable failures with backoff)
//!     → circuit_breaker.rs (fail fast when open, enforce the per-call timeout,
//!       count failures, open the circuit at the threshold)
//!     → transport (the actual HTTP call)
//! ```
//!
//! # Design Decisions
//! - Every guarded call has a deadline
//! - The breaker never retries; retry is composed by the caller
//! - Errors are never swallowed, only classified and passed on
//! - Breakers are per process, one per upstream (registry.rs)

pub mod backoff;
pub mod circuit_breaker;
pub mod error;
pub mod registry;
pub mod retries;

pub use circuit_breaker::{BreakerStats, CircuitBreaker, CircuitSnapshot, CircuitState};
pub use error::{ErrorCode, ResilienceError, Retryable};
pub use registry::BreakerRegistry;
pub use retries::RetryPolicy;
