//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Breakers, retry policy, clients and the gateway produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout log collection
//!     → Prometheus scrape endpoint
//!     → /health and /health/circuits JSON (breaker snapshots)
//! ```
//!
//! # Design Decisions
//! - Events are logged where they happen (transitions, retries, failures)
//! - Request ID flows from the inbound request to every upstream call
//! - Metric updates are cheap and no-ops without a recorder

pub mod logging;
pub mod metrics;
