//! Upstream HTTP clients.
//!
//! # Data Flow
//! ```text
//! ServiceDirectory (name → ServiceClient)
//!     → ServiceClient (internal headers, latency window)
//!     → CircuitBreaker::execute (fail fast, call timeout)
//!     → Transport::call (reqwest by default)
//! ```

pub mod directory;
pub mod latency;
pub mod service;
pub mod transport;

pub use directory::ServiceDirectory;
pub use latency::LatencyStats;
pub use service::{ClientMetrics, ClientResult, ServiceClient};
pub use transport::{ReqwestTransport, Transport, UpstreamError, UpstreamRequest, UpstreamResponse};
