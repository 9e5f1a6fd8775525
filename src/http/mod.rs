//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID, forwardable headers)
//!     → client::ServiceDirectory picks the upstream client
//!     → RetryPolicy (idempotent methods only) → ServiceClient → breaker
//!     → response.rs (forward response or map the error)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
