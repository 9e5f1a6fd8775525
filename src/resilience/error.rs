//! Error taxonomy shared by the breaker, the retry policy and the client.

use serde::{Deserialize, Serialize};
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Network-level failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    ConnectionAborted,
    ConnectionRefused,
    ConnectionReset,
    TimedOut,
    HostNotFound,
    HostUnreachable,
    BrokenPipe,
    Other,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConnectionAborted => "connection-aborted",
            ErrorCode::ConnectionRefused => "connection-refused",
            ErrorCode::ConnectionReset => "connection-reset",
            ErrorCode::TimedOut => "timed-out",
            ErrorCode::HostNotFound => "host-not-found",
            ErrorCode::HostUnreachable => "host-unreachable",
            ErrorCode::BrokenPipe => "broken-pipe",
            ErrorCode::Other => "other",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<io::ErrorKind> for ErrorCode {
    fn from(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::ConnectionAborted => ErrorCode::ConnectionAborted,
            io::ErrorKind::ConnectionRefused => ErrorCode::ConnectionRefused,
            io::ErrorKind::ConnectionReset => ErrorCode::ConnectionReset,
            io::ErrorKind::TimedOut => ErrorCode::TimedOut,
            io::ErrorKind::NotFound => ErrorCode::HostNotFound,
            io::ErrorKind::HostUnreachable | io::ErrorKind::NetworkUnreachable => {
                ErrorCode::HostUnreachable
            }
            io::ErrorKind::BrokenPipe => ErrorCode::BrokenPipe,
            _ => ErrorCode::Other,
        }
    }
}

/// Errors produced by a guarded call.
///
/// `CircuitOpen` never touches the network. `Timeout` and `Upstream` both
/// count as failures for the breaker.
#[derive(Debug, Error)]
pub enum ResilienceError<E> {
    #[error("circuit breaker '{name}' is open")]
    CircuitOpen { name: String, retry_after: Duration },

    #[error("call to '{name}' timed out after {}ms", .after.as_millis())]
    Timeout { name: String, after: Duration },

    #[error(transparent)]
    Upstream(E),
}

impl<E> ResilienceError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ResilienceError::CircuitOpen { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ResilienceError::Timeout { .. })
    }

    /// The wrapped operation's own error, if that is what failed.
    pub fn upstream(&self) -> Option<&E> {
        match self {
            ResilienceError::Upstream(e) => Some(e),
            _ => None,
        }
    }

}

/// What the retry policy needs to know about a failure.
pub trait Retryable {
    /// Network error code, if the failure has one.
    fn error_code(&self) -> Option<ErrorCode> {
        None
    }

    /// HTTP status of the response that caused the failure.
    fn status(&self) -> Option<u16> {
        None
    }

    /// False when the request never produced a response.
    fn response_received(&self) -> bool;

    /// Rejections from an open circuit are never retried.
    fn is_circuit_open(&self) -> bool {
        false
    }
}

impl<E: Retryable> Retryable for ResilienceError<E> {
    fn error_code(&self) -> Option<ErrorCode> {
        match self {
            ResilienceError::Timeout { .. } => Some(ErrorCode::TimedOut),
            ResilienceError::Upstream(e) => e.error_code(),
            ResilienceError::CircuitOpen { .. } => None,
        }
    }

    fn status(&self) -> Option<u16> {
        self.upstream().and_then(Retryable::status)
    }

    fn response_received(&self) -> bool {
        match self {
            ResilienceError::Upstream(e) => e.response_received(),
            ResilienceError::Timeout { .. } => false,
            ResilienceError::CircuitOpen { .. } => true,
        }
    }

    fn is_circuit_open(&self) -> bool {
        ResilienceError::is_circuit_open(self)
    }
}
