//! HTTP transport abstraction.
//!
//! # Responsibilities
//! - Describe one upstream request/response pair
//! - Classify transport failures (no response vs. non-2xx response)
//! - Provide the default transport over `reqwest`
//!
//! # Design Decisions
//! - Non-2xx responses are errors, so they count against the breaker
//! - The transport itself never retries and has no timeout of its own;
//!   the breaker owns the deadline

use bytes::Bytes;
use futures_util::future::BoxFuture;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::error::Error as StdError;
use thiserror::Error;

use crate::resilience::error::{ErrorCode, Retryable};

/// A request to an upstream service. `url` is absolute.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl UpstreamRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

/// A successful (2xx) upstream response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl UpstreamResponse {
    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, UpstreamError> {
        serde_json::from_slice(&self.body).map_err(|e| UpstreamError::Decode(e.to_string()))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Transport-level failure of an upstream call.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    /// No response was received.
    #[error("network error ({code}): {message}")]
    Network { code: ErrorCode, message: String },

    /// A response was received with a non-2xx status.
    #[error("upstream responded with {status}")]
    Status {
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
    },

    /// The request could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl UpstreamError {
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn network_code(&self) -> Option<ErrorCode> {
        match self {
            UpstreamError::Network { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl Retryable for UpstreamError {
    fn error_code(&self) -> Option<ErrorCode> {
        self.network_code()
    }

    fn status(&self) -> Option<u16> {
        self.status_code().map(|s| s.as_u16())
    }

    fn response_received(&self) -> bool {
        !matches!(self, UpstreamError::Network { .. })
    }
}

/// Something that can perform an upstream HTTP call.
pub trait Transport: Send + Sync {
    fn call(&self, request: UpstreamRequest) -> BoxFuture<'_, Result<UpstreamResponse, UpstreamError>>;
}

/// Default transport over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport for internal traffic: no system proxy.
    pub fn new() -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .no_proxy()
            .build()
            .map_err(|e| UpstreamError::InvalidRequest(e.to_string()))?;
        Ok(Self { client })
    }

    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, UpstreamError> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(classify_reqwest_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(classify_reqwest_error)?;

        if status.is_success() {
            Ok(UpstreamResponse {
                status,
                headers,
                body,
            })
        } else {
            Err(UpstreamError::Status {
                status,
                headers,
                body,
            })
        }
    }
}

impl Transport for ReqwestTransport {
    fn call(&self, request: UpstreamRequest) -> BoxFuture<'_, Result<UpstreamResponse, UpstreamError>> {
        Box::pin(self.send(request))
    }
}

/// Map a `reqwest` failure onto a network code or an invalid request.
pub fn classify_reqwest_error(error: reqwest::Error) -> UpstreamError {
    if error.is_builder() {
        return UpstreamError::InvalidRequest(error.to_string());
    }

    let code = if error.is_timeout() {
        ErrorCode::TimedOut
    } else if error.is_connect() && looks_like_dns_failure(&error) {
        // Resolver failures arrive wrapped in an io::Error of kind Other.
        ErrorCode::HostNotFound
    } else if let Some(io) = find_io_error(&error) {
        ErrorCode::from(io.kind())
    } else {
        ErrorCode::Other
    };

    UpstreamError::Network {
        code,
        message: error.to_string(),
    }
}

fn find_io_error<'a>(error: &'a (dyn StdError + 'static)) -> Option<&'a std::io::Error> {
    let mut source = error.source();
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            return Some(io);
        }
        source = err.source();
    }
    None
}

fn looks_like_dns_failure(error: &(dyn StdError + 'static)) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = Some(error);
    while let Some(err) = source {
        let message = err.to_string();
        if message.contains("dns error") || message.contains("failed to lookup address") {
            return true;
        }
        source = err.source();
    }
    false
}
