//! Response construction and error mapping.
//!
//! # Responsibilities
//! - Turn an upstream response into a client response
//! - Map breaker and transport errors to status codes and JSON bodies
//!
//! # Mapping
//! ```text
//! CircuitOpen                 → 503 + Retry-After
//! Network(connection-refused) → 503
//! Status { .. }               → forwarded as received
//! anything else               → 500
//! ```

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use std::time::Duration;

use crate::client::{UpstreamError, UpstreamResponse};
use crate::http::request::response_headers;
use crate::resilience::error::{ErrorCode, ResilienceError};

/// JSON envelope for gateway-generated errors.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

/// 5xx-style error: `status = "error"`.
pub fn error(status: StatusCode, message: impl Into<String>) -> Response {
    let body = ErrorBody {
        status: "error",
        message: message.into(),
        code: None,
        retry_after: None,
    };
    (status, Json(body)).into_response()
}

/// Client-side error: `status = "fail"`.
pub fn fail(status: StatusCode, message: impl Into<String>) -> Response {
    let body = ErrorBody {
        status: "fail",
        message: message.into(),
        code: None,
        retry_after: None,
    };
    (status, Json(body)).into_response()
}

pub fn route_not_found() -> Response {
    fail(StatusCode::NOT_FOUND, "Route not found")
}

/// Rounded up to whole seconds, at least one.
fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}

fn circuit_open(name: &str, retry_after: Duration) -> Response {
    let secs = retry_after_secs(retry_after);
    let body = ErrorBody {
        status: "error",
        message: format!("Service '{}' is temporarily unavailable", name),
        code: Some("SERVICE_UNAVAILABLE"),
        retry_after: Some(secs),
    };
    let mut response = (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(secs));
    response
}

/// Forward a successful upstream response.
pub fn forward(upstream: UpstreamResponse) -> Response {
    passthrough(upstream.status, &upstream.headers, upstream.body)
}

fn passthrough(status: StatusCode, headers: &HeaderMap, body: Bytes) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = response_headers(headers);
    response
}

/// Map a failed upstream call to the client response.
pub fn upstream_error(err: ResilienceError<UpstreamError>) -> Response {
    match err {
        ResilienceError::CircuitOpen { name, retry_after } => circuit_open(&name, retry_after),
        ResilienceError::Upstream(UpstreamError::Network {
            code: ErrorCode::ConnectionRefused,
            ..
        }) => error(StatusCode::SERVICE_UNAVAILABLE, "Service temporarily unavailable"),
        ResilienceError::Upstream(UpstreamError::Status {
            status,
            headers,
            body,
        }) => passthrough(status, &headers, body),
        ResilienceError::Timeout { .. } | ResilienceError::Upstream(_) => {
            error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}
