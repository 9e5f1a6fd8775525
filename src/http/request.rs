//! Request identification and forwarding helpers.
//!
//! # Responsibilities
//! - Assign an `X-Request-ID` (UUID v4) to inbound requests lacking one
//! - Echo it on the response
//! - Copy forwardable headers onto the upstream request
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Hop-by-hop headers are never forwarded

use axum::http::{header, HeaderMap, HeaderName};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

const HOP_BY_HOP: &[HeaderName] = &[
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid)
}

pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(X_REQUEST_ID)
}

/// Request ID of an inbound request, if present and valid UTF-8.
pub fn request_id(headers: &HeaderMap) -> Option<&str> {
    headers.get(X_REQUEST_ID).and_then(|v| v.to_str().ok())
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(name) || name.as_str() == "keep-alive"
}

/// Headers to send upstream: everything except hop-by-hop, `Host` and
/// `Content-Length` (recomputed by the client).
pub fn forwardable_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(inbound.len());
    for (name, value) in inbound {
        if is_hop_by_hop(name) || name == header::HOST || name == header::CONTENT_LENGTH {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

/// Headers to send back to the client from an upstream response.
pub fn response_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(upstream.len());
    for (name, value) in upstream {
        if is_hop_by_hop(name) || name == header::CONTENT_LENGTH {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn strips_hop_by_hop_and_host() {
        let mut inbound = HeaderMap::new();
        inbound.insert(header::HOST, HeaderValue::from_static("gateway:3000"));
        inbound.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        inbound.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        inbound.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        inbound.insert(X_REQUEST_ID, HeaderValue::from_static("req-1"));

        let forwarded = forwardable_headers(&inbound);
        assert!(!forwarded.contains_key(header::HOST));
        assert!(!forwarded.contains_key(header::CONNECTION));
        assert!(!forwarded.contains_key("keep-alive"));
        assert_eq!(forwarded[header::AUTHORIZATION], "Bearer abc");
        assert_eq!(request_id(&forwarded), Some("req-1"));
    }
}
