//! Breaker-guarded HTTP client for one upstream service.

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use uuid::Uuid;

use crate::client::latency::{LatencyStats, LatencyWindow};
use crate::client::transport::{Transport, UpstreamError, UpstreamRequest, UpstreamResponse};
use crate::observability::metrics;
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitSnapshot};
use crate::resilience::error::ResilienceError;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const SERVICE_NAME_HEADER: &str = "x-service-name";
pub const INTERNAL_REQUEST_HEADER: &str = "x-internal-request";

pub type ClientResult<T> = Result<T, ResilienceError<UpstreamError>>;

#[derive(Debug, Default)]
struct ClientLatency {
    successful: LatencyWindow,
    failed: LatencyWindow,
}

/// Latency and breaker view of one client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientMetrics {
    pub service: String,
    pub circuit: CircuitSnapshot,
    pub successful: LatencyStats,
    pub failed: LatencyStats,
}

/// HTTP client for one named service. Every call goes through the service's
/// breaker; the client never retries on its own.
#[derive(Clone)]
pub struct ServiceClient {
    name: String,
    base_url: String,
    breaker: Arc<CircuitBreaker>,
    transport: Arc<dyn Transport>,
    latency: Arc<Mutex<ClientLatency>>,
}

impl std::fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceClient")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("state", &self.breaker.state())
            .finish()
    }
}

impl ServiceClient {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        breaker: Arc<CircuitBreaker>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            breaker,
            transport,
            latency: Arc::new(Mutex::new(ClientLatency::default())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Absolute URL for `path`. `path` is appended as-is, query included.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    pub async fn get(&self, path: &str) -> ClientResult<UpstreamResponse> {
        self.request(UpstreamRequest::new(Method::GET, self.url(path)))
            .await
    }

    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ClientResult<UpstreamResponse> {
        let request = self.json_request(Method::POST, path, body)?;
        self.request(request).await
    }

    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ClientResult<UpstreamResponse> {
        let request = self.json_request(Method::PUT, path, body)?;
        self.request(request).await
    }

    pub async fn delete(&self, path: &str) -> ClientResult<UpstreamResponse> {
        self.request(UpstreamRequest::new(Method::DELETE, self.url(path)))
            .await
    }

    /// Send `request` through the breaker. Internal headers are added unless
    /// the caller already set them.
    pub async fn request(&self, mut request: UpstreamRequest) -> ClientResult<UpstreamResponse> {
        let has_body = request.body.is_some();
        self.apply_internal_headers(&mut request.headers, has_body);

        let method = request.method.clone();
        let url = request.url.clone();
        let start = Instant::now();

        let result = self
            .breaker
            .execute(|| self.transport.call(request))
            .await;

        let outcome = outcome_label(&result);
        if !matches!(result, Err(ResilienceError::CircuitOpen { .. })) {
            self.record_latency(result.is_ok(), start);
        }
        metrics::record_upstream_request(&self.name, method.as_str(), &outcome, start);

        match &result {
            Ok(response) => tracing::debug!(
                service = %self.name,
                method = %method,
                url = %url,
                status = response.status.as_u16(),
                "Upstream call succeeded"
            ),
            Err(ResilienceError::CircuitOpen { .. }) => tracing::warn!(
                service = %self.name,
                method = %method,
                url = %url,
                "Upstream call rejected, circuit open"
            ),
            Err(e) => tracing::error!(
                service = %self.name,
                method = %method,
                url = %url,
                error = %e,
                "Upstream call failed"
            ),
        }

        result
    }

    /// Breaker snapshot for this service.
    pub fn circuit_breaker_state(&self) -> CircuitSnapshot {
        self.breaker.snapshot()
    }

    pub fn metrics(&self) -> ClientMetrics {
        let latency = self.latency.lock().unwrap_or_else(PoisonError::into_inner);
        ClientMetrics {
            service: self.name.clone(),
            circuit: self.breaker.snapshot(),
            successful: latency.successful.stats(),
            failed: latency.failed.stats(),
        }
    }

    fn json_request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> ClientResult<UpstreamRequest> {
        let bytes = serde_json::to_vec(body)
            .map_err(|e| ResilienceError::Upstream(UpstreamError::InvalidRequest(e.to_string())))?;
        let mut request = UpstreamRequest::new(method, self.url(path));
        request.body = Some(Bytes::from(bytes));
        Ok(request)
    }

    fn apply_internal_headers(&self, headers: &mut HeaderMap, has_body: bool) {
        if !headers.contains_key(REQUEST_ID_HEADER) {
            if let Ok(id) = HeaderValue::from_str(&Uuid::new_v4().to_string()) {
                headers.insert(REQUEST_ID_HEADER, id);
            }
        }
        if let Ok(service) = HeaderValue::from_str(&self.name) {
            headers.insert(SERVICE_NAME_HEADER, service);
        }
        headers.insert(INTERNAL_REQUEST_HEADER, HeaderValue::from_static("true"));
        if has_body && !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
    }

    fn record_latency(&self, success: bool, start: Instant) {
        let mut latency = self.latency.lock().unwrap_or_else(PoisonError::into_inner);
        let window = if success {
            &mut latency.successful
        } else {
            &mut latency.failed
        };
        window.record(start.elapsed());
    }
}

fn outcome_label(result: &ClientResult<UpstreamResponse>) -> String {
    match result {
        Ok(response) => response.status.as_u16().to_string(),
        Err(ResilienceError::CircuitOpen { .. }) => "circuit_open".to_string(),
        Err(ResilienceError::Timeout { .. }) => "timeout".to_string(),
        Err(ResilienceError::Upstream(e)) => match e {
            UpstreamError::Status { status, .. } => status.as_u16().to_string(),
            UpstreamError::Network { code, .. } => code.as_str().to_string(),
            UpstreamError::InvalidRequest(_) => "invalid_request".to_string(),
            UpstreamError::Decode(_) => "decode".to_string(),
        },
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::BreakerConfig;
    use crate::resilience::circuit_breaker::CircuitState;
    use crate::resilience::error::ErrorCode;
    use futures_util::future::BoxFuture;
    use reqwest::StatusCode;
    use std::collections::VecDeque;

    /// Transport answering from a script and recording what it was sent.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        replies: Mutex<VecDeque<Result<UpstreamResponse, UpstreamError>>>,
        pub(crate) seen: Mutex<Vec<UpstreamRequest>>,
    }

    impl ScriptedTransport {
        pub(crate) fn push_status(&self, status: StatusCode, body: &'static str) {
            let reply = if status.is_success() {
                Ok(UpstreamResponse {
                    status,
                    headers: HeaderMap::new(),
                    body: Bytes::from_static(body.as_bytes()),
                })
            } else {
                Err(UpstreamError::Status {
                    status,
                    headers: HeaderMap::new(),
                    body: Bytes::from_static(body.as_bytes()),
                })
            };
            self.replies.lock().unwrap().push_back(reply);
        }

        pub(crate) fn push_network(&self, code: ErrorCode) {
            self.replies.lock().unwrap().push_back(Err(UpstreamError::Network {
                code,
                message: code.to_string(),
            }));
        }

        pub(crate) fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    impl Transport for ScriptedTransport {
        fn call(&self, request: UpstreamRequest) -> BoxFuture<'_, Result<UpstreamResponse, UpstreamError>> {
            self.seen.lock().unwrap().push(request);
            let reply = self.replies.lock().unwrap().pop_front().unwrap_or_else(|| {
                Err(UpstreamError::Network {
                    code: ErrorCode::ConnectionRefused,
                    message: "script exhausted".into(),
                })
            });
            Box::pin(async move { reply })
        }
    }

    fn client(transport: Arc<ScriptedTransport>, threshold: u32) -> ServiceClient {
        let breaker = Arc::new(CircuitBreaker::new(
            "product",
            BreakerConfig {
                failure_threshold: threshold,
                reset_timeout_ms: 1_000,
                call_timeout_ms: 500,
            },
        ));
        ServiceClient::new("product", "http://product-service:3009/", breaker, transport)
    }

    #[test]
    fn builds_urls() {
        let c = client(Arc::new(ScriptedTransport::default()), 3);
        assert_eq!(c.url("/products?limit=5"), "http://product-service:3009/products?limit=5");
        assert_eq!(c.url("products"), "http://product-service:3009/products");
    }

    #[tokio::test]
    async fn get_adds_internal_headers() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push_status(StatusCode::OK, r#"{"items": []}"#);
        let c = client(Arc::clone(&transport), 3);

        let response = c.get("/products").await.unwrap();
        assert_eq!(response.status, StatusCode::OK);

        let seen = transport.seen.lock().unwrap();
        let headers = &seen[0].headers;
        assert_eq!(headers[SERVICE_NAME_HEADER], "product");
        assert_eq!(headers[INTERNAL_REQUEST_HEADER], "true");
        assert!(headers.contains_key(REQUEST_ID_HEADER));
        assert!(!headers.contains_key(CONTENT_TYPE));
    }

    #[tokio::test]
    async fn post_serializes_json_and_keeps_request_id() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push_status(StatusCode::CREATED, "{}");
        let c = client(Arc::clone(&transport), 3);

        let mut request = c.json_request(Method::POST, "/orders", &serde_json::json!({"qty": 2})).unwrap();
        request
            .headers
            .insert(REQUEST_ID_HEADER, HeaderValue::from_static("req-42"));
        c.request(request).await.unwrap();

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].method, Method::POST);
        assert_eq!(seen[0].headers[REQUEST_ID_HEADER], "req-42");
        assert_eq!(seen[0].headers[CONTENT_TYPE], "application/json");
        assert_eq!(seen[0].body.as_deref(), Some(&br#"{"qty":2}"#[..]));
    }

    #[tokio::test]
    async fn server_errors_open_the_circuit() {
        let transport = Arc::new(ScriptedTransport::default());
        for _ in 0..3 {
            transport.push_status(StatusCode::SERVICE_UNAVAILABLE, "down");
        }
        let c = client(Arc::clone(&transport), 3);

        for _ in 0..3 {
            let err = c.get("/products").await.unwrap_err();
            assert_eq!(
                err.upstream().and_then(|e| e.status_code()),
                Some(StatusCode::SERVICE_UNAVAILABLE)
            );
        }
        assert_eq!(c.circuit_breaker_state().state, CircuitState::Open);

        let err = c.get("/products").await.unwrap_err();
        assert!(err.is_circuit_open());
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn client_errors_count_as_failures() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push_status(StatusCode::NOT_FOUND, "missing");
        let c = client(Arc::clone(&transport), 3);

        assert!(c.delete("/products/9").await.is_err());
        assert_eq!(c.circuit_breaker_state().failure_count, 1);
    }

    #[tokio::test]
    async fn metrics_split_success_and_failure() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push_status(StatusCode::OK, "{}");
        transport.push_network(ErrorCode::ConnectionReset);
        transport.push_status(StatusCode::OK, "{}");
        let c = client(Arc::clone(&transport), 5);

        let _ = c.get("/a").await;
        let _ = c.get("/b").await;
        let _ = c.get("/c").await;

        let m = c.metrics();
        assert_eq!(m.service, "product");
        assert_eq!(m.successful.count, 2);
        assert_eq!(m.failed.count, 1);
        assert_eq!(m.circuit.stats.total_requests, 3);
    }
}
