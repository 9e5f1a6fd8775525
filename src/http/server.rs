//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, request timeout)
//! - Bind server to listener
//! - Forward `/api/{service}/...` requests through the service's client
//! - Serve breaker health endpoints
//! - Swap the live config on reload; the request timeout, the admin switch
//!   and breaker settings follow it without a restart

use arc_swap::ArcSwap;
use axum::{
    body::{to_bytes, Body},
    extract::{Path, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::trace::TraceLayer;

use crate::admin::setup_admin_router;
use crate::client::{ReqwestTransport, ServiceDirectory, Transport, UpstreamError, UpstreamRequest};
use crate::config::GatewayConfig;
use crate::http::request::{
    forwardable_headers, propagate_request_id_layer, request_id, set_request_id_layer,
};
use crate::http::response;
use crate::resilience::circuit_breaker::CircuitSnapshot;
use crate::resilience::registry::BreakerRegistry;
use crate::resilience::retries::RetryPolicy;

/// Inbound bodies are buffered so they can be replayed on retry.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Everything derived from one version of the config.
pub struct RuntimeState {
    pub config: GatewayConfig,
    pub directory: ServiceDirectory,
    pub retry: RetryPolicy,
}

impl RuntimeState {
    fn build(config: GatewayConfig, registry: &BreakerRegistry, transport: Arc<dyn Transport>) -> Self {
        let directory = ServiceDirectory::from_config(&config, registry, transport);
        let retry = RetryPolicy::new(config.retries.clone());
        Self {
            config,
            directory,
            retry,
        }
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<ArcSwap<RuntimeState>>,
    /// Outlives config reloads so circuit state survives them.
    pub registry: Arc<BreakerRegistry>,
    transport: Arc<dyn Transport>,
}

impl AppState {
    pub fn new(config: GatewayConfig, transport: Arc<dyn Transport>) -> Self {
        let registry = Arc::new(BreakerRegistry::new());
        let runtime = RuntimeState::build(config, &registry, Arc::clone(&transport));
        Self {
            inner: Arc::new(ArcSwap::from_pointee(runtime)),
            registry,
            transport,
        }
    }

    /// Replace the live config. Existing breakers keep their state and take
    /// on the new breaker settings.
    pub fn reload(&self, config: GatewayConfig) {
        for section in restart_required(&self.inner.load().config, &config) {
            tracing::warn!(section, "Config section changed; takes effect after a restart");
        }
        let runtime = RuntimeState::build(config, &self.registry, Arc::clone(&self.transport));
        tracing::info!(services = runtime.directory.len(), "Configuration reloaded");
        self.inner.store(Arc::new(runtime));
    }
}

/// Sections that only apply at startup and differ between `current` and `next`.
pub fn restart_required(current: &GatewayConfig, next: &GatewayConfig) -> Vec<&'static str> {
    let mut sections = Vec::new();
    if current.listener.bind_address != next.listener.bind_address {
        sections.push("listener.bind_address");
    }
    if current.observability != next.observability {
        sections.push("observability");
    }
    sections
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a server that reaches upstreams over `reqwest`.
    pub fn new(config: GatewayConfig) -> Result<Self, UpstreamError> {
        let transport = Arc::new(ReqwestTransport::new()?);
        Ok(Self::with_transport(config, transport))
    }

    pub fn with_transport(config: GatewayConfig, transport: Arc<dyn Transport>) -> Self {
        let state = AppState::new(config, transport);
        let router = Self::build_router(state.clone());
        Self { router, state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Admin routes are always mounted; the auth middleware answers 404 while
    /// `admin.enabled` is off in the live config.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/health/circuits", get(circuits_handler))
            .route("/api/{service}", any(proxy_handler))
            .route("/api/{service}/{*path}", any(proxy_handler))
            .fallback(not_found_handler)
            .merge(setup_admin_router(state.clone()))
            .layer(middleware::from_fn_with_state(state.clone(), request_timeout))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
    }

    /// Run the server until `shutdown` fires, applying config updates as
    /// they arrive.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let state = self.state.clone();
        tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                state.reload(config);
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: String,
    version: &'static str,
    circuits: Vec<CircuitSnapshot>,
}

#[derive(Debug, Serialize)]
struct CircuitsResponse {
    status: &'static str,
    circuits: Vec<CircuitSnapshot>,
    timestamp: u64,
}

/// Gateway health. Degraded while any circuit is not closed.
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let runtime = state.inner.load();
    let status = if state.registry.all_closed() {
        "ok"
    } else {
        "degraded"
    };
    Json(HealthResponse {
        status,
        service: runtime.config.listener.service_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        circuits: state.registry.snapshots(),
    })
}

async fn circuits_handler(State(state): State<AppState>) -> Json<CircuitsResponse> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    Json(CircuitsResponse {
        status: "ok",
        circuits: state.registry.snapshots(),
        timestamp,
    })
}

async fn not_found_handler() -> Response {
    response::route_not_found()
}

/// Bound the whole request, retries included, by `timeouts.request_secs`
/// from the live config.
async fn request_timeout(State(state): State<AppState>, request: Request<Body>, next: Next) -> Response {
    let limit = Duration::from_secs(state.inner.load().config.timeouts.request_secs);
    let path = request.uri().path().to_string();
    match tokio::time::timeout(limit, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            tracing::warn!(path = %path, timeout_secs = limit.as_secs(), "Request timed out");
            StatusCode::REQUEST_TIMEOUT.into_response()
        }
    }
}

/// Main proxy handler.
/// Looks up the service client and forwards the request through it.
async fn proxy_handler(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    request: Request<Body>,
) -> Response {
    let runtime = state.inner.load_full();
    let (parts, body) = request.into_parts();
    let request_id = request_id(&parts.headers).unwrap_or("unknown").to_string();

    let Some(client) = params
        .get("service")
        .and_then(|service| runtime.directory.client(service))
    else {
        tracing::warn!(request_id = %request_id, path = %parts.uri.path(), "No route matched");
        return response::route_not_found();
    };

    let path = upstream_path(params.get("path").map(String::as_str), parts.uri.query());
    tracing::debug!(
        request_id = %request_id,
        service = %client.name(),
        method = %parts.method,
        path = %path,
        "Proxying request"
    );

    let body = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to read request body");
            return response::fail(StatusCode::BAD_REQUEST, "Invalid request body");
        }
    };

    let mut upstream = UpstreamRequest::new(parts.method.clone(), client.url(&path));
    upstream.headers = forwardable_headers(&parts.headers);
    if !body.is_empty() {
        upstream.body = Some(body);
    }

    let result = if runtime.retry.config().enabled && parts.method.is_idempotent() {
        runtime
            .retry
            .execute(|| client.request(upstream.clone()))
            .await
    } else {
        client.request(upstream).await
    };

    match result {
        Ok(upstream_response) => response::forward(upstream_response),
        Err(e) => {
            tracing::warn!(
                request_id = %request_id,
                service = %client.name(),
                error = %e,
                "Upstream request failed"
            );
            response::upstream_error(e)
        }
    }
}

/// `/api/{service}/{rest}?{query}` → `/api/{rest}?{query}`.
fn upstream_path(rest: Option<&str>, query: Option<&str>) -> String {
    let mut path = format!("/api/{}", rest.unwrap_or("").trim_start_matches('/'));
    if let Some(query) = query {
        path.push('?');
        path.push_str(query);
    }
    path
}
