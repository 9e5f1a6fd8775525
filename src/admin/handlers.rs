use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::client::ClientMetrics;
use crate::http::{response, server::AppState};
use crate::resilience::circuit_breaker::CircuitSnapshot;

#[derive(Serialize)]
pub struct ResetSummary {
    pub status: &'static str,
    pub reset: usize,
}

#[derive(Serialize)]
pub struct CircuitAction {
    pub status: &'static str,
    pub circuit: CircuitSnapshot,
}

pub async fn list_circuits(State(state): State<AppState>) -> Json<Vec<CircuitSnapshot>> {
    Json(state.registry.snapshots())
}

/// Latency and breaker figures for every service client.
pub async fn list_services(State(state): State<AppState>) -> Json<Vec<ClientMetrics>> {
    let runtime = state.inner.load();
    Json(runtime.directory.clients().map(|client| client.metrics()).collect())
}

pub async fn reset_all(State(state): State<AppState>) -> Json<ResetSummary> {
    state.registry.reset_all();
    Json(ResetSummary {
        status: "ok",
        reset: state.registry.len(),
    })
}

pub async fn open_circuit(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.registry.get(&name) {
        Some(breaker) => {
            breaker.force_open();
            tracing::warn!(circuit = %name, "Circuit forced open by admin");
            Json(CircuitAction {
                status: "ok",
                circuit: breaker.snapshot(),
            })
            .into_response()
        }
        None => response::fail(StatusCode::NOT_FOUND, format!("Unknown circuit '{}'", name)),
    }
}

pub async fn close_circuit(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.registry.get(&name) {
        Some(breaker) => {
            breaker.reset();
            tracing::info!(circuit = %name, "Circuit closed by admin");
            Json(CircuitAction {
                status: "ok",
                circuit: breaker.snapshot(),
            })
            .into_response()
        }
        None => response::fail(StatusCode::NOT_FOUND, format!("Unknown circuit '{}'", name)),
    }
}

pub async fn reset_circuit_stats(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.registry.get(&name) {
        Some(breaker) => {
            breaker.reset_stats();
            tracing::info!(circuit = %name, "Circuit stats reset by admin");
            Json(CircuitAction {
                status: "ok",
                circuit: breaker.snapshot(),
            })
            .into_response()
        }
        None => response::fail(StatusCode::NOT_FOUND, format!("Unknown circuit '{}'", name)),
    }
}
