use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::{response, server::AppState};

/// Gate admin routes on the live config: 404 while `admin.enabled` is off,
/// 401 unless the request carries `Bearer <admin.api_key>`.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let inner = state.inner.load_full();
    if !inner.config.admin.enabled {
        return response::route_not_found();
    }

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    if let Some(auth_val) = auth_header {
        if auth_val.strip_prefix("Bearer ") == Some(inner.config.admin.api_key.as_str()) {
            return next.run(request).await;
        }
    }

    tracing::warn!(path = %request.uri().path(), "Rejected admin request");
    StatusCode::UNAUTHORIZED.into_response()
}
