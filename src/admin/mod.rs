pub mod handlers;
pub mod auth;

use axum::{
    routing::{get, post},
    Router,
    middleware,
};
use crate::http::server::AppState;
use self::handlers::*;
use self::auth::admin_auth_middleware;

pub fn setup_admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/circuits", get(list_circuits))
        .route("/admin/circuits/reset", post(reset_all))
        .route("/admin/circuits/{name}/open", post(open_circuit))
        .route("/admin/circuits/{name}/close", post(close_circuit))
        .route("/admin/circuits/{name}/stats/reset", post(reset_circuit_stats))
        .route("/admin/services", get(list_services))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}
