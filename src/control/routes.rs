//! Control-surface router assembly.
//!
//! Grounded on the teacher's `api/routes.rs` `api_routes` function: a
//! `Router<Arc<AppState>>` built from plain handlers plus a nested
//! WebSocket route, with state attached last via `.with_state()`.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;

use super::handlers;
use super::state::AppState;
use super::websocket;

/// Build the full control/telemetry router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::dashboard))
        .route("/api/health", get(handlers::health_check))
        .route("/ws", get(websocket::ws_handler))
        .with_state(state)
}
