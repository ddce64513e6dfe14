//! Plain HTTP handlers: the dashboard page and the liveness probe.
//!
//! Grounded on the teacher's `handlers::health_check` and
//! `handlers::api_info` (`api/handlers.rs`) — every axum service in the
//! corpus carries an unauthenticated health endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::response::{Html, IntoResponse};
use axum::Json;
use serde::Serialize;

use super::state::AppState;

const DASHBOARD_HTML: &str = include_str!("static/dashboard.html");

/// `GET /` — the embedded dashboard page.
pub async fn dashboard() -> impl IntoResponse {
    Html(DASHBOARD_HTML)
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    uptime_secs: u64,
}

/// `GET /api/health` — trivial liveness probe.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(Health {
        status: "ok",
        uptime_secs: state.uptime_secs(),
    })
}
