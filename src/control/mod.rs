//! Control/telemetry HTTP+WebSocket surface.
//!
//! Exposes the dashboard (`GET /`), a liveness probe (`GET /api/health`),
//! and the bidirectional snapshot/command channel (`GET /ws`). Grounded
//! on the teacher's `api/mod.rs` `ApiServer` (router assembly, CORS,
//! tracing layer, graceful shutdown), generalized to this crate's single
//! unauthenticated surface — there are no REST mutation endpoints here,
//! since every mutation travels over the WebSocket command sink.

pub mod command;
pub mod handlers;
pub mod recorder;
pub mod routes;
pub mod scenario;
pub mod state;
pub mod websocket;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use state::AppState;

use crate::error::{Error, Result};
use crate::runtime::SchedulerRuntime;
use websocket::run_broadcast;

/// The control/telemetry server: a bind address plus the shared state
/// every handler and the broadcast ticker operate on.
pub struct ControlServer {
    bind: SocketAddr,
    state: Arc<AppState>,
}

impl ControlServer {
    /// Build a control server around an existing scheduler runtime.
    pub fn new(bind: SocketAddr, runtime: Arc<SchedulerRuntime>) -> Self {
        Self {
            bind,
            state: AppState::new(runtime),
        }
    }

    /// Shared application state, for spawning the broadcast ticker.
    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    fn router(&self) -> axum::Router {
        routes::router(self.state.clone())
            .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
            .layer(TraceLayer::new_for_http())
    }

    /// Spawn the broadcast ticker and serve the HTTP+WebSocket surface
    /// until `shutdown` fires. Binding failure is the one ambient path
    /// allowed to terminate the process (§7: "transport bind failure at
    /// startup" is fatal).
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let broadcast_shutdown = shutdown.clone();
        let broadcast_state = self.state.clone();
        tokio::spawn(async move { run_broadcast(broadcast_state, broadcast_shutdown).await });

        let router = self.router();
        let listener = TcpListener::bind(self.bind)
            .await
            .map_err(|source| Error::Bind { addr: self.bind, source })?;

        info!(addr = %self.bind, "control surface listening");

        let mut shutdown_rx = shutdown;
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            })
            .await
            .map_err(|source| Error::Bind { addr: self.bind, source })?;

        Ok(())
    }
}
