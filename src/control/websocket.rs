//! WebSocket handler for the snapshot feed and command sink.
//!
//! Grounded on the teacher's `api/websocket.rs` split/join pattern
//! (`socket.split()`, a forwarding task fed by an mpsc channel, and a
//! receive loop reading incoming frames) with the roles specialized to
//! this crate's single global feed instead of a per-job broadcast
//! channel.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use super::command::Command;
use super::scenario::run_scenario;
use super::state::AppState;

/// Upgrade an HTTP request to a WebSocket connection.
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    state.subscribe(tx);

    let forward = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let recv_state = state.clone();
    let recv = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Text(text)) => dispatch(&recv_state, &text).await,
                Ok(Message::Close(_)) => {
                    debug!("client closed websocket connection");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "websocket receive error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = forward => {},
        _ = recv => {},
    }
}

async fn dispatch(state: &Arc<AppState>, raw: &str) {
    let Some(command) = Command::parse(raw) else {
        debug!(frame = raw, "dropping malformed or unknown command");
        return;
    };

    match command {
        Command::Hello => {}
        Command::Burst => state.runtime.generator.trigger_burst(),
        Command::Policy { val } => state.runtime.scheduler.set_policy(val),
        Command::Kill { id } => state.runtime.scheduler.kill(crate::node::NodeId(id)),
        Command::Revive { id } => state.runtime.scheduler.revive(crate::node::NodeId(id)),
        Command::SetRate { low, high } => {
            if low > 0.0 && low <= high {
                state.runtime.generator.set_rate(low, high);
            }
        }
        Command::ToggleRecord => {
            let unix = chrono::Utc::now().timestamp() as u64;
            state.toggle_recording(unix);
        }
        Command::StartScenario => {
            tokio::spawn(run_scenario(state.clone()));
        }
        Command::Download => {
            debug!("download acknowledged, handled client-side");
        }
    }
}

/// Broadcast cadence: every 150 ms, snapshot and fan out to subscribers.
const BROADCAST_INTERVAL: Duration = Duration::from_millis(150);

/// Long-lived broadcast ticker. Runs until `shutdown` fires.
pub async fn run_broadcast(state: Arc<AppState>, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(BROADCAST_INTERVAL) => {}
            _ = shutdown.changed() => if *shutdown.borrow() { return },
        }

        let snapshot = state.runtime.scheduler.snapshot(
            state.is_recording(),
            state.scenario_active.load(std::sync::atomic::Ordering::Acquire),
        );
        match serde_json::to_string(&snapshot) {
            Ok(json) => state.publish(&snapshot, &json),
            Err(e) => warn!(error = %e, "failed to serialize snapshot"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::SchedulerRuntime;
    use crate::scheduler::Policy;

    #[tokio::test]
    async fn dispatch_applies_burst_and_policy() {
        let runtime = SchedulerRuntime::new(2, Policy::RoundRobin, Some(1));
        let state = AppState::new(runtime);

        dispatch(&state, r#"{"cmd":"policy","val":"least_loaded"}"#).await;
        assert_eq!(state.runtime.scheduler.policy(), Policy::LeastLoaded);

        dispatch(&state, r#"{"cmd":"burst"}"#).await;
        // trigger_burst is fire-and-forget; just confirm dispatch didn't panic
        // and the generator is still reachable.
        assert_eq!(state.runtime.generator.rate().low, 0.3);
    }

    #[tokio::test]
    async fn dispatch_ignores_malformed_frame() {
        let runtime = SchedulerRuntime::new(2, Policy::RoundRobin, Some(1));
        let state = AppState::new(runtime);
        dispatch(&state, "garbage").await;
        assert_eq!(state.runtime.scheduler.policy(), Policy::RoundRobin);
    }

    #[tokio::test]
    async fn dispatch_kill_and_revive_roundtrip() {
        let runtime = SchedulerRuntime::new(2, Policy::RoundRobin, Some(1));
        let state = AppState::new(runtime);
        dispatch(&state, r#"{"cmd":"kill","id":0}"#).await;
        assert!(!state.runtime.scheduler.fleet()[0].is_active());
        dispatch(&state, r#"{"cmd":"revive","id":0}"#).await;
        assert!(state.runtime.scheduler.fleet()[0].is_active());
    }

    #[tokio::test]
    async fn dispatch_rejects_inverted_rate() {
        let runtime = SchedulerRuntime::new(2, Policy::RoundRobin, Some(1));
        let state = AppState::new(runtime);
        dispatch(&state, r#"{"cmd":"set_rate","low":0.9,"high":0.1}"#).await;
        assert_eq!(state.runtime.generator.rate().low, 0.3);
    }
}
