//! Shared control-surface state.
//!
//! Mirrors the teacher's `AppState` (`api/state.rs`): one value, wrapped
//! in `Arc`, injected into axum via `.with_state()` and shared by every
//! handler and the broadcast publisher.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::Message;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::runtime::SchedulerRuntime;

use super::recorder::Recorder;

/// Shared state for the control/telemetry HTTP+WebSocket surface.
pub struct AppState {
    /// The scheduling kernel this surface observes and mutates.
    pub runtime: Arc<SchedulerRuntime>,
    /// Connected snapshot subscribers. Insertion on connect, removal on
    /// disconnect or send failure — owned by the publisher, not by any
    /// one connection.
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Message>>>,
    /// The open recording sink, if recording is enabled. Owned by the
    /// publisher; closed exactly once on toggle-off.
    recorder: Mutex<Option<Recorder>>,
    /// Whether the scripted scenario is currently running.
    pub scenario_active: AtomicBool,
    started_at: Instant,
}

impl AppState {
    /// Construct fresh control-surface state around an existing runtime.
    pub fn new(runtime: Arc<SchedulerRuntime>) -> Arc<Self> {
        Arc::new(Self {
            runtime,
            subscribers: Mutex::new(Vec::new()),
            recorder: Mutex::new(None),
            scenario_active: AtomicBool::new(false),
            started_at: Instant::now(),
        })
    }

    /// Server uptime, for the health check.
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Register a new subscriber connection.
    pub fn subscribe(&self, tx: mpsc::UnboundedSender<Message>) {
        self.subscribers.lock().push(tx);
    }

    /// Whether the recording sink is currently open.
    pub fn is_recording(&self) -> bool {
        self.recorder.lock().is_some()
    }

    /// Toggle the recording sink. Returns the new state (true = now
    /// recording). Failure to open the sink is logged and leaves
    /// recording off, per the ambient error policy (§7: best-effort, a
    /// reference implementation may log and disable recording).
    pub fn toggle_recording(&self, unix_seconds: u64) -> bool {
        let mut guard = self.recorder.lock();
        if guard.is_some() {
            *guard = None;
            false
        } else {
            match Recorder::open(unix_seconds) {
                Ok(rec) => {
                    *guard = Some(rec);
                    true
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to open recording sink");
                    false
                }
            }
        }
    }

    /// Fan a freshly-serialized snapshot frame out to every subscriber,
    /// dropping any whose send fails (their connection has closed).
    /// Also appends a CSV row if recording is active.
    pub fn publish(&self, snapshot: &crate::scheduler::Snapshot, json: &str) {
        {
            let mut guard = self.recorder.lock();
            if let Some(rec) = guard.as_mut() {
                if let Err(e) = rec.record(snapshot) {
                    tracing::warn!(error = %e, "recording sink write failed, disabling");
                    *guard = None;
                }
            }
        }

        let mut subs = self.subscribers.lock();
        subs.retain(|tx| tx.send(Message::Text(json.to_string().into())).is_ok());
    }

    /// Current subscriber count, for tests.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
