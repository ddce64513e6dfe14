//! Wire representation of operator commands.
//!
//! Mirrors the teacher's `WsMessage` tagged-enum pattern
//! (`api/types.rs`/`api/websocket.rs`): a single `#[serde(tag = "cmd")]`
//! enum instead of a string to switch on, so malformed or unknown verbs
//! fail to deserialize rather than falling through a catch-all match arm.

use serde::Deserialize;

use crate::scheduler::Policy;

/// A client → server command frame.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// No-op handshake.
    Hello,
    /// Trigger a one-shot manual burst.
    Burst,
    /// Switch the active placement policy.
    Policy { val: Policy },
    /// Deactivate a node and drain its queue.
    Kill { id: usize },
    /// Reactivate a node.
    Revive { id: usize },
    /// Update the generator's inter-arrival rate range.
    SetRate { low: f64, high: f64 },
    /// Start or stop the CSV recording sink.
    ToggleRecord,
    /// Run the scripted demonstration scenario, ignored if already active.
    StartScenario,
    /// Acknowledged; the actual file transfer is a plain HTTP request the
    /// dashboard issues on its own against the recordings it already
    /// knows about — this verb exists only so a client can ask "is there
    /// anything to download" without first guessing a file name.
    Download,
}

impl Command {
    /// Parse a single frame. Malformed or unknown frames return `None`
    /// and are dropped silently by the caller, per the command sink's
    /// error policy — a visualization tool is not an authority.
    pub fn parse(raw: &str) -> Option<Command> {
        serde_json::from_str(raw).ok()
    }
}
