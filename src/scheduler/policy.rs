//! Placement policy: the rule by which the dispatcher selects a target
//! node for a submitted task.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The active placement policy.
///
/// Represented as a tagged variant rather than a string so the stealing
/// loop and the placement loop can match on it directly; string parsing
/// only happens at the control boundary (`FromStr`/`Display`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// Cyclic placement across active nodes, index persists across calls.
    RoundRobin,
    /// Place on whichever active node currently has the shortest queue.
    LeastLoaded,
    /// Same selection rule as `LeastLoaded`, plus a periodic stealing loop.
    WorkStealing,
}

impl Policy {
    /// Whether the work-stealing rebalancer should run under this policy.
    pub fn steals(self) -> bool {
        matches!(self, Policy::WorkStealing)
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Policy::RoundRobin => "round_robin",
            Policy::LeastLoaded => "least_loaded",
            Policy::WorkStealing => "work_stealing",
        };
        f.write_str(s)
    }
}

impl FromStr for Policy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "round_robin" => Ok(Policy::RoundRobin),
            "least_loaded" => Ok(Policy::LeastLoaded),
            "work_stealing" => Ok(Policy::WorkStealing),
            _ => Err(()),
        }
    }
}
