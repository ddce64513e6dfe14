//! CSV recording sink for the broadcast feed.
//!
//! One row per broadcast tick while recording is enabled: `timestamp,
//! policy, migrations, utilization, p95_latency`. Flushed after every
//! row so external tailing (`tail -f`) sees live data.

use std::fs::{self, File};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::scheduler::Snapshot;

#[derive(Serialize)]
struct Row<'a> {
    timestamp: f64,
    policy: &'a str,
    migrations: u64,
    utilization: f64,
    p95_latency: f64,
}

/// An open CSV sink, one per recording session.
pub struct Recorder {
    path: String,
    writer: csv::Writer<File>,
}

impl Recorder {
    /// Open a new sink at `data_logs/run_<unix_seconds>.csv`, creating
    /// the directory if needed, and write the header row.
    pub fn open(unix_seconds: u64) -> Result<Self> {
        fs::create_dir_all("data_logs").map_err(Error::Recording)?;
        let path = format!("data_logs/run_{unix_seconds}.csv");
        let writer = csv::Writer::from_path(&path).map_err(|e| Error::Recording(e.into()))?;
        Ok(Self { path, writer })
    }

    /// File path this sink is writing to.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Append one row for the given snapshot and flush immediately.
    pub fn record(&mut self, snapshot: &Snapshot) -> Result<()> {
        let row = Row {
            timestamp: snapshot.timestamp,
            policy: policy_str(snapshot.policy),
            migrations: snapshot.migrations,
            utilization: snapshot.utilization,
            p95_latency: snapshot.p95_latency,
        };
        self.writer.serialize(row).map_err(|e| Error::Recording(e.into()))?;
        self.writer.flush().map_err(Error::Recording)?;
        Ok(())
    }
}

fn policy_str(policy: crate::scheduler::Policy) -> &'static str {
    use crate::scheduler::Policy::*;
    match policy {
        RoundRobin => "round_robin",
        LeastLoaded => "least_loaded",
        WorkStealing => "work_stealing",
    }
}
