//! Scheduler: owns the node fleet, the ingest queue, the placement
//! policy, the stealing loop, completion bookkeeping, and snapshot
//! export.

pub mod policy;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

pub use policy::Policy;

use crate::node::{Completion, Node, NodeId};
use crate::task::Task;

/// Node 0 runs this much faster than the rest of the fleet, by design
/// (spec.md §3 / §9 open question 2): a fixed demonstration artifact,
/// not a tunable.
const NODE_ZERO_SPEED_BONUS: f64 = 1.2;

const NO_ACTIVE_NODES_BACKOFF: Duration = Duration::from_secs(1);
const STEALING_INTERVAL: Duration = Duration::from_millis(250);

/// Sliding window behavior: once the latency ring exceeds this many
/// samples, truncate to the most recent [`LATENCY_TRUNCATE_TO`].
const LATENCY_MAX: usize = 5000;
const LATENCY_TRUNCATE_TO: usize = 2000;
/// Snapshot statistics only look at the most recent samples.
const LATENCY_STATS_WINDOW: usize = 50;

/// An immutable telemetry view of the scheduler, produced on demand.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    /// Wall-clock unix timestamp, seconds.
    pub timestamp: f64,
    /// Currently active placement policy.
    pub policy: Policy,
    /// Per-node queue lengths, index-aligned with the fleet.
    pub queue_lengths: Vec<usize>,
    /// Per-node active flags, index-aligned with the fleet.
    pub node_status: Vec<bool>,
    /// Per-node completed-task counts, index-aligned with the fleet.
    pub completed: Vec<u64>,
    /// Total tasks migrated by the work-stealing loop.
    pub migrations: u64,
    /// Rolling mean latency over the last [`LATENCY_STATS_WINDOW`] completions.
    pub avg_latency: f64,
    /// Rolling p95 latency over the last [`LATENCY_STATS_WINDOW`] completions.
    pub p95_latency: f64,
    /// Percentage of active nodes currently busy, 0..100.
    pub utilization: f64,
    /// Whether the CSV recording sink is currently open.
    pub recording: bool,
    /// Whether the scripted scenario is currently running.
    pub scenario_active: bool,
}

/// Owns the node fleet, ingest queue, and placement/stealing loops.
pub struct Scheduler {
    fleet: Vec<Arc<Node>>,
    ingest_tx: mpsc::UnboundedSender<Task>,
    ingest_rx: Mutex<Option<mpsc::UnboundedReceiver<Task>>>,
    policy: RwLock<Policy>,
    round_robin_idx: AtomicUsize,
    migrations: AtomicU64,
    latencies: Mutex<VecDeque<f64>>,
    /// Per-node placement counts, for testing policy fairness. Not
    /// exposed on the wire.
    placements: Vec<AtomicU64>,
}

impl Scheduler {
    /// Construct a scheduler with `n` nodes and the given initial policy.
    /// Node 0 is faster than the rest of the fleet by design.
    pub fn new(n: usize, initial_policy: Policy) -> Arc<Self> {
        let fleet: Vec<Arc<Node>> = (0..n)
            .map(|i| {
                let speed = if i == 0 { NODE_ZERO_SPEED_BONUS } else { 1.0 };
                Arc::new(Node::new(NodeId(i), speed))
            })
            .collect();
        let (ingest_tx, ingest_rx) = mpsc::unbounded_channel();
        let placements = (0..n).map(|_| AtomicU64::new(0)).collect();

        Arc::new(Self {
            fleet,
            ingest_tx,
            ingest_rx: Mutex::new(Some(ingest_rx)),
            policy: RwLock::new(initial_policy),
            round_robin_idx: AtomicUsize::new(0),
            migrations: AtomicU64::new(0),
            latencies: Mutex::new(VecDeque::new()),
            placements,
        })
    }

    /// Number of nodes in the fleet.
    pub fn fleet_size(&self) -> usize {
        self.fleet.len()
    }

    /// Shared handles to every node, for spawning their processing loops.
    pub fn fleet(&self) -> &[Arc<Node>] {
        &self.fleet
    }

    /// Enqueue a task into the ingest queue. Non-blocking.
    pub fn submit(&self, task: Task) {
        // The receiver is only ever dropped at process shutdown.
        let _ = self.ingest_tx.send(task);
    }

    /// Atomically replace the active policy. Takes effect on the next
    /// placement decision.
    pub fn set_policy(&self, policy: Policy) {
        *self.policy.write() = policy;
        info!(%policy, "policy changed");
    }

    /// The currently active policy.
    pub fn policy(&self) -> Policy {
        *self.policy.read()
    }

    /// Mark a node inactive and drain its local queue, re-submitting
    /// every drained task back to the ingest queue. No-op for an
    /// out-of-range id.
    pub fn kill(&self, id: NodeId) {
        let Some(node) = self.fleet.get(id.0) else {
            return;
        };
        let drained = node.kill();
        if !drained.is_empty() {
            debug!(node = %id, count = drained.len(), "draining killed node back to ingest");
        }
        for task in drained {
            self.submit(task);
        }
        info!(node = %id, "node killed");
    }

    /// Mark a node active. No-op for an out-of-range id.
    pub fn revive(&self, id: NodeId) {
        if let Some(node) = self.fleet.get(id.0) {
            node.revive();
            info!(node = %id, "node revived");
        }
    }

    /// Total migrations performed by the stealing loop so far.
    pub fn migrations(&self) -> u64 {
        self.migrations.load(Ordering::Relaxed)
    }

    /// Number of tasks placed onto a given node since construction.
    /// Testing aid for invariant 3/4; not part of the wire format.
    pub fn placement_count(&self, id: NodeId) -> u64 {
        self.placements
            .get(id.0)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Record a completion: append its latency to the rolling window,
    /// truncating when the window grows too large.
    pub fn report_completion(&self, completion: Completion) {
        let latency = completion.task.latency_secs(completion.completed_at);
        let mut latencies = self.latencies.lock();
        latencies.push_back(latency);
        if latencies.len() > LATENCY_MAX {
            let excess = latencies.len() - LATENCY_TRUNCATE_TO;
            latencies.drain(..excess);
        }
    }

    /// Produce an immutable telemetry snapshot. `recording` and
    /// `scenario_active` are owned by the control surface, not the
    /// scheduler, so the caller supplies them.
    pub fn snapshot(&self, recording: bool, scenario_active: bool) -> Snapshot {
        let queue_lengths: Vec<usize> = self.fleet.iter().map(|n| n.queue_len()).collect();
        let node_status: Vec<bool> = self.fleet.iter().map(|n| n.is_active()).collect();
        let completed: Vec<u64> = self.fleet.iter().map(|n| n.completed_count()).collect();

        let (avg_latency, p95_latency) = self.latency_stats();
        let utilization = self.utilization();

        Snapshot {
            timestamp: chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
            policy: self.policy(),
            queue_lengths,
            node_status,
            completed,
            migrations: self.migrations(),
            avg_latency,
            p95_latency,
            utilization,
            recording,
            scenario_active,
        }
    }

    fn latency_stats(&self) -> (f64, f64) {
        let latencies = self.latencies.lock();
        let len = latencies.len();
        if len == 0 {
            return (0.0, 0.0);
        }
        let start = len.saturating_sub(LATENCY_STATS_WINDOW);
        let mut window: Vec<f64> = latencies.iter().skip(start).copied().collect();
        let mean = window.iter().sum::<f64>() / window.len() as f64;
        window.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let idx = ((0.95 * window.len() as f64).floor() as usize).min(window.len() - 1);
        let p95 = window[idx];
        (mean, p95)
    }

    fn utilization(&self) -> f64 {
        let active: Vec<&Arc<Node>> = self.fleet.iter().filter(|n| n.is_active()).collect();
        if active.is_empty() {
            return 0.0;
        }
        let busy = active.iter().filter(|n| n.is_busy()).count();
        (busy as f64 / active.len() as f64) * 100.0
    }

    fn active_nodes(&self) -> Vec<&Arc<Node>> {
        self.fleet.iter().filter(|n| n.is_active()).collect()
    }

    /// Select a placement target among `active` nodes under the given
    /// policy. `work_stealing` uses the same selection rule as
    /// `least_loaded` (spec.md §9 open question 1): the policy differs
    /// only in whether the stealing loop runs alongside it.
    fn select_target(&self, active: &[&Arc<Node>], policy: Policy) -> NodeId {
        match policy {
            Policy::RoundRobin => {
                let idx = self.round_robin_idx.fetch_add(1, Ordering::Relaxed) % active.len();
                active[idx].id()
            }
            Policy::LeastLoaded | Policy::WorkStealing => {
                active
                    .iter()
                    .min_by_key(|n| (n.queue_len(), n.id().0))
                    .expect("active is non-empty")
                    .id()
            }
        }
    }

    /// Single cooperative placement dispatcher. Runs until the ingest
    /// channel closes or `shutdown` fires.
    pub async fn run_placement(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut rx = self
            .ingest_rx
            .lock()
            .take()
            .expect("run_placement called more than once");

        loop {
            let task = tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                    continue;
                }
                task = rx.recv() => match task {
                    Some(t) => t,
                    None => return,
                },
            };

            let active = self.active_nodes();
            if active.is_empty() {
                warn!("no active nodes, re-submitting and backing off");
                tokio::select! {
                    _ = tokio::time::sleep(NO_ACTIVE_NODES_BACKOFF) => {}
                    _ = shutdown.changed() => if *shutdown.borrow() { return },
                }
                self.submit(task);
                continue;
            }

            let policy = self.policy();
            let target = self.select_target(&active, policy);
            match self.fleet[target.0].push(task) {
                None => {
                    self.placements[target.0].fetch_add(1, Ordering::Relaxed);
                }
                Some(task) => {
                    // target was killed between selection and push; the
                    // node's own push/kill lock already guaranteed this
                    // task wasn't silently lost, so just re-home it.
                    warn!(node = %target, "target went inactive mid-placement, resubmitting");
                    self.submit(task);
                }
            }
        }
    }

    /// Periodic work-stealing rebalancer. Only acts when the active
    /// policy is `work_stealing`.
    pub async fn run_stealing(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(STEALING_INTERVAL) => {}
                _ = shutdown.changed() => if *shutdown.borrow() { return },
            }

            if !self.policy().steals() {
                continue;
            }

            let active = self.active_nodes();
            let idle: Vec<&Arc<Node>> = active.iter().filter(|n| n.queue_len() == 0).copied().collect();
            let Some(busiest) = active.iter().max_by_key(|n| n.queue_len()) else {
                continue;
            };
            if idle.is_empty() || busiest.queue_len() <= 1 {
                continue;
            }

            let amount = (busiest.queue_len() / 4).max(1);
            let stolen = busiest.steal(amount);
            if stolen.is_empty() {
                continue;
            }

            let moved = stolen.len();
            for (i, task) in stolen.into_iter().enumerate() {
                let target = idle[i % idle.len()];
                match target.push(task) {
                    None => {
                        self.placements[target.id().0].fetch_add(1, Ordering::Relaxed);
                    }
                    Some(task) => {
                        // target was killed between the idle snapshot and
                        // the push; re-home through ingest instead of
                        // losing it.
                        self.submit(task);
                    }
                }
            }
            self.migrations.fetch_add(moved as u64, Ordering::Relaxed);
            debug!(count = moved, from = %busiest.id(), "migrated tasks via stealing");
        }
    }

    /// Drain completions from the node loops and record them.
    pub async fn run_completions(
        self: Arc<Self>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => if *shutdown.borrow() { return },
                completion = completions.recv() => match completion {
                    Some(c) => self.report_completion(c),
                    None => return,
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskId;

    fn task(id: u64) -> Task {
        Task::new(TaskId(id), 0.1)
    }

    #[test]
    fn new_scheduler_has_n_idle_active_nodes() {
        let sched = Scheduler::new(4, Policy::LeastLoaded);
        assert_eq!(sched.fleet_size(), 4);
        for node in sched.fleet() {
            assert!(node.is_active());
            assert_eq!(node.queue_len(), 0);
        }
    }

    #[test]
    fn node_zero_is_faster() {
        let sched = Scheduler::new(4, Policy::LeastLoaded);
        // indirectly: node 0's speed bonus is baked in at construction;
        // verify via processing-time math using the public speed through
        // a full sleep would be slow in a unit test, so just check the
        // fleet shape here; timing is covered by the scenario tests.
        assert_eq!(sched.fleet()[0].id(), NodeId(0));
    }

    #[test]
    fn least_loaded_picks_minimum_queue_then_lowest_id() {
        let sched = Scheduler::new(3, Policy::LeastLoaded);
        sched.fleet()[0].push(task(1));
        sched.fleet()[1].push(task(2));
        let active: Vec<&Arc<Node>> = sched.fleet().iter().collect();
        let target = sched.select_target(&active, Policy::LeastLoaded);
        assert_eq!(target, NodeId(2));
    }

    #[test]
    fn least_loaded_ties_break_to_smallest_id() {
        let sched = Scheduler::new(3, Policy::LeastLoaded);
        let active: Vec<&Arc<Node>> = sched.fleet().iter().collect();
        let target = sched.select_target(&active, Policy::LeastLoaded);
        assert_eq!(target, NodeId(0));
    }

    #[test]
    fn round_robin_cycles_and_persists_across_calls() {
        let sched = Scheduler::new(3, Policy::RoundRobin);
        let active: Vec<&Arc<Node>> = sched.fleet().iter().collect();
        let picks: Vec<NodeId> = (0..6)
            .map(|_| sched.select_target(&active, Policy::RoundRobin))
            .collect();
        assert_eq!(
            picks,
            vec![
                NodeId(0),
                NodeId(1),
                NodeId(2),
                NodeId(0),
                NodeId(1),
                NodeId(2)
            ]
        );
    }

    #[test]
    fn kill_drains_queue_into_ingest() {
        let sched = Scheduler::new(2, Policy::LeastLoaded);
        sched.fleet()[0].push(task(1));
        sched.fleet()[0].push(task(2));
        sched.kill(NodeId(0));
        assert_eq!(sched.fleet()[0].queue_len(), 0);
        assert!(!sched.fleet()[0].is_active());
        // the drained tasks went back to ingest, not lost
        let mut rx = sched.ingest_rx.lock().take().unwrap();
        let mut seen = Vec::new();
        while let Ok(t) = rx.try_recv() {
            seen.push(t.id.0);
        }
        seen.sort();
        assert_eq!(seen, vec![1, 2]);
    }

    #[test]
    fn kill_of_nonexistent_node_is_noop() {
        let sched = Scheduler::new(2, Policy::LeastLoaded);
        sched.kill(NodeId(99));
    }

    #[test]
    fn revive_of_nonexistent_node_is_noop() {
        let sched = Scheduler::new(2, Policy::LeastLoaded);
        sched.revive(NodeId(99));
    }

    #[test]
    fn snapshot_has_consistent_shape() {
        let sched = Scheduler::new(4, Policy::LeastLoaded);
        let snap = sched.snapshot(false, false);
        assert_eq!(snap.queue_lengths.len(), 4);
        assert_eq!(snap.node_status.len(), 4);
        assert_eq!(snap.completed.len(), 4);
        assert!(snap.utilization >= 0.0 && snap.utilization <= 100.0);
        assert!(snap.avg_latency >= 0.0);
        assert!(snap.p95_latency >= 0.0);
    }

    #[test]
    fn utilization_is_zero_with_no_active_nodes() {
        let sched = Scheduler::new(2, Policy::LeastLoaded);
        sched.kill(NodeId(0));
        sched.kill(NodeId(1));
        assert_eq!(sched.utilization(), 0.0);
    }

    #[test]
    fn latency_window_truncates_when_it_grows_too_large() {
        let sched = Scheduler::new(1, Policy::LeastLoaded);
        let total = LATENCY_MAX + 10;
        for i in 0..total {
            sched.report_completion(Completion {
                node: NodeId(0),
                task: task(i as u64),
                completed_at: std::time::Instant::now(),
            });
        }
        // truncation fires once, the push that crosses LATENCY_MAX+1,
        // after which the remaining pushes accumulate normally.
        let expected = LATENCY_TRUNCATE_TO + (total - (LATENCY_MAX + 1));
        assert_eq!(sched.latencies.lock().len(), expected);
        assert!(sched.latencies.lock().len() <= LATENCY_MAX);
    }
}
