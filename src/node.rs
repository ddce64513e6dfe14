//! Node: a simulated worker with an owned FIFO queue and a processing loop.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::trace;

use crate::task::Task;

/// Index of a node within the fleet, `0..N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NodeId(pub usize);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A completed task, reported from a node's processing loop to the scheduler.
#[derive(Debug)]
pub struct Completion {
    /// The node that serviced the task.
    pub node: NodeId,
    /// The task that completed.
    pub task: Task,
    /// Wall-clock instant of completion.
    pub completed_at: Instant,
}

const IDLE_POLL: Duration = Duration::from_millis(50);
const INACTIVE_POLL: Duration = Duration::from_millis(500);

/// A simulated worker node.
///
/// A node owns its local queue and busy bit exclusively from inside its
/// processing loop, but accepts external `push`/`steal`/drain calls from
/// the scheduler at any time. The local queue is serviced FIFO from the
/// front and stolen from LIFO at the back.
pub struct Node {
    id: NodeId,
    /// Speed multiplier: demand / speed = processing time.
    speed: f64,
    queue: Mutex<VecDeque<Task>>,
    busy: AtomicBool,
    active: AtomicBool,
    completed: AtomicU64,
}

impl Node {
    /// Create a new, active, idle node with the given speed multiplier.
    pub fn new(id: NodeId, speed: f64) -> Self {
        Self {
            id,
            speed,
            queue: Mutex::new(VecDeque::new()),
            busy: AtomicBool::new(false),
            active: AtomicBool::new(true),
            completed: AtomicU64::new(0),
        }
    }

    /// This node's identity.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Current queue length.
    pub fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Whether the node is currently processing a task.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Relaxed)
    }

    /// Whether the node is accepting work.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    /// Number of tasks this node has completed since creation.
    pub fn completed_count(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Append a task to the back of the local queue.
    ///
    /// The active check and the push happen under the same queue lock
    /// that `kill` drains under, so a concurrent kill can never observe
    /// this push after having already drained — either the push lands
    /// before the drain (and the task is carried off by the drain) or
    /// the push sees the node already inactive. Either way the task
    /// returns to the caller instead of being silently destroyed:
    /// `Some(task)` means the node was inactive and the caller must
    /// re-submit it elsewhere (the scheduler resubmits to ingest).
    pub fn push(&self, task: Task) -> Option<Task> {
        let mut queue = self.queue.lock();
        if !self.active.load(Ordering::Relaxed) {
            trace!(node = %self.id, task = %task.id, "push race: node inactive, returning task to caller");
            return Some(task);
        }
        queue.push_back(task);
        None
    }

    /// Mark the node inactive and drain its queue, returning every task
    /// that was waiting. Used by the scheduler's `kill` to satisfy the
    /// repair invariant: queued work at a failed node is never lost.
    /// Setting `active` and draining happen under the same lock `push`
    /// takes, closing the window where a concurrent push could land on
    /// a node that looks active but is mid-kill.
    pub fn kill(&self) -> Vec<Task> {
        let mut queue = self.queue.lock();
        self.active.store(false, Ordering::Relaxed);
        queue.drain(..).collect()
    }

    /// Mark the node active again. Service resumes from whatever queue
    /// state remains (typically empty, since `kill` drains it).
    pub fn revive(&self) {
        self.active.store(true, Ordering::Relaxed);
    }

    /// Remove up to `amount` tasks from the back of the queue (the
    /// youngest, not-yet-started tasks), always leaving at least one
    /// element behind. Returns the removed tasks in the order taken
    /// (oldest-of-the-stolen first).
    ///
    /// Returns empty if the node is inactive. The active check happens
    /// under the same queue lock as `push`/`kill`, for the same reason.
    pub fn steal(&self, amount: usize) -> Vec<Task> {
        let mut queue = self.queue.lock();
        if !self.active.load(Ordering::Relaxed) {
            return Vec::new();
        }
        let len = queue.len();
        let stealable = amount.min(len.saturating_sub(1));
        if stealable == 0 {
            return Vec::new();
        }
        let mut stolen = Vec::with_capacity(stealable);
        for _ in 0..stealable {
            if let Some(task) = queue.pop_back() {
                stolen.push(task);
            }
        }
        stolen.reverse();
        stolen
    }

    /// Run the cooperative processing loop until `shutdown` fires.
    ///
    /// While running: if inactive, idle briefly and recheck; if the
    /// queue is empty, idle briefly; otherwise pop the front task, go
    /// busy, sleep for `demand / speed` seconds, stamp completion, and
    /// report it.
    pub async fn run(
        self: std::sync::Arc<Self>,
        completions: mpsc::UnboundedSender<Completion>,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) {
        loop {
            if *shutdown.borrow() {
                return;
            }

            if !self.is_active() {
                tokio::select! {
                    _ = tokio::time::sleep(INACTIVE_POLL) => {}
                    _ = shutdown.changed() => if *shutdown.borrow() { return },
                }
                continue;
            }

            let next = self.queue.lock().pop_front();
            let Some(task) = next else {
                tokio::select! {
                    _ = tokio::time::sleep(IDLE_POLL) => {}
                    _ = shutdown.changed() => if *shutdown.borrow() { return },
                }
                continue;
            };

            self.busy.store(true, Ordering::Relaxed);
            let work = Duration::from_secs_f64((task.demand_secs / self.speed).max(0.0));
            tokio::time::sleep(work).await;
            let completed_at = Instant::now();
            self.completed.fetch_add(1, Ordering::Relaxed);
            self.busy.store(false, Ordering::Relaxed);

            trace!(node = %self.id, task = %task.id, "task completed");
            let _ = completions.send(Completion {
                node: self.id,
                task,
                completed_at,
            });
        }
    }
}
