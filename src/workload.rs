//! Workload generator: a single cooperative producer synthesizing tasks
//! at a configurable inter-arrival rate, with occasional micro-bursts
//! and operator-triggered bursts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tracing::info;

use crate::scheduler::Scheduler;
use crate::task::{Task, TaskIdAllocator};

/// Default inter-arrival range, seconds.
const DEFAULT_RATE_LOW: f64 = 0.3;
const DEFAULT_RATE_HIGH: f64 = 0.8;

/// Work demand range for each generated task, seconds at unit speed.
const DEMAND_LOW: f64 = 0.3;
const DEMAND_HIGH: f64 = 0.9;

/// Probability per iteration (outside a manual burst) of emitting a
/// 5-task micro-burst instead of a single task.
const MICRO_BURST_PROBABILITY: f64 = 0.05;
const MICRO_BURST_SIZE: usize = 5;

/// Size of a manually triggered burst.
const MANUAL_BURST_SIZE: usize = 15;
const MANUAL_BURST_COOLDOWN: Duration = Duration::from_secs(1);

/// Configurable inter-arrival rate range, seconds.
#[derive(Debug, Clone, Copy)]
pub struct Rate {
    pub low: f64,
    pub high: f64,
}

impl Default for Rate {
    fn default() -> Self {
        Self {
            low: DEFAULT_RATE_LOW,
            high: DEFAULT_RATE_HIGH,
        }
    }
}

/// Synthesizes tasks and submits them to a [`Scheduler`]'s ingest queue.
pub struct WorkloadGenerator {
    ids: TaskIdAllocator,
    rate: RwLock<Rate>,
    burst_pending: AtomicBool,
    rng: parking_lot::Mutex<StdRng>,
}

impl WorkloadGenerator {
    /// Create a generator seeded from OS entropy.
    pub fn new() -> Arc<Self> {
        Self::with_seed(rand::random())
    }

    /// Create a generator with a fixed seed, for deterministic tests and
    /// scenario replay (spec.md §8: "use deterministic seeding for the
    /// generator RNG").
    pub fn with_seed(seed: u64) -> Arc<Self> {
        Arc::new(Self {
            ids: TaskIdAllocator::new(),
            rate: RwLock::new(Rate::default()),
            burst_pending: AtomicBool::new(false),
            rng: parking_lot::Mutex::new(StdRng::seed_from_u64(seed)),
        })
    }

    /// Arm a one-shot manual burst: the next loop iteration submits
    /// [`MANUAL_BURST_SIZE`] tasks back-to-back.
    pub fn trigger_burst(&self) {
        self.burst_pending.store(true, Ordering::Relaxed);
    }

    /// Update the inter-arrival rate range. Caller ensures `0 < low <= high`.
    pub fn set_rate(&self, low: f64, high: f64) {
        *self.rate.write() = Rate { low, high };
        info!(low, high, "generator rate updated");
    }

    /// Current inter-arrival rate range.
    pub fn rate(&self) -> Rate {
        *self.rate.read()
    }

    fn random_demand(&self) -> f64 {
        self.rng.lock().gen_range(DEMAND_LOW..=DEMAND_HIGH)
    }

    fn new_task(&self) -> Task {
        Task::new(self.ids.next(), self.random_demand())
    }

    fn submit_n(&self, scheduler: &Scheduler, n: usize) {
        for _ in 0..n {
            scheduler.submit(self.new_task());
        }
    }

    /// Run the generator loop until `shutdown` fires.
    pub async fn run(self: Arc<Self>, scheduler: Arc<Scheduler>, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                return;
            }

            if self.burst_pending.swap(false, Ordering::Relaxed) {
                self.submit_n(&scheduler, MANUAL_BURST_SIZE);
                tokio::select! {
                    _ = tokio::time::sleep(MANUAL_BURST_COOLDOWN) => {}
                    _ = shutdown.changed() => if *shutdown.borrow() { return },
                }
                continue;
            }

            let roll: f64 = self.rng.lock().gen();
            if roll < MICRO_BURST_PROBABILITY {
                self.submit_n(&scheduler, MICRO_BURST_SIZE);
            } else {
                self.submit_n(&scheduler, 1);
            }

            let rate = self.rate();
            let sleep_secs = self.rng.lock().gen_range(rate.low..=rate.high);
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs_f64(sleep_secs)) => {}
                _ = shutdown.changed() => if *shutdown.borrow() { return },
            }
        }
    }
}
