//! Integration-level invariant checks for the scheduling kernel, running
//! the real node/placement/stealing loops together rather than calling
//! their internals directly.

use std::sync::Arc;
use std::time::Duration;

use simdispatch::node::{Completion, Node, NodeId};
use simdispatch::scheduler::{Policy, Scheduler};
use simdispatch::task::{Task, TaskId};
use tokio::sync::{mpsc, watch};

fn task(id: u64) -> Task {
    Task::new(TaskId(id), 0.2)
}

/// Invariant 1: task conservation across a kill/revive cycle — every
/// task submitted before a kill is accounted for afterward, either
/// still queued or re-homed, never dropped.
#[tokio::test(start_paused = true)]
async fn task_conservation_across_kill() {
    let sched = Scheduler::new(3, Policy::RoundRobin);
    let (_tx, shutdown) = watch::channel(false);
    let placement = tokio::spawn(sched.clone().run_placement(shutdown.clone()));

    for i in 0..9 {
        sched.submit(task(i));
    }
    tokio::time::advance(Duration::from_millis(10)).await;
    tokio::task::yield_now().await;

    let before: usize = sched.fleet().iter().map(|n| n.queue_len()).sum();
    assert_eq!(before, 9);

    sched.kill(NodeId(0));
    tokio::time::advance(Duration::from_millis(10)).await;
    tokio::task::yield_now().await;

    let after: usize = sched.fleet().iter().map(|n| n.queue_len()).sum();
    assert_eq!(after, 9, "killed node's queue must be fully re-homed, nothing lost");

    placement.abort();
}

/// Invariant 3: round-robin placement counts differ by at most 1 across
/// N active nodes after M submissions.
#[tokio::test(start_paused = true)]
async fn round_robin_is_fair_within_one() {
    let sched = Scheduler::new(4, Policy::RoundRobin);
    let (_tx, shutdown) = watch::channel(false);
    let placement = tokio::spawn(sched.clone().run_placement(shutdown.clone()));

    for i in 0..37 {
        sched.submit(task(i));
    }
    tokio::time::advance(Duration::from_millis(10)).await;
    tokio::task::yield_now().await;

    let counts: Vec<u64> = (0..4).map(|i| sched.placement_count(NodeId(i))).collect();
    let max = *counts.iter().max().unwrap();
    let min = *counts.iter().min().unwrap();
    assert!(max - min <= 1, "counts {:?} differ by more than 1", counts);

    placement.abort();
}

/// Invariant 4: every placement under least_loaded lands on the node
/// with the smallest pre-placement queue length.
#[tokio::test(start_paused = true)]
async fn least_loaded_always_picks_the_shortest_queue() {
    let sched = Scheduler::new(3, Policy::LeastLoaded);
    let (_tx, shutdown) = watch::channel(false);
    // no node loops spawned: queue lengths only grow via placement, so
    // the min-queue invariant is directly observable between submits.
    let placement = tokio::spawn(sched.clone().run_placement(shutdown.clone()));

    for i in 0..12 {
        sched.submit(task(i));
        tokio::time::advance(Duration::from_millis(5)).await;
        tokio::task::yield_now().await;
    }

    let lens: Vec<usize> = sched.fleet().iter().map(|n| n.queue_len()).collect();
    let max = *lens.iter().max().unwrap();
    let min = *lens.iter().min().unwrap();
    assert!(max - min <= 1, "least_loaded should balance within one: {:?}", lens);

    placement.abort();
}

/// Invariant 5: work-stealing progress — a lopsided fleet rebalances
/// within one stealing period.
#[tokio::test(start_paused = true)]
async fn stealing_migrates_from_busy_to_idle() {
    let sched = Scheduler::new(2, Policy::WorkStealing);
    let (_tx, shutdown) = watch::channel(false);
    for i in 0..10 {
        sched.fleet()[0].push(task(i));
    }
    assert_eq!(sched.fleet()[1].queue_len(), 0);

    let stealing = tokio::spawn(sched.clone().run_stealing(shutdown.clone()));
    tokio::time::advance(Duration::from_millis(300)).await;
    tokio::task::yield_now().await;

    assert!(sched.migrations() >= 1);
    assert!(sched.fleet()[1].queue_len() > 0);

    stealing.abort();
}

/// Regression: a push racing a kill on another OS thread must never lose
/// the task. Runs on the real multi-thread runtime (the default for
/// `main.rs`) so the two calls can genuinely interleave, rather than
/// relying on a hand-picked sequential ordering.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_push_and_kill_never_loses_a_task() {
    let node = Arc::new(Node::new(NodeId(0), 1.0));
    let total = 500u64;

    let pusher = {
        let node = node.clone();
        tokio::spawn(async move {
            let mut bounced = Vec::new();
            for i in 0..total {
                if let Some(t) = node.push(task(i)) {
                    bounced.push(t.id.0);
                }
            }
            bounced
        })
    };
    let killer = {
        let node = node.clone();
        tokio::spawn(async move {
            for _ in 0..50 {
                node.kill();
                node.revive();
            }
        })
    };

    let bounced = pusher.await.unwrap();
    killer.await.unwrap();

    // Whatever wasn't bounced back must still be sitting in the queue;
    // a final kill drains it regardless of current active state.
    let remaining = node.kill();
    let mut seen: Vec<u64> = remaining.into_iter().map(|t| t.id.0).chain(bounced).collect();
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len() as u64, total, "every pushed task must be accounted for exactly once");
}

/// Invariant 6: snapshot shape is always consistent with fleet size.
#[tokio::test]
async fn snapshot_shape_matches_fleet_size() {
    let sched = Scheduler::new(5, Policy::LeastLoaded);
    let snap = sched.snapshot(false, false);
    assert_eq!(snap.queue_lengths.len(), 5);
    assert_eq!(snap.node_status.len(), 5);
    assert_eq!(snap.completed.len(), 5);
    assert!((0.0..=100.0).contains(&snap.utilization));
}

/// Steal safety (invariant 2) exercised through the node's real
/// processing loop instead of calling `steal` directly: stealing never
/// removes a task the node has already started servicing.
#[tokio::test(start_paused = true)]
async fn steal_never_races_in_flight_service() {
    let node = Arc::new(Node::new(NodeId(0), 1.0));
    for i in 0..6 {
        node.push(task(i));
    }
    let (tx, mut rx) = mpsc::unbounded_channel::<Completion>();
    let (_stx, shutdown) = watch::channel(false);
    let handle = tokio::spawn(node.clone().run(tx, shutdown));

    // let the node pop its first task and go busy
    tokio::time::advance(Duration::from_millis(1)).await;
    tokio::task::yield_now().await;

    let stolen = node.steal(10);
    // the in-flight task (id 0) must never appear among the stolen set
    assert!(!stolen.iter().any(|t| t.id.0 == 0));

    tokio::time::advance(Duration::from_secs(2)).await;
    let completion = rx.recv().await.unwrap();
    assert_eq!(completion.task.id.0, 0);

    handle.abort();
}
