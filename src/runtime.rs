//! Process-wide scheduler runtime.
//!
//! Design Notes (spec.md §9) call out that the original source co-locates
//! policy, fleet, generator, recording flag, and subscriber set as
//! process-wide singletons, and suggests packaging them in a single
//! value constructed at startup and passed by reference to every
//! concurrent activity and command handler instead. `SchedulerRuntime`
//! is that value; no global state is used anywhere in this crate.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::node::Completion;
use crate::scheduler::{Policy, Scheduler};
use crate::workload::WorkloadGenerator;

/// Bundles the scheduler, the generator, and the shared shutdown signal
/// that every long-lived activity watches.
pub struct SchedulerRuntime {
    /// The node fleet, ingest queue, and placement/stealing loops.
    pub scheduler: Arc<Scheduler>,
    /// The workload generator.
    pub generator: Arc<WorkloadGenerator>,
    shutdown_tx: watch::Sender<bool>,
}

impl SchedulerRuntime {
    /// Construct a runtime with `nodes` worker nodes and the given
    /// initial policy and generator seed.
    pub fn new(nodes: usize, policy: Policy, seed: Option<u64>) -> Arc<Self> {
        let scheduler = Scheduler::new(nodes, policy);
        let generator = match seed {
            Some(seed) => WorkloadGenerator::with_seed(seed),
            None => WorkloadGenerator::new(),
        };
        let (shutdown_tx, _rx) = watch::channel(false);

        Arc::new(Self {
            scheduler,
            generator,
            shutdown_tx,
        })
    }

    /// A fresh receiver for the shared shutdown signal.
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Signal every long-lived activity to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Spawn every long-lived concurrent activity this runtime owns: one
    /// loop per node, the placement dispatcher, the stealing ticker, the
    /// completion collector, and the generator. The control surface's
    /// broadcast ticker is spawned separately by its own module, since it
    /// also needs the subscriber set and recording sink.
    pub fn spawn_core_activities(self: &Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::new();
        let (completion_tx, completion_rx) = mpsc::unbounded_channel::<Completion>();

        for node in self.scheduler.fleet() {
            let node = node.clone();
            let tx = completion_tx.clone();
            let shutdown = self.shutdown_receiver();
            handles.push(tokio::spawn(async move { node.run(tx, shutdown).await }));
        }
        drop(completion_tx);

        {
            let scheduler = self.scheduler.clone();
            let shutdown = self.shutdown_receiver();
            handles.push(tokio::spawn(
                async move { scheduler.run_placement(shutdown).await },
            ));
        }
        {
            let scheduler = self.scheduler.clone();
            let shutdown = self.shutdown_receiver();
            handles.push(tokio::spawn(async move { scheduler.run_stealing(shutdown).await }));
        }
        {
            let scheduler = self.scheduler.clone();
            let shutdown = self.shutdown_receiver();
            handles.push(tokio::spawn(async move {
                scheduler.run_completions(completion_rx, shutdown).await
            }));
        }
        {
            let generator = self.generator.clone();
            let scheduler = self.scheduler.clone();
            let shutdown = self.shutdown_receiver();
            handles.push(tokio::spawn(
                async move { generator.run(scheduler, shutdown).await },
            ));
        }

        handles
    }
}
