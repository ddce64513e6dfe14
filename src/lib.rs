//! simdispatch — an interactive, visualizable distributed task
//! scheduler simulator.
//!
//! A synthetic workload generator produces tasks with variable service
//! demand; a scheduler dispatches them across a small fleet of worker
//! nodes under a chosen placement policy; operators inject faults,
//! trigger bursts, switch policies live, and record timeseries metrics
//! through a WebSocket control surface.
//!
//! ## Core Concepts
//!
//! - **Task**: a unit of simulated work with a demand in seconds.
//! - **Node**: a simulated worker with an owned FIFO queue.
//! - **Scheduler**: owns the fleet, the ingest queue, the placement
//!   policy, the stealing loop, and completion bookkeeping.
//! - **Workload Generator**: synthesizes tasks at a configurable rate.
//! - **Control Surface**: the HTTP+WebSocket dashboard and command sink.
//!
//! ## Architecture
//!
//! ```text
//! Generator ──submit──▶ ingest queue ──placement──▶ Node queue ──▶ processing
//!                                                         │
//!                                                   completion report
//!                                                         ▼
//!                                                     Scheduler
//!                                                         │
//!                                                  snapshot (150ms)
//!                                                         ▼
//!                                              Control Surface ──▶ subscribers
//! ```

pub mod config;
pub mod control;
pub mod error;
pub mod node;
pub mod runtime;
pub mod scheduler;
pub mod task;
pub mod telemetry;
pub mod workload;

pub use error::{Error, Result};
pub use runtime::SchedulerRuntime;
