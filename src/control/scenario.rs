//! Scripted demonstration scenario: a fixed sequence of policy changes,
//! a burst, and a kill/revive cycle, used to exercise the whole system
//! end to end for a dashboard audience.

use std::sync::atomic::Ordering;
use std::time::Duration;

use tracing::info;

use crate::node::NodeId;
use crate::scheduler::Policy;

use super::state::AppState;

/// Run the scripted scenario if not already active. Idempotent: a
/// second call while one is running is rejected silently, using the
/// scenario-active flag as a mutex.
pub async fn run_scenario(state: std::sync::Arc<AppState>) {
    if state
        .scenario_active
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        info!("scenario already active, ignoring start_scenario");
        return;
    }

    info!("scenario starting");
    let sched = &state.runtime.scheduler;

    sched.set_policy(Policy::LeastLoaded);
    tokio::time::sleep(Duration::from_secs(2)).await;

    state.runtime.generator.trigger_burst();
    tokio::time::sleep(Duration::from_secs(8)).await;

    sched.kill(NodeId(0));
    tokio::time::sleep(Duration::from_secs(6)).await;

    sched.revive(NodeId(0));
    tokio::time::sleep(Duration::from_secs(4)).await;

    sched.set_policy(Policy::WorkStealing);

    state.scenario_active.store(false, Ordering::Release);
    info!("scenario finished");
}
