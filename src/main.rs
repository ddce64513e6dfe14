//! simdispatch — entry point.
//!
//! Parses CLI flags, builds the scheduler runtime, spawns every
//! long-lived concurrent activity (node loops, placement, stealing,
//! completions, generator, broadcast ticker), and serves the
//! control/telemetry surface until interrupted.

use clap::Parser;
use simdispatch::config::Cli;
use simdispatch::control::ControlServer;
use simdispatch::runtime::SchedulerRuntime;
use simdispatch::telemetry;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_from_verbosity(cli.verbose, cli.log_format())?;

    let config = cli.into_config()?;
    info!(?config, "starting simdispatch");

    let runtime = SchedulerRuntime::new(config.nodes, config.policy, config.seed);
    runtime.generator.set_rate(config.rate_low, config.rate_high);

    let _core_handles = runtime.spawn_core_activities();

    let server = ControlServer::new(config.bind, runtime.clone());
    let shutdown = runtime.shutdown_receiver();

    tokio::spawn({
        let runtime = runtime.clone();
        async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
            runtime.shutdown();
        }
    });

    server.run(shutdown).await?;
    Ok(())
}
