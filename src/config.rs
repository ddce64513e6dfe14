//! Process configuration: fleet size, default policy, bind address, and
//! generator rate, overridable from the command line.
//!
//! No environment variables or config files are required by the core
//! (spec.md §6); CLI flags simply override struct defaults, following
//! the shape of the teacher's `Cli`/`ApiConfig` split without the extra
//! machinery this simulator doesn't need.

use std::net::SocketAddr;

use clap::Parser;

use crate::scheduler::Policy;
use crate::telemetry::LogFormat;

/// simdispatch — an interactive, visualizable distributed task
/// scheduler simulator.
#[derive(Parser, Debug, Clone)]
#[command(name = "simdispatch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Number of worker nodes in the fleet.
    #[arg(long, default_value_t = 4)]
    pub nodes: usize,

    /// Initial placement policy.
    #[arg(long, default_value = "work_stealing")]
    pub policy: String,

    /// Address to bind the control/telemetry HTTP+WebSocket surface to.
    #[arg(long, default_value = "127.0.0.1:8765")]
    pub bind: SocketAddr,

    /// Lower bound of the generator's inter-arrival rate, seconds.
    #[arg(long, default_value_t = 0.3)]
    pub rate_low: f64,

    /// Upper bound of the generator's inter-arrival rate, seconds.
    #[arg(long, default_value_t = 0.8)]
    pub rate_high: f64,

    /// Seed the workload generator's RNG for deterministic runs.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit structured JSON logs instead of pretty console output.
    #[arg(long)]
    pub json_logs: bool,
}

impl Cli {
    /// Parsed log format from the `--json-logs` flag.
    pub fn log_format(&self) -> LogFormat {
        if self.json_logs {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }

    /// Resolved, validated application configuration.
    pub fn into_config(self) -> crate::error::Result<AppConfig> {
        let policy = self
            .policy
            .parse::<Policy>()
            .map_err(|_| crate::error::Error::Config(format!("unknown policy: {}", self.policy)))?;

        if self.nodes == 0 {
            return Err(crate::error::Error::Config(
                "nodes must be at least 1".to_string(),
            ));
        }
        if !(self.rate_low > 0.0 && self.rate_low <= self.rate_high) {
            return Err(crate::error::Error::Config(
                "rate_low must be > 0 and <= rate_high".to_string(),
            ));
        }

        Ok(AppConfig {
            nodes: self.nodes,
            policy,
            bind: self.bind,
            rate_low: self.rate_low,
            rate_high: self.rate_high,
            seed: self.seed,
        })
    }
}

/// Validated, immutable application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Fleet size, fixed at process start.
    pub nodes: usize,
    /// Default policy, fixed at process start.
    pub policy: Policy,
    /// Control/telemetry surface bind address.
    pub bind: SocketAddr,
    /// Initial generator rate lower bound, seconds.
    pub rate_low: f64,
    /// Initial generator rate upper bound, seconds.
    pub rate_high: f64,
    /// Optional fixed RNG seed for the generator.
    pub seed: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(policy: &str, nodes: usize) -> Cli {
        Cli {
            nodes,
            policy: policy.to_string(),
            bind: "127.0.0.1:8765".parse().unwrap(),
            rate_low: 0.3,
            rate_high: 0.8,
            seed: None,
            verbose: 0,
            json_logs: false,
        }
    }

    #[test]
    fn valid_cli_resolves_to_config() {
        let config = cli("least_loaded", 4).into_config().unwrap();
        assert_eq!(config.nodes, 4);
        assert_eq!(config.policy, Policy::LeastLoaded);
    }

    #[test]
    fn unknown_policy_is_rejected() {
        assert!(cli("bogus", 4).into_config().is_err());
    }

    #[test]
    fn zero_nodes_is_rejected() {
        assert!(cli("least_loaded", 0).into_config().is_err());
    }

    #[test]
    fn inverted_rate_range_is_rejected() {
        let mut c = cli("least_loaded", 4);
        c.rate_low = 0.9;
        c.rate_high = 0.3;
        assert!(c.into_config().is_err());
    }
}
