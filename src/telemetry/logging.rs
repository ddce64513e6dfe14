//! Structured logging layer using the `tracing` crate.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{Error, Result};

/// Output format for the logging layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Pretty console output with colors.
    Pretty,
    /// Single-line JSON, for piping into log aggregators.
    Json,
}

/// Initialize global logging based on a CLI verbosity count (`-v`, `-vv`, ...).
///
/// `0` maps to `warn`, `1` to `info`, `2` to `debug`, `3+` to `trace`.
pub fn init_from_verbosity(verbosity: u8, format: LogFormat) -> Result<()> {
    let default_filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match format {
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(verbosity >= 2)
                    .with_span_events(if verbosity >= 3 {
                        FmtSpan::NEW | FmtSpan::CLOSE
                    } else {
                        FmtSpan::NONE
                    }),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init(),
    };

    result.map_err(|e| Error::Config(e.to_string()))
}
