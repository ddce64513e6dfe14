//! Structured logging setup.
//!
//! Trimmed from the ambient telemetry stack this crate is grounded on:
//! just `tracing` + `tracing-subscriber`, no OTLP/Jaeger exporters or
//! metrics registry, since this simulator's only observability surface
//! is its own WebSocket snapshot feed.

pub mod logging;

pub use logging::{init_from_verbosity, LogFormat};
