//! Error types for simdispatch.
//!
//! The scheduling kernel itself is infallible by construction — nothing
//! inside the placement loop, the stealing loop, or a node's processing
//! loop can fail. The fallible surface is entirely in the ambient
//! concerns around it: binding the control socket, writing the CSV
//! recording sink, and loading configuration.

use thiserror::Error;

/// Result type alias for simdispatch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for simdispatch's ambient (non-kernel) operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The control/telemetry HTTP+WebSocket listener failed to bind.
    #[error("failed to bind control surface on {addr}: {source}")]
    Bind {
        /// Address that failed to bind.
        addr: std::net::SocketAddr,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The CSV recording sink failed to open or write.
    #[error("recording sink error: {0}")]
    Recording(#[source] std::io::Error),

    /// Configuration could not be parsed or loaded.
    #[error("configuration error: {0}")]
    Config(String),
}
