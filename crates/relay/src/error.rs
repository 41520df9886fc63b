//! Error types for the transport.

use std::io;

use thiserror::Error;

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the transport.
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to accept the monitored node's connection.
    #[error("failed to accept connection on {endpoint}: {source}")]
    Accept {
        /// Endpoint being listened on.
        endpoint: String,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// The transport was started twice.
    #[error("transport already started")]
    AlreadyStarted,

    /// Failed to bind the listening endpoint.
    #[error("failed to listen on {endpoint}: {source}")]
    Bind {
        /// Endpoint we tried to bind.
        endpoint: String,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// Generic I/O error.
    #[error("{0}: {1}")]
    Io(&'static str, #[source] io::Error),

    /// A transport task panicked or was aborted.
    #[error("transport task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
