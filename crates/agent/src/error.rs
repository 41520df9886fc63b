//! Error types for the agent.

use thiserror::Error;

/// Result type alias for agent operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the agent.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Fault-action engine error.
    #[error(transparent)]
    Faults(#[from] faultline_faults::Error),

    /// Transport error.
    #[error(transparent)]
    Relay(#[from] faultline_relay::Error),

    /// Task failed to complete.
    #[error(transparent)]
    Task(#[from] tokio::task::JoinError),

    /// Unrecognized action identifier or wire error.
    #[error(transparent)]
    Wire(#[from] faultline_events::Error),
}
