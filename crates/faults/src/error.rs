//! Error types for the fault-action engine.

use std::io;
use std::process::ExitStatus;

use faultline_events::EventKind;
use thiserror::Error;

/// Result type alias for fault-action operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building or running fault actions.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration failed validation.
    #[error("config error: {0}")]
    Config(String),

    /// Selection weights are unusable.
    #[error("invalid action weights: {0}")]
    InvalidWeights(String),

    /// IO operation failed.
    #[error("{0}: {1}")]
    Io(&'static str, #[source] io::Error),

    /// A required external command was not configured.
    #[error("missing command: {0}")]
    MissingCommand(&'static str),

    /// External command exited unsuccessfully.
    #[error("`{command}` exited with non-zero status: {status}")]
    NonZeroExit {
        /// The command line that ran.
        command: String,
        /// Its exit status.
        status: ExitStatus,
    },

    /// External command could not be started.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        /// The command line that failed.
        command: String,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// No response can be generated for this event kind.
    #[error("cannot acknowledge event of kind {0}")]
    UnsupportedEvent(EventKind),

    /// YAML decode error.
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}
