//! Error types for the wire data model.

use thiserror::Error;

/// Result type alias for wire operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while encoding or decoding records.
#[derive(Debug, Error)]
pub enum Error {
    /// Record payload was not valid JSON for the expected shape.
    #[error("malformed record: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Frame exceeded the configured maximum size.
    #[error("frame size {size} exceeds maximum {max}")]
    FrameTooLarge {
        /// Size of the frame.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Frame header carried an unknown frame type.
    #[error("unknown frame type: {0:#x}")]
    UnknownFrameType(u8),

    /// Checksum mismatch on a length-prefixed frame.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Checksum carried in the header.
        expected: u32,
        /// Checksum computed over the payload.
        actual: u32,
    },

    /// Identifier does not name a fault action.
    #[error("unknown action identifier: {0}")]
    UnknownAction(String),
}
