//! Network error types for framing, serialization and connection liveness.

use std::{io, time::Duration};
use thiserror::Error;

/// Errors a transport can hit while moving messages. Every one of them
/// ends the affected connection; none reach the game logic.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Underlying socket failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Failed to encode a message
    #[error("Failed to encode message: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    /// Failed to decode a message
    #[error("Failed to decode message: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    /// Malformed remote call
    #[error("Invalid remote call: {0}")]
    Json(#[from] serde_json::Error),

    /// Message size exceeded maximum allowed
    #[error("Message size {actual} exceeds maximum {max}")]
    MessageTooLarge { actual: usize, max: usize },

    /// Peer was silent for a whole liveness window
    #[error("No traffic for {0:?}")]
    Timeout(Duration),

    /// Connection already closed
    #[error("Connection closed")]
    Closed,
}

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;
