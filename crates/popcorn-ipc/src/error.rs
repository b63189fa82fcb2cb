//! Error types for the backend channel.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::messages::ErrorKind;

/// Primary error type for channel operations.
#[derive(Debug, Error)]
pub enum IpcError {
    /// Reading or writing the transport failed.
    #[error("channel transport failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Source IO error.
        source: io::Error,
    },
    /// A message could not be encoded or decoded.
    #[error("channel message codec failed")]
    Codec {
        /// Message type being processed.
        message_type: String,
        /// Source serde error.
        source: serde_json::Error,
    },
    /// A reply carried another message type than the one expected.
    #[error("unexpected channel message type")]
    UnexpectedType {
        /// Expected message type.
        expected: &'static str,
        /// Received message type.
        actual: String,
    },
    /// No reply arrived within the channel timeout.
    #[error("channel request timed out")]
    Timeout {
        /// Type of the request that timed out.
        message_type: &'static str,
        /// Timeout that elapsed.
        timeout: Duration,
    },
    /// The backend answered with an error.
    #[error("backend rejected the request")]
    Remote {
        /// Type of the rejected request.
        message_type: &'static str,
        /// Classification supplied by the backend.
        kind: ErrorKind,
        /// Backend supplied reason.
        reason: String,
    },
    /// The channel has been closed.
    #[error("channel is closed")]
    Closed,
}

/// Convenience alias for channel results.
pub type IpcResult<T> = Result<T, IpcError>;
