//! Error types for the Mumble client.

use thiserror::Error;

use stumble_core::SendError;

/// Errors that can occur while talking to a Mumble server.
///
/// `Clone` so that errors can be broadcast to several listeners.
#[derive(Debug, Clone, Error)]
pub enum MumbleError {
    /// TCP connect or TLS handshake failed.
    #[error("connection to {address} failed: {reason}")]
    ConnectionFailed {
        /// The `mumble://host:port` address.
        address: String,
        /// Reason for failure.
        reason: String,
    },

    /// TLS configuration error (bad identity, unsupported platform setup).
    #[error("TLS error: {0}")]
    Tls(String),

    /// A frame header announced a payload above the protocol limit.
    #[error("frame payload of {0} bytes exceeds the limit")]
    FrameTooLarge(usize),

    /// A payload could not be decoded as its announced message type.
    #[error("failed to decode {kind} packet: {reason}")]
    Decode {
        /// Message type name.
        kind: &'static str,
        /// Decoder message.
        reason: String,
    },

    /// A message could not be encoded.
    #[error("failed to encode packet: {0}")]
    Encode(String),

    /// The server refused the credentials.
    #[error("rejected by server: {0}")]
    Rejected(String),

    /// The connection task has stopped.
    #[error("not connected")]
    NotConnected,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for MumbleError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<MumbleError> for SendError {
    fn from(err: MumbleError) -> Self {
        match err {
            MumbleError::NotConnected => SendError::NotConnected,
            other => SendError::Failed(other.to_string()),
        }
    }
}

/// Result type for client operations.
pub type MumbleResult<T> = Result<T, MumbleError>;
