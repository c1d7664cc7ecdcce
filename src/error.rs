//! Error types for simbridge.
//!
//! All fatal conditions in a conversation fall into one of three classes:
//! transport failures, serialization failures, and unsupported operations.
//! The bridge process maps these classes onto its exit codes (see
//! [`crate::bridge`]), so the distinction is load-bearing, not cosmetic.

use thiserror::Error;

/// Main error type for all bridge and driver operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Failed to establish the transport connection.
    #[error("Connection failed: {0}")]
    ConnectionFailed(#[source] std::io::Error),

    /// The peer closed the connection mid-transfer (zero-byte read or write).
    #[error("Connection broken while {0}")]
    ConnectionBroken(&'static str),

    /// I/O error during communication.
    #[error("I/O error: {0}")]
    Io(#[source] std::io::Error),

    /// Malformed structured payload, file grammar, or tool reply framing.
    ///
    /// Classified distinctly from transport errors for diagnostics and for
    /// the bridge's exit-code selection.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Unknown request kind or unknown tool acknowledgement.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Protocol sequencing error (e.g. a response of the wrong kind).
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::ConnectionRefused => {
                BridgeError::ConnectionFailed(err)
            }
            _ => BridgeError::Io(err),
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Serialization(err.to_string())
    }
}

/// Result type alias using BridgeError.
pub type Result<T> = std::result::Result<T, BridgeError>;
