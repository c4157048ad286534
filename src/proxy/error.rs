//! Error types for proxy operations.

use thiserror::Error;

/// Unified error type for proxy operations.
///
/// Every failure is terminal for the current request; nothing is retried.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// I/O error (socket operations).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Hyper HTTP error.
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// The request target could not be parsed.
    #[error("Invalid request target: {0}")]
    InvalidTarget(String),

    /// Failed to connect to or fetch from an upstream server.
    #[error("Failed to reach upstream '{addr}': {message}")]
    UpstreamConnect {
        /// The address we tried to reach.
        addr: String,
        /// Error message.
        message: String,
    },
}

/// Result type for proxy operations.
pub type ProxyResult<T> = Result<T, ProxyError>;
