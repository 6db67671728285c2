//! Error types for space-mirror
//!
//! Every failure the engine can observe is a variant of [`Error`], and every
//! variant carries a structural [`Classification`] that drives the backoff
//! executor: rate limits back off exponentially, transient network failures
//! back off linearly, everything else fails fast.
//!
//! Classification is decided from typed signals only (HTTP status codes,
//! platform error codes, `std::io::ErrorKind`). Matching on error message
//! substrings is deliberately not done anywhere in this crate.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for space-mirror operations
pub type Result<T> = std::result::Result<T, Error>;

/// How an error should be treated by the backoff executor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    /// Remote request quota exceeded; retry with exponential backoff
    RateLimited,
    /// Timeout or connection-level failure; retry with linear backoff
    Transient,
    /// Permanent failure (not-found, permission, malformed request); never retry
    Fatal,
}

/// Main error type for space-mirror
#[derive(Debug, Error)]
pub enum Error {
    /// Remote platform rejected the request due to its request quota
    #[error("rate limited by remote platform")]
    RateLimited {
        /// Server-provided minimum wait before retrying, if any
        retry_after: Option<Duration>,
    },

    /// Transport-level HTTP failure (timeout, connection refused, TLS, ...)
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Remote platform returned a server-side HTTP error
    #[error("upstream error: HTTP {status}")]
    Upstream {
        /// The 5xx status code returned by the platform
        status: u16,
    },

    /// Requested node, document, or media token does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Credentials lack access to the requested resource
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Remote platform returned a non-zero application error code
    #[error("remote error {code}: {message}")]
    Remote {
        /// Platform-specific error code from the response envelope
        code: i64,
        /// Human-readable message from the response envelope
        message: String,
    },

    /// Authentication against the platform failed
    #[error("authentication failed: {0}")]
    Auth(String),

    /// A document or space link could not be parsed
    #[error("invalid link: {0}")]
    InvalidLink(String),

    /// The configured media token pattern is not a valid regex
    #[error("invalid media token pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// I/O error while writing exports to disk
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Wire payload could not be decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failure while writing the output archive
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// The traversal's cancellation signal fired
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Classify this error for the backoff executor
    pub fn classification(&self) -> Classification {
        match self {
            Error::RateLimited { .. } => Classification::RateLimited,
            Error::Transport(e) => {
                if e.is_timeout() || e.is_connect() {
                    Classification::Transient
                } else {
                    // Decode/body errors indicate a malformed exchange, not a
                    // flaky link
                    Classification::Fatal
                }
            }
            Error::Upstream { .. } => Classification::Transient,
            Error::Io(e) => match e.kind() {
                std::io::ErrorKind::TimedOut
                | std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::NotConnected
                | std::io::ErrorKind::BrokenPipe
                | std::io::ErrorKind::Interrupted => Classification::Transient,
                _ => Classification::Fatal,
            },
            Error::NotFound(_)
            | Error::PermissionDenied(_)
            | Error::Remote { .. }
            | Error::Auth(_)
            | Error::InvalidLink(_)
            | Error::Pattern(_)
            | Error::Serialization(_)
            | Error::Archive(_)
            | Error::Cancelled => Classification::Fatal,
        }
    }

    /// The server-provided retry hint, if this is a rate-limit error
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}
