//! Transport-layer error type.
//!
//! Kept separate from [`mcp_protocol::McpError`] so transport crates don't
//! need to depend on the coordinator's full taxonomy; `mcp-client` converts
//! at the boundary (see its error-conversion helpers).

use std::fmt;

/// Result alias used throughout the transport crates.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors a [`crate::Transport`] implementation can raise.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Socket/IO failure or unparseable body.
    #[error("io error: {0}")]
    Io(String),

    /// The transport was asked to operate before `start()` or after
    /// `close()`.
    #[error("transport is not running")]
    NotRunning,

    /// The child process or connection died unexpectedly.
    #[error("transport closed: {0}")]
    Closed(String),

    /// HTTP 404 on the streamable endpoint: the session has expired.
    #[error("session expired")]
    SessionExpired,

    /// HTTP 401: caller should attempt OAuth and retry once.
    #[error("authentication challenge: {www_authenticate}")]
    AuthenticationChallenge {
        /// The raw `WWW-Authenticate` header value.
        www_authenticate: String,
        /// `mcp-resource-metadata-url` response header, if present (RFC 9728).
        resource_metadata_url: Option<String>,
    },

    /// HTTP 4xx/5xx with no more specific classification.
    #[error("http {status}: {message}")]
    Http {
        /// Response status code.
        status: u16,
        /// Best-effort message, taken from the body's `error.message` if present.
        message: String,
    },

    /// A deadline elapsed while waiting for a reply.
    #[error("timed out waiting for a response")]
    Timeout,

    /// The caller requested something this transport build does not provide.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// A reconnection loop exhausted its retry budget.
    #[error("reconnection exhausted after {attempts} attempts: {last_error}")]
    ReconnectExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The error from the final attempt.
        last_error: String,
    },
}

impl TransportError {
    /// Wraps an I/O error's display string.
    #[must_use]
    pub fn io(err: impl fmt::Display) -> Self {
        TransportError::Io(err.to_string())
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Io(format!("malformed json: {err}"))
    }
}
