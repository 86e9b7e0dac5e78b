//! The error taxonomy shared by every layer above the envelope (§7).
//!
//! `McpError` is one flat enum rather than per-crate error types so a
//! caller can match on `kind()`/`jsonrpc_code()` regardless of which layer
//! raised it. Transport-layer causes are preserved as the `source`.

use crate::envelope::RequestId;
use std::fmt;

/// Result alias used throughout the coordinator core.
pub type McpResult<T> = Result<T, McpError>;

/// Classification of an [`McpError`], used for programmatic dispatch
/// (retry policy, HTTP status translation, JSON-RPC code translation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Socket/IO failure, unparseable body, or an HTTP 4xx/5xx with no
    /// more specific classification.
    Transport,
    /// A request's deadline elapsed before a response arrived.
    Timeout,
    /// The streamable HTTP session expired (server returned 404).
    SessionExpired,
    /// HTTP 401 and the OAuth retry was exhausted or unconfigured.
    AuthenticationRequired,
    /// The server negotiated a protocol version this client cannot speak.
    UnsupportedProtocolVersion,
    /// The caller asked for a transport kind this build does not provide.
    UnsupportedTransport,
    /// The caller asked for an adapter capability the session does not have.
    UnsupportedFeature,
    /// A handler returned a value that didn't match the expected shape.
    InvalidFormat,
    /// A human-in-the-loop or elicitation handler returned an
    /// unrecognized decision.
    InvalidApprovalDecision,
    /// An in-flight server-initiated request was interrupted by
    /// cancellation.
    RequestCancelled,
    /// The server replied with a JSON-RPC error object.
    ResponseError,
    /// Standard JSON-RPC `-32700` parse error.
    ParseError,
    /// Standard JSON-RPC `-32600` invalid request.
    InvalidRequest,
    /// Standard JSON-RPC `-32601` method not found.
    MethodNotFound,
    /// Standard JSON-RPC `-32602` invalid params.
    InvalidParams,
    /// Standard JSON-RPC `-32603` internal error.
    Internal,
}

impl ErrorKind {
    /// Maps this kind to the JSON-RPC error code a coordinator should use
    /// when turning it into a wire-level error response.
    #[must_use]
    pub const fn jsonrpc_code(self) -> i32 {
        match self {
            ErrorKind::ParseError => -32700,
            ErrorKind::InvalidRequest => -32600,
            ErrorKind::MethodNotFound => -32601,
            ErrorKind::InvalidParams => -32602,
            ErrorKind::Internal => -32603,
            ErrorKind::Transport
            | ErrorKind::Timeout
            | ErrorKind::SessionExpired
            | ErrorKind::AuthenticationRequired
            | ErrorKind::UnsupportedProtocolVersion
            | ErrorKind::UnsupportedTransport
            | ErrorKind::UnsupportedFeature
            | ErrorKind::InvalidFormat
            | ErrorKind::InvalidApprovalDecision
            | ErrorKind::RequestCancelled
            | ErrorKind::ResponseError => -32000,
        }
    }

    /// True for conditions that may clear on retry (transport hiccups,
    /// timeouts); used by transports deciding whether to reconnect.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Transport | ErrorKind::Timeout)
    }
}

/// A single error type spanning the envelope, transport, auth, and
/// coordinator layers.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    /// See [`ErrorKind::Transport`].
    #[error("transport error: {0}")]
    Transport(String),

    /// See [`ErrorKind::Timeout`]. Carries the abandoned request id so the
    /// coordinator can correlate the `notifications/cancelled` it emits.
    #[error("request {request_id} timed out")]
    Timeout {
        /// The id of the request that never received a response.
        request_id: RequestId,
    },

    /// See [`ErrorKind::SessionExpired`].
    #[error("session expired")]
    SessionExpired,

    /// See [`ErrorKind::AuthenticationRequired`].
    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    /// See [`ErrorKind::UnsupportedProtocolVersion`].
    #[error("unsupported protocol version: server offered {server}, client supports {supported:?}")]
    UnsupportedProtocolVersion {
        /// The version string the server returned.
        server: String,
        /// The versions this client is willing to speak.
        supported: Vec<&'static str>,
    },

    /// See [`ErrorKind::UnsupportedTransport`].
    #[error("unsupported transport: {0}")]
    UnsupportedTransport(String),

    /// See [`ErrorKind::UnsupportedFeature`].
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// See [`ErrorKind::InvalidFormat`].
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// See [`ErrorKind::InvalidApprovalDecision`].
    #[error("invalid approval decision: {0}")]
    InvalidApprovalDecision(String),

    /// See [`ErrorKind::RequestCancelled`].
    #[error("request cancelled: {0}")]
    RequestCancelled(String),

    /// See [`ErrorKind::ResponseError`]. Carries the server's JSON-RPC
    /// error code and message verbatim.
    #[error("server error {code}: {message}")]
    ResponseError {
        /// JSON-RPC error code returned by the server.
        code: i32,
        /// JSON-RPC error message returned by the server.
        message: String,
    },

    /// Standard JSON-RPC parse/validation failures raised by the envelope
    /// validator or surfaced verbatim from a server error response.
    #[error("{kind}: {message}")]
    Protocol {
        /// Which standard JSON-RPC condition this is.
        kind: ProtocolErrorKind,
        /// Human-readable detail.
        message: String,
    },
}

/// The subset of [`ErrorKind`] that corresponds to standard JSON-RPC 2.0
/// error conditions, broken out so [`McpError::Protocol`] doesn't need one
/// variant per code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolErrorKind {
    /// `-32700`.
    Parse,
    /// `-32600`.
    InvalidRequest,
    /// `-32601`.
    MethodNotFound,
    /// `-32602`.
    InvalidParams,
    /// `-32603`.
    Internal,
}

impl fmt::Display for ProtocolErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProtocolErrorKind::Parse => "parse error",
            ProtocolErrorKind::InvalidRequest => "invalid request",
            ProtocolErrorKind::MethodNotFound => "method not found",
            ProtocolErrorKind::InvalidParams => "invalid params",
            ProtocolErrorKind::Internal => "internal error",
        };
        write!(f, "{s}")
    }
}

impl McpError {
    /// Classifies this error for retry/translation logic.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            McpError::Transport(_) => ErrorKind::Transport,
            McpError::Timeout { .. } => ErrorKind::Timeout,
            McpError::SessionExpired => ErrorKind::SessionExpired,
            McpError::AuthenticationRequired(_) => ErrorKind::AuthenticationRequired,
            McpError::UnsupportedProtocolVersion { .. } => ErrorKind::UnsupportedProtocolVersion,
            McpError::UnsupportedTransport(_) => ErrorKind::UnsupportedTransport,
            McpError::UnsupportedFeature(_) => ErrorKind::UnsupportedFeature,
            McpError::InvalidFormat(_) => ErrorKind::InvalidFormat,
            McpError::InvalidApprovalDecision(_) => ErrorKind::InvalidApprovalDecision,
            McpError::RequestCancelled(_) => ErrorKind::RequestCancelled,
            McpError::ResponseError { .. } => ErrorKind::ResponseError,
            McpError::Protocol { kind, .. } => match kind {
                ProtocolErrorKind::Parse => ErrorKind::ParseError,
                ProtocolErrorKind::InvalidRequest => ErrorKind::InvalidRequest,
                ProtocolErrorKind::MethodNotFound => ErrorKind::MethodNotFound,
                ProtocolErrorKind::InvalidParams => ErrorKind::InvalidParams,
                ProtocolErrorKind::Internal => ErrorKind::Internal,
            },
        }
    }

    /// Builds an error from a JSON-RPC error object returned by the server
    /// (the envelope validator's `raise_error!`).
    #[must_use]
    pub fn from_rpc_error(code: i32, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            -32700 => McpError::Protocol { kind: ProtocolErrorKind::Parse, message },
            -32600 => McpError::Protocol { kind: ProtocolErrorKind::InvalidRequest, message },
            -32601 => McpError::Protocol { kind: ProtocolErrorKind::MethodNotFound, message },
            -32602 => McpError::Protocol { kind: ProtocolErrorKind::InvalidParams, message },
            -32603 => McpError::Protocol { kind: ProtocolErrorKind::Internal, message },
            _ => McpError::ResponseError { code, message },
        }
    }

    /// Shorthand for [`McpError::Transport`].
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        McpError::Transport(message.into())
    }

    /// Shorthand for [`McpError::InvalidFormat`].
    #[must_use]
    pub fn invalid_format(message: impl Into<String>) -> Self {
        McpError::InvalidFormat(message.into())
    }
}

impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_syntax() || err.is_eof() {
            McpError::Protocol { kind: ProtocolErrorKind::Parse, message: err.to_string() }
        } else {
            McpError::Protocol { kind: ProtocolErrorKind::InvalidParams, message: err.to_string() }
        }
    }
}

impl From<crate::envelope::EnvelopeError> for McpError {
    fn from(err: crate::envelope::EnvelopeError) -> Self {
        McpError::Protocol { kind: ProtocolErrorKind::InvalidRequest, message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_error_maps_standard_codes() {
        assert_eq!(McpError::from_rpc_error(-32601, "x").kind(), ErrorKind::MethodNotFound);
        assert_eq!(McpError::from_rpc_error(-32000, "x").kind(), ErrorKind::ResponseError);
    }

    #[test]
    fn retryable_kinds() {
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(ErrorKind::Transport.is_retryable());
        assert!(!ErrorKind::SessionExpired.is_retryable());
    }
}
