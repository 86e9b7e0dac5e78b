//! Transport kind, lifecycle state, and capability flags.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which of the three in-scope transports a session is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Newline-delimited JSON over a child process's stdin/stdout.
    Stdio,
    /// Two-endpoint legacy SSE transport.
    Sse,
    /// Single-endpoint streamable HTTP transport.
    StreamableHttp,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportKind::Stdio => "stdio",
            TransportKind::Sse => "sse",
            TransportKind::StreamableHttp => "streamable_http",
        };
        write!(f, "{s}")
    }
}

/// Lifecycle state of a transport instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportState {
    /// Constructed but `start()` has not been called.
    Idle,
    /// `start()` is in flight (spawning a process, opening a socket).
    Starting,
    /// Connected and able to service `request()`.
    Running,
    /// `close()` is in flight.
    Closing,
    /// Closed, either deliberately or because the peer went away.
    Closed,
    /// An unrecoverable error occurred; the transport must be rebuilt.
    Failed {
        /// Human-readable failure reason.
        reason: String,
    },
}

impl TransportState {
    /// True for [`TransportState::Running`]; the only state in which
    /// `request()` should be attempted.
    #[must_use]
    pub fn alive(&self) -> bool {
        matches!(self, TransportState::Running)
    }
}

/// Capability flags a transport implementation reports, consulted by the
/// coordinator when deciding which optional behaviors to enable (e.g.
/// whether to open a long-lived SSE stream after `initialize`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransportCapabilities {
    /// True if the transport can receive server-initiated requests and
    /// notifications without the client first polling for them.
    pub supports_server_push: bool,
    /// True if the transport binds a server-issued session id (streamable
    /// HTTP only).
    pub supports_session_id: bool,
    /// True if the transport can resume a dropped stream via an event id
    /// (legacy SSE, streamable HTTP).
    pub supports_resumption: bool,
}
