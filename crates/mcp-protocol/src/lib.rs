//! JSON-RPC 2.0 envelope validation, the MCP error taxonomy, and the
//! strongly-typed request/response payloads exchanged with an MCP server.
//!
//! This crate has no knowledge of transports or concurrency; it is the
//! vocabulary shared by every other crate in the workspace.

#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod envelope;
pub mod error;
pub mod message;
pub mod types;

pub use envelope::{Envelope, EnvelopeError, RequestId};
pub use error::{ErrorKind, McpError, McpResult};
pub use message::Message;

/// MCP protocol versions this coordinator understands, newest first.
///
/// `start()` rejects a server-reported version absent from this list with
/// [`error::ErrorKind::UnsupportedProtocolVersion`].
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] =
    &["2025-06-18", "2025-03-26", "2024-11-05"];

/// The protocol version this client advertises during `initialize`.
pub const PROTOCOL_VERSION: &str = SUPPORTED_PROTOCOL_VERSIONS[0];

/// Default per-request timeout, milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// MCP method names used by the coordinator.
pub mod methods {
    /// Initialize handshake.
    pub const INITIALIZE: &str = "initialize";
    /// Sent by the client immediately after the initialize response.
    pub const INITIALIZED: &str = "notifications/initialized";
    /// Server health probe, issued by either side.
    pub const PING: &str = "ping";
    /// List available tools.
    pub const TOOLS_LIST: &str = "tools/list";
    /// Invoke a tool.
    pub const TOOLS_CALL: &str = "tools/call";
    /// List readable resources.
    pub const RESOURCES_LIST: &str = "resources/list";
    /// Read one resource.
    pub const RESOURCES_READ: &str = "resources/read";
    /// List resource templates.
    pub const RESOURCES_TEMPLATES_LIST: &str = "resources/templates/list";
    /// Subscribe to resource update notifications.
    pub const RESOURCES_SUBSCRIBE: &str = "resources/subscribe";
    /// List prompts.
    pub const PROMPTS_LIST: &str = "prompts/list";
    /// Fetch a rendered prompt.
    pub const PROMPTS_GET: &str = "prompts/get";
    /// Request a completion suggestion.
    pub const COMPLETION_COMPLETE: &str = "completion/complete";
    /// Set the server's logging verbosity.
    pub const LOGGING_SET_LEVEL: &str = "logging/setLevel";
    /// Client→server notice that an in-flight request has been abandoned.
    pub const NOTIFICATIONS_CANCELLED: &str = "notifications/cancelled";
    /// Client→server notice that the root set changed.
    pub const NOTIFICATIONS_ROOTS_LIST_CHANGED: &str = "notifications/roots/list_changed";
    /// Server→client progress update.
    pub const NOTIFICATIONS_PROGRESS: &str = "notifications/progress";
    /// Server→client log line.
    pub const NOTIFICATIONS_MESSAGE: &str = "notifications/message";
    /// Server→client: a subscribed resource changed.
    pub const NOTIFICATIONS_RESOURCES_UPDATED: &str = "notifications/resources/updated";
    /// Server→client: the resource list changed.
    pub const NOTIFICATIONS_RESOURCES_LIST_CHANGED: &str = "notifications/resources/list_changed";
    /// Server→client: the tool list changed.
    pub const NOTIFICATIONS_TOOLS_LIST_CHANGED: &str = "notifications/tools/list_changed";
    /// Server→client: the prompt list changed.
    pub const NOTIFICATIONS_PROMPTS_LIST_CHANGED: &str = "notifications/prompts/list_changed";
    /// Server-initiated request for filesystem roots.
    pub const ROOTS_LIST: &str = "roots/list";
    /// Server-initiated request for an LLM completion.
    pub const SAMPLING_CREATE_MESSAGE: &str = "sampling/createMessage";
    /// Server-initiated request for structured user input.
    pub const ELICITATION_CREATE: &str = "elicitation/create";
}
