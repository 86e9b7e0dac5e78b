//! The MCP coordinator (§4.5): session lifecycle, request/response
//! correlation, server-initiated request dispatch, the two handler
//! registries (§4.6), cancellable operations, and the thin public adapter
//! that wires a transport to a running coordinator.
//!
//! Everything in this crate runs atop the [`mcp_transport_traits::Transport`]
//! contract; it has no idea whether the concrete transport underneath is
//! stdio, legacy SSE, or streamable HTTP.

#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]
#![allow(clippy::module_name_repetitions)]

pub mod adapter;
pub mod cancellable;
pub mod coordinator;
pub mod dispatch;
pub mod error;
pub mod promise;
pub mod registry;
pub mod scheduler;

pub use adapter::{
    connect_legacy_sse, connect_stdio, connect_streamable_http, connect_streamable_http_with_oauth,
    connect_streamable_http_with_oauth_storage,
};
pub use cancellable::{CancelOutcome, CancellableOperation, OperationState};
pub use coordinator::{Coordinator, CoordinatorBuilder};
pub use dispatch::{Decision, Handler, HitlHandler, NotificationSink, SamplingHandler, ElicitationHandler, ToolCallContext};
pub use promise::{Outcome, Promise, PromiseHandle};
pub use registry::approvals::{self, ApprovalContext, ApprovalOutcome, ApprovalRegistry};
pub use registry::elicitations::{ElicitationRegistry};
pub use registry::Registry;

pub use mcp_protocol::{McpError, McpResult};
