//! The uniform transport contract (§4.3) shared by stdio, legacy SSE, and
//! streamable HTTP.
//!
//! A transport is a connection to exactly one MCP server. The coordinator
//! talks to it only through the [`Transport`] trait; everything
//! transport-specific (framing, reconnection, OAuth headers) stays behind
//! that boundary.

#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod config;
pub mod error;
pub mod transport;
pub mod types;

pub use config::{
    OAuthTransportConfig, RateLimitConfig, ReconnectionConfig, SseConfig, StdioConfig,
    StreamableHttpConfig,
};
pub use error::{TransportError, TransportResult};
pub use transport::{BoxFuture, InboundReceiver, InboundSender, Transport, inbound_channel};
pub use types::{TransportCapabilities, TransportKind, TransportState};
