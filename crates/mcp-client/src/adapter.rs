//! The public facade (§4's "Adapter / Public API" component): thin
//! constructors that wire a transport (and, for the HTTP transports, an
//! optional [`OAuthProvider`]) to a [`Coordinator`] and hand back something
//! an application can call directly, without touching [`CoordinatorBuilder`]
//! or the transport crates itself.
//!
//! Grounded on the teacher's top-level `Client` struct
//! (`turbomcp-client::lib`), which exposes the same tool/resource/prompt
//! operations over its coordinator rather than making callers drive the
//! handshake and id allocation themselves. Chat-integration sugar
//! (`with_tool`, `with_resource`, `ask_prompt`) is out of this core's scope
//! per spec.md §1 and is not reproduced here.

use std::sync::Arc;

use mcp_auth::{AuthStorage, InMemoryAuthStorage, OAuthProvider, OAuthProviderConfig};
use mcp_protocol::types::Implementation;
use mcp_protocol::McpResult;
use mcp_stdio::StdioTransport;
use mcp_transport::{LegacySseTransport, StreamableHttpTransport};
use mcp_transport_traits::{inbound_channel, SseConfig, StdioConfig, StreamableHttpConfig};

use crate::coordinator::{Coordinator, CoordinatorBuilder};

/// Client name/version advertised in `initialize` when the caller doesn't
/// supply its own via [`CoordinatorBuilder::new`].
const DEFAULT_CLIENT_NAME: &str = "mcp-client";
const DEFAULT_CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

fn default_client_info() -> Implementation {
    Implementation::new(DEFAULT_CLIENT_NAME, DEFAULT_CLIENT_VERSION)
}

/// Builds a coordinator over a freshly spawned stdio child process and
/// starts it. The returned coordinator is ready for `tool_list()`,
/// `execute_tool()`, etc.
///
/// # Errors
///
/// Returns an error if the child process cannot be spawned or the
/// `initialize` handshake fails.
pub async fn connect_stdio(config: StdioConfig) -> McpResult<Arc<Coordinator>> {
    let (tx, rx) = inbound_channel();
    let transport = Box::new(StdioTransport::new(config, tx));
    let coordinator = CoordinatorBuilder::new(transport, rx, default_client_info()).build();
    coordinator.start().await?;
    Ok(coordinator)
}

/// Builds a coordinator over the legacy two-endpoint SSE transport and
/// starts it.
///
/// # Errors
///
/// Returns an error if the initial `GET /sse` connection or the
/// `initialize` handshake fails.
pub async fn connect_legacy_sse(config: SseConfig) -> McpResult<Arc<Coordinator>> {
    let (tx, rx) = inbound_channel();
    let transport = Box::new(LegacySseTransport::new(config, tx));
    let coordinator = CoordinatorBuilder::new(transport, rx, default_client_info()).build();
    coordinator.start().await?;
    Ok(coordinator)
}

/// Builds a coordinator over the streamable HTTP transport with no OAuth
/// provider attached (suitable for servers that don't require
/// authentication) and starts it.
///
/// # Errors
///
/// Returns an error if the `initialize` handshake fails.
pub async fn connect_streamable_http(config: StreamableHttpConfig) -> McpResult<Arc<Coordinator>> {
    let (tx, rx) = inbound_channel();
    let transport = Box::new(StreamableHttpTransport::new(config, tx));
    let coordinator = CoordinatorBuilder::new(transport, rx, default_client_info()).build();
    coordinator.start().await?;
    Ok(coordinator)
}

/// Builds a coordinator over the streamable HTTP transport backed by an
/// OAuth provider using an in-memory token store, and starts it. Use this
/// when the server requires authentication but the caller doesn't need a
/// custom [`AuthStorage`] backend.
///
/// # Errors
///
/// Returns an error if the `initialize` handshake fails.
pub async fn connect_streamable_http_with_oauth(
    config: StreamableHttpConfig,
    oauth_config: OAuthProviderConfig,
) -> McpResult<Arc<Coordinator>> {
    connect_streamable_http_with_oauth_storage(config, oauth_config, Arc::new(InMemoryAuthStorage::new())).await
}

/// Same as [`connect_streamable_http_with_oauth`] but with a
/// caller-provided [`AuthStorage`] backend (e.g. one persisting to disk
/// across process restarts).
///
/// # Errors
///
/// Returns an error if the `initialize` handshake fails.
pub async fn connect_streamable_http_with_oauth_storage(
    config: StreamableHttpConfig,
    oauth_config: OAuthProviderConfig,
    storage: Arc<dyn AuthStorage>,
) -> McpResult<Arc<Coordinator>> {
    let (tx, rx) = inbound_channel();
    let oauth = Arc::new(OAuthProvider::new(oauth_config, storage));
    let transport = Box::new(StreamableHttpTransport::with_oauth(config, tx, Some(oauth)));
    let coordinator = CoordinatorBuilder::new(transport, rx, default_client_info()).build();
    coordinator.start().await?;
    Ok(coordinator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_client_info_carries_crate_version() {
        let info = default_client_info();
        assert_eq!(info.name, DEFAULT_CLIENT_NAME);
        assert_eq!(info.version, DEFAULT_CLIENT_VERSION);
    }
}
