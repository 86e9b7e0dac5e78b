//! The [`Transport`] trait: spec.md §4.3's uniform contract.
//!
//! Modeled on `turbomcp-transport-traits::traits::Transport` — an
//! object-safe trait returning `Pin<Box<dyn Future>>` rather than
//! `#[async_trait]`, so a session can hold `Box<dyn Transport>` without the
//! extra allocation `async_trait` would add on every call. Inbound
//! server→client messages are delivered out-of-band on an `mpsc` channel
//! ("an implicit callback channel on which each inbound envelope is
//! delivered to the coordinator as a `Result`") rather than through the
//! trait itself, since the coordinator must keep receiving pushed
//! notifications while a `request()` call is also in flight.

use crate::error::TransportResult;
use crate::types::TransportState;
use mcp_protocol::Message;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Sending half of the inbound-message channel a transport is handed at
/// construction time.
pub type InboundSender = tokio::sync::mpsc::Sender<Message>;

/// Receiving half, held by the coordinator.
pub type InboundReceiver = tokio::sync::mpsc::Receiver<Message>;

/// Creates a bounded inbound-message channel. 256 is generous headroom for
/// notification bursts between coordinator poll cycles; backpressure above
/// that indicates the coordinator has stalled, which is itself a bug worth
/// surfacing as a full channel rather than silently buffering forever.
#[must_use]
pub fn inbound_channel() -> (InboundSender, InboundReceiver) {
    tokio::sync::mpsc::channel(256)
}

/// A boxed future, the escape hatch that keeps [`Transport`] object-safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The contract every MCP transport implements (§4.3).
///
/// Every inbound envelope — whether it's the reply to a `request()` call,
/// an unsolicited server-initiated request, or a notification — is pushed
/// to the [`InboundSender`] given to the transport at construction. Callers
/// of `request(..., wait_for_response = true)` additionally get the
/// matching `Result` back directly for convenience, but it arrives on the
/// channel too; the coordinator is the only place that actually
/// de-duplicates by id.
pub trait Transport: Send + Sync + fmt::Debug {
    /// Opens the underlying connection (spawns the child process, opens the
    /// SSE stream, etc.). Idempotent: calling `start` on an already-running
    /// transport is a no-op.
    fn start(&self) -> BoxFuture<'_, TransportResult<()>>;

    /// Tears the connection down and releases any background tasks.
    /// Idempotent.
    fn close(&self) -> BoxFuture<'_, TransportResult<()>>;

    /// Sends one JSON-RPC body. When `wait_for_response` is true, blocks
    /// until the matching response arrives (or the transport's own
    /// request timeout elapses) and returns it directly; when false
    /// (fire-and-forget, e.g. notifications), returns `Ok(None)`
    /// immediately after the write succeeds.
    fn request(
        &self,
        body: serde_json::Value,
        wait_for_response: bool,
    ) -> BoxFuture<'_, TransportResult<Option<Message>>>;

    /// Current lifecycle state.
    fn state(&self) -> TransportState;

    /// Shorthand for `state().alive()`.
    fn alive(&self) -> bool {
        self.state().alive()
    }

    /// Propagates the protocol version negotiated during `initialize` so
    /// subsequent HTTP requests can carry `mcp-protocol-version` (§4.3.3).
    /// A no-op for transports that don't carry the header (stdio).
    fn set_protocol_version(&self, version: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Stub(std::sync::Mutex<TransportState>);

    impl Transport for Stub {
        fn start(&self) -> BoxFuture<'_, TransportResult<()>> {
            Box::pin(async move {
                *self.0.lock().unwrap() = TransportState::Running;
                Ok(())
            })
        }
        fn close(&self) -> BoxFuture<'_, TransportResult<()>> {
            Box::pin(async move {
                *self.0.lock().unwrap() = TransportState::Closed;
                Ok(())
            })
        }
        fn request(
            &self,
            _body: serde_json::Value,
            _wait_for_response: bool,
        ) -> BoxFuture<'_, TransportResult<Option<Message>>> {
            Box::pin(async move { Ok(None) })
        }
        fn state(&self) -> TransportState {
            self.0.lock().unwrap().clone()
        }
        fn set_protocol_version(&self, _version: &str) {}
    }

    #[tokio::test]
    async fn dyn_compatible_and_drives_lifecycle() {
        let t: Box<dyn Transport> = Box::new(Stub(std::sync::Mutex::new(TransportState::Idle)));
        assert!(!t.alive());
        t.start().await.unwrap();
        assert!(t.alive());
        t.close().await.unwrap();
        assert!(!t.alive());
    }
}
