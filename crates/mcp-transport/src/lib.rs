//! The two HTTP-family transports (§4.3.2, §4.3.3): legacy two-endpoint SSE
//! and single-endpoint streamable HTTP, plus the rate limiter and SSE
//! framing they share.

#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]
#![allow(clippy::module_name_repetitions)]

pub mod legacy_sse;
pub mod rate_limit;
pub mod sse_codec;
pub mod streamable_http;

pub use legacy_sse::LegacySseTransport;
pub use rate_limit::TokenBucket;
pub use sse_codec::{SseDecoder, SseEvent};
pub use streamable_http::StreamableHttpTransport;

use mcp_protocol::Message;
use mcp_protocol::envelope::RequestId;
use mcp_transport_traits::InboundSender;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::{trace, warn};

pub(crate) fn request_id_from_value(body: &serde_json::Value) -> Option<RequestId> {
    match body.get("id")? {
        serde_json::Value::Number(n) => n.as_i64().map(RequestId::Number),
        serde_json::Value::String(s) => Some(RequestId::String(s.clone())),
        _ => None,
    }
}

/// Parses one SSE event's `data` payload as a JSON-RPC envelope and either
/// resolves a pending response waiter or forwards it to the inbound
/// channel, mirroring the correlation logic in [`mcp_stdio`].
pub(crate) async fn dispatch_sse_payload(
    data: &str,
    pending: &Arc<Mutex<HashMap<RequestId, oneshot::Sender<Message>>>>,
    inbound_tx: &InboundSender,
) {
    if data.trim().is_empty() {
        return;
    }
    let value: serde_json::Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(err) => {
            trace!(target: "mcp_transport", %err, "ignored non-json sse payload");
            return;
        }
    };
    let envelope = match mcp_protocol::envelope::validate(&value) {
        Ok(e) => e,
        Err(err) => {
            warn!(target: "mcp_transport", %err, "dropped invalid sse envelope");
            return;
        }
    };
    let message = Message::new(envelope, None);

    if message.response() {
        if let Some(id) = message.id().cloned() {
            let waiter = pending.lock().unwrap().remove(&id);
            if let Some(tx) = waiter {
                let _ = tx.send(message);
                return;
            }
        }
    }

    let _ = inbound_tx.send(message).await;
}
