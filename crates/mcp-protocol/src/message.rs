//! [`Message`]: a validated envelope paired with the session it arrived on.
//!
//! Everything above the transport layer works with `Message`, not raw
//! `Envelope`/`Value`, so that classification (`ping?`, `sampling?`, ...) is
//! computed once and the id-matching helper is available without re-parsing.

use crate::envelope::{Envelope, JsonRpcError, NotificationEnvelope, RequestEnvelope, RequestId, ResponseEnvelope};
use crate::error::McpError;
use crate::methods;
use serde_json::Value;

/// A classified inbound or outbound message, scoped to the session it
/// belongs to.
#[derive(Debug, Clone)]
pub struct Message {
    envelope: Envelope,
    session_id: Option<String>,
}

impl Message {
    /// Wraps a validated envelope with the session-id active when it was
    /// produced (the coordinator stamps this on every inbound message).
    #[must_use]
    pub fn new(envelope: Envelope, session_id: Option<String>) -> Self {
        Self { envelope, session_id }
    }

    /// The session-id this message was received on or sent under, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// The underlying classified envelope.
    #[must_use]
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// The request/response id, if this message carries one.
    #[must_use]
    pub fn id(&self) -> Option<&RequestId> {
        self.envelope.id()
    }

    /// The method name, if this message is a request or notification.
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        self.envelope.method()
    }

    /// The `params` value, if present.
    #[must_use]
    pub fn params(&self) -> Option<&Value> {
        match &self.envelope {
            Envelope::Request(r) => r.params.as_ref(),
            Envelope::Notification(n) => n.params.as_ref(),
            Envelope::Response(_) => None,
        }
    }

    /// The `result` value, if this is a successful response.
    #[must_use]
    pub fn result(&self) -> Option<&Value> {
        match &self.envelope {
            Envelope::Response(r) => r.result.as_ref(),
            _ => None,
        }
    }

    /// The error object, if this is a failed response.
    #[must_use]
    pub fn error(&self) -> Option<&JsonRpcError> {
        match &self.envelope {
            Envelope::Response(r) => r.error.as_ref(),
            _ => None,
        }
    }

    /// The `nextCursor` field of a paginated list result, if present.
    #[must_use]
    pub fn next_cursor(&self) -> Option<&str> {
        self.result()
            .and_then(|r| r.get("nextCursor"))
            .and_then(Value::as_str)
    }

    /// True if this is a one-way message (no id).
    #[must_use]
    pub fn notification(&self) -> bool {
        matches!(self.envelope, Envelope::Notification(_))
    }

    /// True if this is a request awaiting a reply.
    #[must_use]
    pub fn request(&self) -> bool {
        matches!(self.envelope, Envelope::Request(_))
    }

    /// True if this is a reply to a previously sent request.
    #[must_use]
    pub fn response(&self) -> bool {
        matches!(self.envelope, Envelope::Response(_))
    }

    /// True if this is a `ping` request (server- or client-initiated).
    #[must_use]
    pub fn ping(&self) -> bool {
        self.method() == Some(methods::PING)
    }

    /// True if this is a server-initiated `roots/list` request.
    #[must_use]
    pub fn roots(&self) -> bool {
        self.method() == Some(methods::ROOTS_LIST)
    }

    /// True if this is a server-initiated `sampling/createMessage` request.
    #[must_use]
    pub fn sampling(&self) -> bool {
        self.method() == Some(methods::SAMPLING_CREATE_MESSAGE)
    }

    /// True if this is a server-initiated `elicitation/create` request.
    #[must_use]
    pub fn elicitation(&self) -> bool {
        self.method() == Some(methods::ELICITATION_CREATE)
    }

    /// True if this is a successful `tools/call` response whose result does
    /// not carry the in-band `isError` flag.
    #[must_use]
    pub fn tool_success(&self) -> bool {
        match self.result() {
            Some(result) => !result.get("isError").and_then(Value::as_bool).unwrap_or(false),
            None => false,
        }
    }

    /// True if this response represents a tool execution failure: either a
    /// JSON-RPC error, or a successful envelope whose result carries
    /// `isError: true`.
    #[must_use]
    pub fn execution_error(&self) -> bool {
        if self.error().is_some() {
            return true;
        }
        self.result()
            .and_then(|r| r.get("isError"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Compares this message's id against `other`, handling numeric/string
    /// cross-representation (see [`RequestId::matches`]).
    #[must_use]
    pub fn matching_id(&self, other: &RequestId) -> bool {
        self.id().is_some_and(|id| id.matches(other))
    }

    /// Converts a failed response into a typed [`McpError`].
    ///
    /// Returns `None` if this message is not a failed response; there is
    /// nothing to raise.
    #[must_use]
    pub fn raise_error(&self) -> Option<McpError> {
        self.error().map(|e| McpError::from_rpc_error(e.code, e.message.clone()))
    }

    /// Builds a `Message` wrapping a request envelope.
    #[must_use]
    pub fn from_request(request: RequestEnvelope, session_id: Option<String>) -> Self {
        Self::new(Envelope::Request(request), session_id)
    }

    /// Builds a `Message` wrapping a notification envelope.
    #[must_use]
    pub fn from_notification(notification: NotificationEnvelope, session_id: Option<String>) -> Self {
        Self::new(Envelope::Notification(notification), session_id)
    }

    /// Builds a `Message` wrapping a response envelope.
    #[must_use]
    pub fn from_response(response: ResponseEnvelope, session_id: Option<String>) -> Self {
        Self::new(Envelope::Response(response), session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::validate;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn msg(value: Value) -> Message {
        Message::new(validate(&value).unwrap(), Some("sess-1".to_string()))
    }

    #[test]
    fn classifies_sampling_request() {
        let m = msg(json!({"jsonrpc": "2.0", "id": "s1", "method": "sampling/createMessage", "params": {}}));
        assert!(m.sampling());
        assert!(!m.roots());
        assert!(m.request());
    }

    #[test]
    fn tool_success_without_is_error() {
        let m = msg(json!({"jsonrpc": "2.0", "id": 3, "result": {"content": []}}));
        assert!(m.tool_success());
        assert!(!m.execution_error());
    }

    #[test]
    fn tool_result_with_is_error_flag() {
        let m = msg(json!({"jsonrpc": "2.0", "id": 3, "result": {"content": [], "isError": true}}));
        assert!(!m.tool_success());
        assert!(m.execution_error());
    }

    #[test]
    fn raise_error_on_response_error() {
        let m = msg(json!({"jsonrpc": "2.0", "id": 4, "error": {"code": -32601, "message": "nope"}}));
        let err = m.raise_error().expect("expected an error");
        assert_eq!(err.kind(), crate::error::ErrorKind::MethodNotFound);
    }

    #[test]
    fn matching_id_crosses_representation() {
        let m = msg(json!({"jsonrpc": "2.0", "id": 5, "result": {}}));
        assert!(m.matching_id(&RequestId::String("5".to_string())));
    }

    #[test]
    fn next_cursor_extracted_from_result() {
        let m = msg(json!({"jsonrpc": "2.0", "id": 6, "result": {"tools": [], "nextCursor": "page2"}}));
        assert_eq!(m.next_cursor(), Some("page2"));
    }

    #[test]
    fn session_id_is_carried() {
        let m = msg(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}));
        assert_eq!(m.session_id(), Some("sess-1"));
        assert!(m.notification());
    }
}
