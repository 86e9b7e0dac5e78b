//! JSON-RPC 2.0 envelope parsing and validation.
//!
//! An [`Envelope`] is the validated shape of one JSON-RPC message: a
//! request, a notification, or a response. Validation happens once, at the
//! transport boundary, so everything upstream of it can match on a closed
//! enum instead of re-checking `serde_json::Value` shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The literal `"2.0"` JSON-RPC version string.
///
/// Serializes/deserializes as exactly that string; any other value fails
/// validation rather than deserialization, so callers get a classified
/// [`EnvelopeError`] instead of a generic serde error.
pub const JSONRPC_VERSION: &str = "2.0";

/// A JSON-RPC request or response id: either a string or an integer.
///
/// MCP servers are free to mint either representation, so comparisons are
/// done by rendering both sides to a canonical string (see
/// [`RequestId::matches`]) rather than requiring type equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// A numeric id, as minted by this coordinator's request counter.
    Number(i64),
    /// A string id, as servers sometimes mint for their own requests.
    String(String),
}

impl RequestId {
    /// Compares two ids for equality across numeric/string representations,
    /// e.g. `RequestId::Number(3)` matches `RequestId::String("3".into())`.
    #[must_use]
    pub fn matches(&self, other: &RequestId) -> bool {
        self.canonical() == other.canonical()
    }

    fn canonical(&self) -> String {
        match self {
            RequestId::Number(n) => n.to_string(),
            RequestId::String(s) => s.clone(),
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        RequestId::String(s)
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Standard or server-defined error code.
    pub code: i32,
    /// Human-readable message.
    pub message: String,
    /// Optional structured detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Builds an error object with no extra data payload.
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

/// A validated request envelope: a non-null id plus a method and optional
/// params, with no `result`/`error` fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Request id, echoed back on the matching response.
    pub id: RequestId,
    /// MCP method name, e.g. `"tools/call"`.
    pub method: String,
    /// Method parameters, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// A validated notification envelope: a method and optional params, no id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEnvelope {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// MCP method name, e.g. `"notifications/cancelled"`.
    pub method: String,
    /// Method parameters, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// A validated response envelope: an id plus exactly one of `result`/`error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Echoes the id of the request this answers.
    pub id: RequestId,
    /// Present on success; mutually exclusive with `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Present on failure; mutually exclusive with `result`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl ResponseEnvelope {
    /// Builds a success response.
    #[must_use]
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Builds an error response.
    #[must_use]
    pub fn failure(id: RequestId, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// A classified, validated JSON-RPC envelope.
#[derive(Debug, Clone)]
pub enum Envelope {
    /// A request awaiting a reply.
    Request(RequestEnvelope),
    /// A one-way message.
    Notification(NotificationEnvelope),
    /// A reply to a previously sent request.
    Response(ResponseEnvelope),
}

impl Envelope {
    /// Returns the `method` field, if this envelope carries one.
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        match self {
            Envelope::Request(r) => Some(&r.method),
            Envelope::Notification(n) => Some(&n.method),
            Envelope::Response(_) => None,
        }
    }

    /// Returns the id, if this envelope carries one.
    #[must_use]
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            Envelope::Request(r) => Some(&r.id),
            Envelope::Notification(_) => None,
            Envelope::Response(r) => Some(&r.id),
        }
    }
}

/// Errors raised while validating a raw JSON value against the JSON-RPC 2.0
/// grammar (§4.1 envelope validator).
#[derive(Debug, Clone, thiserror::Error)]
pub enum EnvelopeError {
    /// `jsonrpc` was missing or not the literal string `"2.0"`.
    #[error("missing or invalid jsonrpc version field")]
    InvalidVersion,
    /// The value carried both `result` and `error`.
    #[error("response carries both result and error")]
    AmbiguousResponse,
    /// A would-be response carried neither `result` nor `error`.
    #[error("response carries neither result nor error")]
    EmptyResponse,
    /// `method` was present on something shaped like a response.
    #[error("method present on a response envelope")]
    MethodOnResponse,
    /// `params` was present but neither an object nor an array.
    #[error("params must be a structured value (object or array)")]
    UnstructuredParams,
    /// The top-level value was not a JSON object.
    #[error("envelope must be a JSON object")]
    NotAnObject,
    /// Generic deserialization failure after shape checks passed.
    #[error("failed to deserialize envelope: {0}")]
    Deserialize(String),
}

/// Validates and classifies a parsed JSON value as a request, notification,
/// or response.
///
/// Classification priority for ambiguous shapes is **response > request >
/// notification**: a value with `result`/`error` is checked first so a
/// malformed response is never silently downgraded to a notification.
pub fn validate(value: &Value) -> Result<Envelope, EnvelopeError> {
    let object = value.as_object().ok_or(EnvelopeError::NotAnObject)?;

    match object.get("jsonrpc").and_then(Value::as_str) {
        Some(JSONRPC_VERSION) => {}
        _ => return Err(EnvelopeError::InvalidVersion),
    }

    if let Some(params) = object.get("params") {
        if !params.is_object() && !params.is_array() {
            return Err(EnvelopeError::UnstructuredParams);
        }
    }

    let has_result = object.contains_key("result");
    let has_error = object.contains_key("error");
    let has_id = object.contains_key("id") && !object.get("id").is_some_and(Value::is_null);
    let has_method = object.contains_key("method");

    // Response shape takes priority: anything carrying result/error must be
    // a well-formed response or rejected outright, never reinterpreted.
    if has_result || has_error {
        if has_result && has_error {
            return Err(EnvelopeError::AmbiguousResponse);
        }
        if has_method {
            return Err(EnvelopeError::MethodOnResponse);
        }
        let response: ResponseEnvelope = serde_json::from_value(value.clone())
            .map_err(|e| EnvelopeError::Deserialize(e.to_string()))?;
        return Ok(Envelope::Response(response));
    }

    if has_id {
        let request: RequestEnvelope = serde_json::from_value(value.clone())
            .map_err(|e| EnvelopeError::Deserialize(e.to_string()))?;
        return Ok(Envelope::Request(request));
    }

    if object.contains_key("id") {
        // `id` present but explicitly null, and neither result nor error:
        // this is the shape of a parse-error response with no matched id.
        return Err(EnvelopeError::EmptyResponse);
    }

    let notification: NotificationEnvelope = serde_json::from_value(value.clone())
        .map_err(|e| EnvelopeError::Deserialize(e.to_string()))?;
    Ok(Envelope::Notification(notification))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn classifies_request() {
        let v = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"});
        match validate(&v).unwrap() {
            Envelope::Request(r) => {
                assert_eq!(r.method, "tools/list");
                assert_eq!(r.id, RequestId::Number(1));
            }
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn classifies_notification() {
        let v = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
        assert!(matches!(validate(&v).unwrap(), Envelope::Notification(_)));
    }

    #[test]
    fn classifies_response() {
        let v = json!({"jsonrpc": "2.0", "id": 2, "result": {"ok": true}});
        assert!(matches!(validate(&v).unwrap(), Envelope::Response(_)));
    }

    #[test]
    fn response_priority_over_request_like_shape() {
        // Carries both an id/method-free result and would otherwise look
        // like a notification if id weren't present; must classify response.
        let v = json!({"jsonrpc": "2.0", "id": "s1", "error": {"code": -32601, "message": "x"}});
        assert!(matches!(validate(&v).unwrap(), Envelope::Response(_)));
    }

    #[test]
    fn rejects_both_result_and_error() {
        let v = json!({"jsonrpc": "2.0", "id": 1, "result": 1, "error": {"code": -1, "message": "x"}});
        assert!(matches!(validate(&v), Err(EnvelopeError::AmbiguousResponse)));
    }

    #[test]
    fn rejects_method_on_response() {
        let v = json!({"jsonrpc": "2.0", "id": 1, "result": 1, "method": "x"});
        assert!(matches!(validate(&v), Err(EnvelopeError::MethodOnResponse)));
    }

    #[test]
    fn rejects_bad_version() {
        let v = json!({"jsonrpc": "1.0", "id": 1, "method": "x"});
        assert!(matches!(validate(&v), Err(EnvelopeError::InvalidVersion)));
    }

    #[test]
    fn rejects_unstructured_params() {
        let v = json!({"jsonrpc": "2.0", "id": 1, "method": "x", "params": "nope"});
        assert!(matches!(validate(&v), Err(EnvelopeError::UnstructuredParams)));
    }

    #[test]
    fn request_id_matches_across_representations() {
        let a = RequestId::Number(7);
        let b = RequestId::String("7".to_string());
        assert!(a.matches(&b));
    }
}
