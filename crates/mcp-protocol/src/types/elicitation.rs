//! `elicitation/create`: the server asks the client to collect structured
//! user input against a JSON Schema.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `elicitation/create` request params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElicitRequest {
    /// Prompt shown to the user.
    pub message: String,
    /// JSON Schema the collected response must satisfy.
    #[serde(rename = "requestedSchema")]
    pub requested_schema: Value,
}

/// The user's disposition toward an elicitation request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ElicitAction {
    /// The user supplied a response matching the schema.
    Accept,
    /// The user explicitly declined.
    Decline,
    /// The user dismissed the request without a decision.
    Cancel,
}

/// `elicitation/create` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElicitResult {
    /// The user's disposition.
    pub action: ElicitAction,
    /// Present when `action == Accept`; matches the requested schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
}
