//! `sampling/createMessage`: the server asks the client's LLM for a
//! completion.

use super::content::ContentBlock;
use super::core::Role;
use serde::{Deserialize, Serialize};

/// One message in a sampling conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingMessage {
    /// Conversation role.
    pub role: Role,
    /// Message content.
    pub content: ContentBlock,
}

/// A named model the caller would prefer, with no guarantee of honor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelHint {
    /// Substring or family name, e.g. `"claude-3-sonnet"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Soft model-selection preferences the server attaches to a sampling
/// request; the client is free to ignore any of these.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelPreferences {
    /// Ordered model hints, most preferred first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hints: Option<Vec<ModelHint>>,
    /// 0.0-1.0 preference for minimizing cost.
    #[serde(rename = "costPriority", skip_serializing_if = "Option::is_none")]
    pub cost_priority: Option<f64>,
    /// 0.0-1.0 preference for minimizing latency.
    #[serde(rename = "speedPriority", skip_serializing_if = "Option::is_none")]
    pub speed_priority: Option<f64>,
    /// 0.0-1.0 preference for maximizing output quality.
    #[serde(rename = "intelligencePriority", skip_serializing_if = "Option::is_none")]
    pub intelligence_priority: Option<f64>,
}

/// `sampling/createMessage` request params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMessageRequest {
    /// The conversation so far.
    pub messages: Vec<SamplingMessage>,
    /// Optional system prompt override.
    #[serde(rename = "systemPrompt", skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Soft model-selection preferences.
    #[serde(rename = "modelPreferences", skip_serializing_if = "Option::is_none")]
    pub model_preferences: Option<ModelPreferences>,
    /// Upper bound on generated tokens.
    #[serde(rename = "maxTokens")]
    pub max_tokens: u32,
    /// Sampling temperature, if the client's LLM backend honors it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Sequences that should stop generation.
    #[serde(rename = "stopSequences", skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
}

/// `sampling/createMessage` result: the accepted completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMessageResult {
    /// Conversation role of the generated message (always `assistant`).
    pub role: Role,
    /// Generated content.
    pub content: ContentBlock,
    /// Name of the model that actually produced this completion.
    pub model: String,
    /// Why generation stopped, if the backend reports it.
    #[serde(rename = "stopReason", skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
}
