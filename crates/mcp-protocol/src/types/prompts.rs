//! Prompt listing and rendering types (`prompts/list`, `prompts/get`).

use super::content::ContentBlock;
use super::core::{Cursor, Role};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One prompt offered by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    /// Programmatic prompt name.
    pub name: String,
    /// Optional display title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Arguments the prompt template accepts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Vec<PromptArgument>>,
}

/// One named argument a prompt template accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptArgument {
    /// Argument name, referenced by `prompts/get` params.
    pub name: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// True if the prompt cannot render without this argument.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

/// `prompts/list` request params.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListPromptsRequest {
    /// Pagination cursor from a previous response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
}

/// `prompts/list` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListPromptsResult {
    /// Prompts visible on this page.
    pub prompts: Vec<Prompt>,
    /// Present when more pages follow.
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Cursor>,
}

/// `prompts/get` request params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPromptRequest {
    /// Name of the prompt to render.
    pub name: String,
    /// Argument values, matching the prompt's declared [`PromptArgument`]s.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<HashMap<String, String>>,
}

/// `prompts/get` result: a rendered conversation the caller can feed to an
/// LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPromptResult {
    /// Human-readable description of the rendered prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The rendered message sequence.
    pub messages: Vec<PromptMessage>,
}

/// One message in a rendered prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    /// Conversation role this message was rendered under.
    pub role: Role,
    /// The message's content.
    pub content: ContentBlock,
}
