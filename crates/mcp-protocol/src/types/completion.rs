//! `completion/complete`: argument auto-completion for prompts and resource
//! templates.

use serde::{Deserialize, Serialize};

/// What the completion request is arguing against: a prompt or a resource
/// template.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CompletionReference {
    /// Complete an argument of a named prompt.
    #[serde(rename = "ref/prompt")]
    Prompt {
        /// Prompt name.
        name: String,
    },
    /// Complete an argument of a resource template.
    #[serde(rename = "ref/resource")]
    Resource {
        /// RFC 6570 URI template.
        uri: String,
    },
}

/// The argument being completed, and the text typed so far.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionArgument {
    /// Argument name.
    pub name: String,
    /// Partial value typed so far.
    pub value: String,
}

/// `completion/complete` request params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteRequest {
    /// The prompt or resource template being completed against.
    #[serde(rename = "ref")]
    pub reference: CompletionReference,
    /// The argument under completion.
    pub argument: CompletionArgument,
}

/// `completion/complete` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteResult {
    /// The completion payload.
    pub completion: CompletionValues,
}

/// Completion suggestions, with optional total/pagination hints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionValues {
    /// Up to 100 suggested values, best match first.
    pub values: Vec<String>,
    /// Total number of matches, if known and larger than `values`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u32>,
    /// True if more suggestions exist beyond `values`.
    #[serde(rename = "hasMore", skip_serializing_if = "Option::is_none")]
    pub has_more: Option<bool>,
}
