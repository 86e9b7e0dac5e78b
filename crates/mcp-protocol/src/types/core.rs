//! Shared scalar aliases and small structures used across the domain types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque pagination token returned in a list response.
pub type Cursor = String;

/// A resource or resource-template URI, as a plain string (no client-side
/// validation beyond what serde enforces).
pub type Uri = String;

/// A MIME type string, e.g. `"text/plain"`.
pub type MimeType = String;

/// Base64-encoded binary payload.
pub type Base64String = String;

/// Conversation role attached to a sampling message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human/user side of a conversation.
    User,
    /// The model/assistant side of a conversation.
    Assistant,
}

/// Identifies one MCP implementation (client or server) during the
/// `initialize` handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Implementation {
    /// Implementation name.
    pub name: String,
    /// Implementation version string.
    pub version: String,
    /// Optional human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Implementation {
    /// Builds an implementation descriptor.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self { name: name.into(), version: version.into(), title: None }
    }
}

/// Weak presentation hints attached to content blocks, resources, or
/// prompts. Per MCP, clients may ignore these entirely.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Annotations {
    /// Role-based audience hint (`"user"`/`"assistant"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<Vec<String>>,
    /// Subjective importance hint, no fixed range.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<f64>,
    /// ISO 8601 last-modified timestamp, useful for cache invalidation.
    #[serde(rename = "lastModified", skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    /// Application-specific extensions, preserved but not interpreted.
    #[serde(flatten)]
    pub custom: HashMap<String, serde_json::Value>,
}
