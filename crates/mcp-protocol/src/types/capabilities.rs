//! Capability negotiation types exchanged during `initialize`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Capabilities this client advertises to the server.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClientCapabilities {
    /// Non-standard experimental capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<HashMap<String, serde_json::Value>>,
    /// Present if the client can list filesystem roots.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roots: Option<RootsCapability>,
    /// Present if the client can service `sampling/createMessage`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<SamplingCapability>,
    /// Present if the client can service `elicitation/create`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elicitation: Option<ElicitationCapability>,
}

/// Capabilities the server advertised in its `initialize` reply.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    /// Non-standard experimental capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<HashMap<String, serde_json::Value>>,
    /// Present if the server can push log messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingCapability>,
    /// Present if the server supports `completion/complete`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completions: Option<CompletionCapability>,
    /// Present if the server offers any prompts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<PromptsCapability>,
    /// Present if the server offers any resources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesCapability>,
    /// Present if the server offers any tools.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
}

/// Marker: client supports `sampling/createMessage`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SamplingCapability;

/// Marker: client supports `elicitation/create`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ElicitationCapability;

/// Marker: server supports `completion/complete`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CompletionCapability;

/// Marker: server may push `notifications/message` log lines.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingCapability;

/// Roots capability, with an optional list-changed notification flag.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RootsCapability {
    /// True if the client emits `notifications/roots/list_changed`.
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Prompts capability.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PromptsCapability {
    /// True if the server emits `notifications/prompts/list_changed`.
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Resources capability.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResourcesCapability {
    /// True if `resources/subscribe` is supported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<bool>,
    /// True if the server emits `notifications/resources/list_changed`.
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Tools capability.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolsCapability {
    /// True if the server emits `notifications/tools/list_changed`.
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

impl ClientCapabilities {
    /// Starts from an empty capability set.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Enables roots, optionally advertising list-changed notifications.
    #[must_use]
    pub fn with_roots(mut self, list_changed: bool) -> Self {
        self.roots = Some(RootsCapability { list_changed: Some(list_changed) });
        self
    }

    /// Enables sampling.
    #[must_use]
    pub fn with_sampling(mut self) -> Self {
        self.sampling = Some(SamplingCapability);
        self
    }

    /// Enables elicitation.
    #[must_use]
    pub fn with_elicitation(mut self) -> Self {
        self.elicitation = Some(ElicitationCapability);
        self
    }
}
