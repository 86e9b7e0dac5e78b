//! The `initialize` handshake request/response.

use super::capabilities::{ClientCapabilities, ServerCapabilities};
use super::core::Implementation;
use serde::{Deserialize, Serialize};

/// `initialize` request params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeRequest {
    /// Protocol version this client would prefer to speak.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// Capabilities this client is willing to service.
    pub capabilities: ClientCapabilities,
    /// Identifies this client implementation.
    #[serde(rename = "clientInfo")]
    pub client_info: Implementation,
}

/// `initialize` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    /// Protocol version the server has chosen to speak.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// Capabilities the server offers.
    pub capabilities: ServerCapabilities,
    /// Identifies the server implementation.
    #[serde(rename = "serverInfo")]
    pub server_info: Implementation,
    /// Optional instructions the server wants surfaced to the model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}
