//! Dynamic client registration (RFC 7591, §4.4 step 2).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `(client_id, client_secret?, client_secret_expires_at?, metadata)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRegistration {
    /// Assigned client identifier.
    pub client_id: String,
    /// Assigned client secret, for confidential clients.
    pub client_secret: Option<String>,
    /// Secret expiry; `None`/`Some(0)` per RFC 7591 means it never expires.
    pub client_secret_expires_at: Option<DateTime<Utc>>,
    /// The registration response body, kept for diagnostics and re-registration.
    pub metadata: serde_json::Value,
}

impl ClientRegistration {
    /// Secret expiry is treated as registration expiry (§4.4): once past, the
    /// provider must register a fresh client rather than reuse this one.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.client_secret_expires_at.is_some_and(|at| Utc::now() >= at)
    }
}

/// RFC 7591 §2 registration request body.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationRequest {
    pub redirect_uris: Vec<String>,
    pub token_endpoint_auth_method: String,
    pub grant_types: Vec<String>,
    pub response_types: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// RFC 7591 §3.2.1 registration response body.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationResponse {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub client_secret_expires_at: Option<i64>,
}
