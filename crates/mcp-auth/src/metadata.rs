//! Authorization-server metadata (RFC 8414) and protected-resource metadata
//! (RFC 9728) discovery (§4.4 step 1, §9 open question: RFC 9728 support is
//! mandatory here, not newer-branch-only as in the source).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How long a discovered [`ServerMetadata`] document is cached before the
/// provider re-fetches it.
pub const METADATA_CACHE_TTL: Duration = Duration::hours(24);

/// `/.well-known/oauth-authorization-server` response (RFC 8414), trimmed to
/// the fields the authorization-code + PKCE + DCR flow actually consults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(default)]
    pub registration_endpoint: Option<String>,
    #[serde(default)]
    pub grant_types_supported: Option<Vec<String>>,
    #[serde(default)]
    pub code_challenge_methods_supported: Option<Vec<String>>,
    #[serde(default)]
    pub token_endpoint_auth_methods_supported: Option<Vec<String>>,
    /// When this document was fetched, used to apply [`METADATA_CACHE_TTL`].
    #[serde(default = "Utc::now")]
    pub discovered_at: DateTime<Utc>,
}

impl ServerMetadata {
    /// True once the 24 h cache window has elapsed.
    #[must_use]
    pub fn stale(&self) -> bool {
        Utc::now() >= self.discovered_at + METADATA_CACHE_TTL
    }
}

/// `/.well-known/oauth-protected-resource` response (RFC 9728), surfaced on a
/// `401` via the `resource_metadata_url` the server advertises in
/// `WWW-Authenticate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectedResourceMetadata {
    pub resource: String,
    #[serde(default)]
    pub authorization_servers: Vec<String>,
    #[serde(default)]
    pub scopes_supported: Option<Vec<String>>,
}
