//! Error taxonomy for the OAuth 2.1 authorization subsystem (§7).

use thiserror::Error;

/// Result alias for this crate.
pub type AuthResult<T> = Result<T, AuthError>;

/// Everything that can go wrong acquiring or using an OAuth token.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Authorization-server metadata could not be discovered or parsed.
    #[error("metadata discovery failed: {0}")]
    Discovery(String),

    /// Dynamic client registration (RFC 7591) failed.
    #[error("dynamic client registration failed: {0}")]
    Registration(String),

    /// The `state` value returned by the authorization server did not match
    /// the one persisted at flow start.
    #[error("state mismatch: possible CSRF or stale authorization response")]
    InvalidState,

    /// No PKCE/state entry was found for the server URL (flow never started,
    /// or it already expired).
    #[error("no pending authorization flow for this server")]
    NoPendingFlow,

    /// The token endpoint rejected the authorization code or refresh token.
    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    /// No token is stored for this server and no flow is in progress.
    #[error("no token available")]
    NoToken,

    /// The underlying HTTP request failed.
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// A stored or received value failed to (de)serialize.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A configured URL did not parse.
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}
