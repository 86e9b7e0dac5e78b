//! The OAuth 2.1 provider (§4.4): discovery, DCR, PKCE authorization-code
//! flow, proactive refresh, and 401-challenge handling.
//!
//! Stateless over its [`AuthStorage`]; every method takes the server URL it
//! concerns and reads/writes through the storage backend, so the provider
//! itself holds no per-server state beyond an in-flight-refresh guard.

use crate::client_registration::{ClientRegistration, RegistrationRequest, RegistrationResponse};
use crate::error::{AuthError, AuthResult};
use crate::metadata::{ProtectedResourceMetadata, ServerMetadata};
use crate::pkce::{PkceState, states_match};
use crate::storage::AuthStorage;
use crate::token::Token;
use crate::url_normalize::normalize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Redirect URI and scope the provider requests during registration and
/// authorization (§4.4 step 2, step 5).
#[derive(Debug, Clone)]
pub struct OAuthProviderConfig {
    pub redirect_uri: String,
    pub scope: Option<String>,
    pub client_name: String,
}

impl Default for OAuthProviderConfig {
    fn default() -> Self {
        Self {
            redirect_uri: "http://127.0.0.1:8080/callback".to_string(),
            scope: None,
            client_name: "mcp-client".to_string(),
        }
    }
}

/// One attempt of the 401 retry guard (§4.4 "a single-shot flag
/// (`auth_retry_attempted`)"), keyed by normalized server URL so a provider
/// shared across sessions doesn't cross-guard unrelated servers.
type RetryGuard = Mutex<HashMap<String, bool>>;

/// The authorization subsystem gating HTTP transports.
pub struct OAuthProvider {
    config: OAuthProviderConfig,
    storage: Arc<dyn AuthStorage>,
    http: reqwest::Client,
    refresh_in_flight: Mutex<HashMap<String, ()>>,
    retry_attempted: RetryGuard,
}

impl std::fmt::Debug for OAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthProvider").field("config", &self.config).finish()
    }
}

impl OAuthProvider {
    #[must_use]
    pub fn new(config: OAuthProviderConfig, storage: Arc<dyn AuthStorage>) -> Self {
        Self {
            config,
            storage,
            http: reqwest::Client::new(),
            refresh_in_flight: Mutex::new(HashMap::new()),
            retry_attempted: Mutex::new(HashMap::new()),
        }
    }

    /// Discovers and caches `/.well-known/oauth-authorization-server`
    /// metadata for `server_url`, reusing a cached copy younger than 24 h.
    async fn ensure_metadata(&self, server_url: &str) -> AuthResult<ServerMetadata> {
        let key = normalize(server_url);
        if let Some(cached) = self.storage.get_server_metadata(&key) {
            if !cached.stale() {
                return Ok(cached);
            }
        }

        let discovery_url = format!("{key}/.well-known/oauth-authorization-server");
        let response = self
            .http
            .get(&discovery_url)
            .send()
            .await
            .map_err(|e| AuthError::Discovery(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::Discovery(format!(
                "{discovery_url} returned {}",
                response.status()
            )));
        }

        let metadata: ServerMetadata =
            response.json().await.map_err(|e| AuthError::Discovery(e.to_string()))?;
        self.storage.set_server_metadata(&key, metadata.clone());
        Ok(metadata)
    }

    /// Registers a client (RFC 7591) unless a non-expired registration is
    /// already stored.
    async fn ensure_client_registration(
        &self,
        server_url: &str,
        metadata: &ServerMetadata,
    ) -> AuthResult<ClientRegistration> {
        let key = normalize(server_url);
        if let Some(existing) = self.storage.get_client_info(&key) {
            if !existing.expired() {
                return Ok(existing);
            }
        }

        let registration_endpoint = metadata.registration_endpoint.clone().ok_or_else(|| {
            AuthError::Registration("server does not advertise a registration endpoint".into())
        })?;

        let request = RegistrationRequest {
            redirect_uris: vec![self.config.redirect_uri.clone()],
            token_endpoint_auth_method: "none".to_string(),
            grant_types: vec!["authorization_code".to_string(), "refresh_token".to_string()],
            response_types: vec!["code".to_string()],
            client_name: Some(self.config.client_name.clone()),
            scope: self.config.scope.clone(),
        };

        let response = self
            .http
            .post(&registration_endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| AuthError::Registration(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::Registration(format!(
                "{registration_endpoint} returned {}",
                response.status()
            )));
        }

        let body: RegistrationResponse =
            response.json().await.map_err(|e| AuthError::Registration(e.to_string()))?;

        let registration = ClientRegistration {
            client_id: body.client_id,
            client_secret: body.client_secret,
            client_secret_expires_at: match body.client_secret_expires_at {
                Some(0) | None => None,
                Some(secs) => chrono::DateTime::from_timestamp(secs, 0),
            },
            metadata: serde_json::to_value(&request).unwrap_or(serde_json::Value::Null),
        };
        self.storage.set_client_info(&key, registration.clone());
        Ok(registration)
    }

    /// §4.4 `start_authorization_flow`: returns the URL the caller should
    /// send the resource owner's user agent to.
    pub async fn start_authorization_flow(&self, server_url: &str) -> AuthResult<String> {
        let key = normalize(server_url);
        let metadata = self.ensure_metadata(&key).await?;
        let registration = self.ensure_client_registration(&key, &metadata).await?;

        let pkce = PkceState::generate();
        self.storage.set_pkce(&key, pkce.clone());

        let mut url = url::Url::parse(&metadata.authorization_endpoint)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("response_type", "code");
            query.append_pair("client_id", &registration.client_id);
            query.append_pair("redirect_uri", &self.config.redirect_uri);
            if let Some(scope) = &self.config.scope {
                query.append_pair("scope", scope);
            }
            query.append_pair("state", &pkce.state);
            query.append_pair("code_challenge", &pkce.code_challenge);
            query.append_pair("code_challenge_method", "S256");
            query.append_pair("resource", &key);
        }
        Ok(url.into())
    }

    /// §4.4 `complete_authorization_flow`: exchanges the authorization code
    /// for a token after validating `state` in constant time.
    pub async fn complete_authorization_flow(
        &self,
        server_url: &str,
        code: &str,
        returned_state: &str,
    ) -> AuthResult<Token> {
        let key = normalize(server_url);
        let pkce = self.storage.get_pkce(&key).ok_or(AuthError::NoPendingFlow)?;

        if !states_match(&pkce.state, returned_state) {
            return Err(AuthError::InvalidState);
        }

        let metadata = self.ensure_metadata(&key).await?;
        let registration = self.ensure_client_registration(&key, &metadata).await?;

        let mut form = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code.to_string()),
            ("code_verifier", pkce.code_verifier.clone()),
            ("redirect_uri", self.config.redirect_uri.clone()),
            ("client_id", registration.client_id.clone()),
            ("resource", key.clone()),
        ];
        if let Some(secret) = &registration.client_secret {
            form.push(("client_secret", secret.clone()));
        }

        let token = self.exchange(&metadata.token_endpoint, &form).await?;
        self.storage.set_token(&key, token.clone());
        self.storage.delete_pkce(&key);
        Ok(token)
    }

    async fn exchange(
        &self,
        token_endpoint: &str,
        form: &[(&str, String)],
    ) -> AuthResult<Token> {
        let response = self
            .http
            .post(token_endpoint)
            .form(form)
            .send()
            .await
            .map_err(|e| AuthError::TokenExchange(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenExchange(format!("{status}: {body}")));
        }

        #[derive(serde::Deserialize)]
        struct TokenResponseBody {
            access_token: String,
            #[serde(default = "default_token_type")]
            token_type: String,
            #[serde(default)]
            expires_in: Option<i64>,
            #[serde(default)]
            refresh_token: Option<String>,
            #[serde(default)]
            scope: Option<String>,
        }
        fn default_token_type() -> String {
            "Bearer".to_string()
        }

        let body: TokenResponseBody =
            response.json().await.map_err(|e| AuthError::TokenExchange(e.to_string()))?;

        Ok(Token::new(
            body.access_token,
            body.token_type,
            body.expires_in,
            body.refresh_token,
            body.scope,
        ))
    }

    /// §4.4 `access_token`: returns the stored token, refreshing proactively
    /// when it's within 5 minutes of expiry. Refresh failure deletes the
    /// stored token and returns `None`. At most one refresh per server URL
    /// runs concurrently (§8 "token renewal idempotence").
    pub async fn access_token(&self, server_url: &str) -> Option<Token> {
        let key = normalize(server_url);
        let token = self.storage.get_token(&key)?;

        if !token.expires_soon() {
            return Some(token);
        }

        let Some(refresh_token) = token.refresh_token.clone() else {
            return Some(token);
        };

        {
            let mut in_flight = self.refresh_in_flight.lock().unwrap();
            if in_flight.contains_key(&key) {
                drop(in_flight);
                // Another task is already refreshing; the stale token is
                // still better than failing the caller outright.
                return self.storage.get_token(&key);
            }
            in_flight.insert(key.clone(), ());
        }

        let result = self.refresh(&key, &refresh_token).await;
        self.refresh_in_flight.lock().unwrap().remove(&key);

        match result {
            Ok(refreshed) => {
                self.storage.set_token(&key, refreshed.clone());
                Some(refreshed)
            }
            Err(err) => {
                warn!(target: "mcp_auth", %err, server_url = %key, "token refresh failed");
                self.storage.delete_token(&key);
                None
            }
        }
    }

    async fn refresh(&self, key: &str, refresh_token: &str) -> AuthResult<Token> {
        let metadata = self.ensure_metadata(key).await?;
        let registration = self
            .storage
            .get_client_info(key)
            .ok_or_else(|| AuthError::TokenExchange("no client registration on file".into()))?;

        let mut form = vec![
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh_token.to_string()),
            ("client_id", registration.client_id.clone()),
            ("resource", key.to_string()),
        ];
        if let Some(secret) = &registration.client_secret {
            form.push(("client_secret", secret.clone()));
        }
        self.exchange(&metadata.token_endpoint, &form).await
    }

    /// §4.4 `handle_authentication_challenge`: invoked by an HTTP transport
    /// on a `401`. Re-discovers resource metadata (RFC 9728) when the
    /// `WWW-Authenticate` header names one, then triggers the interactive
    /// flow if no usable token results. Returns whether the caller should
    /// retry the original request; the transport enforces the single-retry
    /// guard by consulting [`OAuthProvider::retry_allowed`] /
    /// [`OAuthProvider::clear_retry_guard`] around the call.
    pub async fn handle_authentication_challenge(
        &self,
        server_url: &str,
        www_authenticate: &str,
        resource_metadata_url: Option<&str>,
    ) -> AuthResult<bool> {
        let key = normalize(server_url);
        debug!(target: "mcp_auth", %www_authenticate, server_url = %key, "handling 401 challenge");

        if let Some(metadata_url) = resource_metadata_url {
            if let Ok(response) = self.http.get(metadata_url).send().await {
                if let Ok(resource_metadata) = response.json::<ProtectedResourceMetadata>().await {
                    debug!(
                        target: "mcp_auth",
                        authorization_servers = ?resource_metadata.authorization_servers,
                        "discovered protected-resource metadata (RFC 9728)"
                    );
                }
            }
        }

        // A fresh access_token() call covers both "we already have a token
        // that just needed proactive refresh" and "refresh failed and the
        // caller must drive a new interactive flow" (the latter requires an
        // external code/state pair via `complete_authorization_flow`, which
        // this method cannot synthesize on its own).
        Ok(self.access_token(&key).await.is_some())
    }

    /// True if the single-retry guard for `server_url` has not yet been
    /// consumed this request cycle.
    #[must_use]
    pub fn retry_allowed(&self, server_url: &str) -> bool {
        let key = normalize(server_url);
        !*self.retry_attempted.lock().unwrap().get(&key).unwrap_or(&false)
    }

    /// Marks the single retry as consumed for `server_url`.
    pub fn mark_retry_attempted(&self, server_url: &str) {
        self.retry_attempted.lock().unwrap().insert(normalize(server_url), true);
    }

    /// Clears the guard, e.g. once a request round-trip completes
    /// successfully and a future 401 deserves a fresh retry.
    pub fn clear_retry_guard(&self, server_url: &str) {
        self.retry_attempted.lock().unwrap().remove(&normalize(server_url));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryAuthStorage;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(storage: Arc<dyn AuthStorage>) -> OAuthProvider {
        OAuthProvider::new(OAuthProviderConfig::default(), storage)
    }

    #[tokio::test]
    async fn start_flow_persists_pkce_and_builds_authorize_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/oauth-authorization-server"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "issuer": server.uri(),
                "authorization_endpoint": format!("{}/authorize", server.uri()),
                "token_endpoint": format!("{}/token", server.uri()),
                "registration_endpoint": format!("{}/register", server.uri()),
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/register"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "client_id": "client-123",
            })))
            .mount(&server)
            .await;

        let storage = Arc::new(InMemoryAuthStorage::new());
        let provider = provider(storage.clone());
        let url = provider.start_authorization_flow(&server.uri()).await.unwrap();

        assert!(url.contains("response_type=code"));
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(storage.get_pkce(&normalize(&server.uri())).is_some());
    }

    #[tokio::test]
    async fn complete_flow_rejects_mismatched_state() {
        let storage = Arc::new(InMemoryAuthStorage::new());
        storage.set_pkce(
            &normalize("https://example.com"),
            PkceState::generate(),
        );
        let provider = provider(storage);
        let result = provider
            .complete_authorization_flow("https://example.com", "some-code", "wrong-state")
            .await;
        assert!(matches!(result, Err(AuthError::InvalidState)));
    }

    #[tokio::test]
    async fn access_token_returns_none_without_stored_token() {
        let storage = Arc::new(InMemoryAuthStorage::new());
        let provider = provider(storage);
        assert!(provider.access_token("https://example.com").await.is_none());
    }

    #[tokio::test]
    async fn retry_guard_allows_exactly_one_retry() {
        let storage = Arc::new(InMemoryAuthStorage::new());
        let provider = provider(storage);
        assert!(provider.retry_allowed("https://example.com"));
        provider.mark_retry_attempted("https://example.com");
        assert!(!provider.retry_allowed("https://example.com"));
        provider.clear_retry_guard("https://example.com");
        assert!(provider.retry_allowed("https://example.com"));
    }
}
