//! The pluggable token/metadata storage interface (§4.4 "Storage
//! interface") and its default in-memory backend.

use crate::client_registration::ClientRegistration;
use crate::metadata::ServerMetadata;
use crate::pkce::PkceState;
use crate::token::Token;
use std::collections::HashMap;
use std::sync::Mutex;

/// Everything an OAuth provider needs persisted, keyed by normalized server
/// URL. All operations MUST be safe for concurrent use; backends that can't
/// offer finer-grained locking may guard everything behind one mutex, as the
/// in-memory default does.
pub trait AuthStorage: Send + Sync {
    fn get_token(&self, server_url: &str) -> Option<Token>;
    fn set_token(&self, server_url: &str, token: Token);
    fn delete_token(&self, server_url: &str);

    fn get_client_info(&self, server_url: &str) -> Option<ClientRegistration>;
    fn set_client_info(&self, server_url: &str, info: ClientRegistration);

    fn get_server_metadata(&self, server_url: &str) -> Option<ServerMetadata>;
    fn set_server_metadata(&self, server_url: &str, metadata: ServerMetadata);

    fn get_pkce(&self, server_url: &str) -> Option<PkceState>;
    fn set_pkce(&self, server_url: &str, pkce: PkceState);
    fn delete_pkce(&self, server_url: &str);
}

/// The default backend: a single mutex across every field (§4.4).
#[derive(Default)]
pub struct InMemoryAuthStorage {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    tokens: HashMap<String, Token>,
    client_info: HashMap<String, ClientRegistration>,
    server_metadata: HashMap<String, ServerMetadata>,
    pkce: HashMap<String, PkceState>,
}

impl InMemoryAuthStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuthStorage for InMemoryAuthStorage {
    fn get_token(&self, server_url: &str) -> Option<Token> {
        self.inner.lock().unwrap().tokens.get(server_url).cloned()
    }

    fn set_token(&self, server_url: &str, token: Token) {
        self.inner.lock().unwrap().tokens.insert(server_url.to_string(), token);
    }

    fn delete_token(&self, server_url: &str) {
        self.inner.lock().unwrap().tokens.remove(server_url);
    }

    fn get_client_info(&self, server_url: &str) -> Option<ClientRegistration> {
        self.inner.lock().unwrap().client_info.get(server_url).cloned()
    }

    fn set_client_info(&self, server_url: &str, info: ClientRegistration) {
        self.inner.lock().unwrap().client_info.insert(server_url.to_string(), info);
    }

    fn get_server_metadata(&self, server_url: &str) -> Option<ServerMetadata> {
        self.inner.lock().unwrap().server_metadata.get(server_url).cloned()
    }

    fn set_server_metadata(&self, server_url: &str, metadata: ServerMetadata) {
        self.inner.lock().unwrap().server_metadata.insert(server_url.to_string(), metadata);
    }

    // PKCE/state entries carry a 10-minute TTL (§4.4); expired entries are
    // deleted on read rather than swept proactively.
    fn get_pkce(&self, server_url: &str) -> Option<PkceState> {
        let mut guard = self.inner.lock().unwrap();
        match guard.pkce.get(server_url) {
            Some(pkce) if pkce.expired() => {
                guard.pkce.remove(server_url);
                None
            }
            Some(pkce) => Some(pkce.clone()),
            None => None,
        }
    }

    fn set_pkce(&self, server_url: &str, pkce: PkceState) {
        self.inner.lock().unwrap().pkce.insert(server_url.to_string(), pkce);
    }

    fn delete_pkce(&self, server_url: &str) {
        self.inner.lock().unwrap().pkce.remove(server_url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_token() {
        let storage = InMemoryAuthStorage::new();
        assert!(storage.get_token("https://example.com").is_none());
        storage.set_token("https://example.com", Token::new("t", "Bearer", None, None, None));
        assert_eq!(storage.get_token("https://example.com").unwrap().access_token, "t");
        storage.delete_token("https://example.com");
        assert!(storage.get_token("https://example.com").is_none());
    }

    #[test]
    fn expired_pkce_is_deleted_on_read() {
        let storage = InMemoryAuthStorage::new();
        let mut pkce = PkceState::generate();
        pkce.created_at = chrono::Utc::now() - chrono::Duration::minutes(11);
        storage.set_pkce("https://example.com", pkce);
        assert!(storage.get_pkce("https://example.com").is_none());
        assert!(storage.get_pkce("https://example.com").is_none());
    }
}
