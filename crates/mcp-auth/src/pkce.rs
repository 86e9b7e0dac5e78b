//! PKCE S256 (RFC 7636) and `state` generation for the authorization-code
//! flow (§4.4 step 3, §3 "PKCE State").

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Flow entries older than this are treated as abandoned (§3: "deleted on
/// successful token exchange or flow timeout").
pub const FLOW_TIMEOUT: Duration = Duration::minutes(10);

/// `(code_verifier, code_challenge, state)`, transient until the flow
/// completes or times out.
#[derive(Debug, Clone)]
pub struct PkceState {
    pub code_verifier: String,
    pub code_challenge: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
}

impl PkceState {
    /// Generates 32 bytes of entropy each for the verifier and `state`,
    /// base64url-encodes both, and derives `code_challenge = SHA256(verifier)`.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            code_verifier: random_urlsafe_token(),
            code_challenge: String::new(),
            state: random_urlsafe_token(),
            created_at: Utc::now(),
        }
        .with_challenge()
    }

    fn with_challenge(mut self) -> Self {
        self.code_challenge = challenge_for(&self.code_verifier);
        self
    }

    /// True once [`FLOW_TIMEOUT`] has elapsed since generation.
    #[must_use]
    pub fn expired(&self) -> bool {
        Utc::now() >= self.created_at + FLOW_TIMEOUT
    }
}

/// `SHA256(verifier)`, base64url (no padding) encoded, per RFC 7636 §4.2.
#[must_use]
pub fn challenge_for(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

fn random_urlsafe_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Constant-time comparison of the `state` value returned by the
/// authorization server against the one persisted at flow start (§8:
/// "State comparison is constant-time during OAuth callback").
#[must_use]
pub fn states_match(expected: &str, returned: &str) -> bool {
    use subtle::ConstantTimeEq;
    expected.as_bytes().ct_eq(returned.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_is_deterministic_function_of_verifier() {
        let pkce = PkceState::generate();
        assert_eq!(pkce.code_challenge, challenge_for(&pkce.code_verifier));
    }

    #[test]
    fn verifier_and_state_are_distinct_and_urlsafe() {
        let pkce = PkceState::generate();
        assert_ne!(pkce.code_verifier, pkce.state);
        assert!(!pkce.code_verifier.contains('+'));
        assert!(!pkce.code_verifier.contains('/'));
        assert!(!pkce.code_verifier.contains('='));
    }

    #[test]
    fn state_comparison_rejects_mismatch() {
        let pkce = PkceState::generate();
        assert!(states_match(&pkce.state, &pkce.state));
        assert!(!states_match(&pkce.state, "something-else"));
    }
}
