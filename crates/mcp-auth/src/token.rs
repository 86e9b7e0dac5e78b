//! The OAuth token record (§3 "OAuth Token").

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Window before actual expiry at which [`Token::expires_soon`] starts
/// returning true, so `access_token()` can refresh proactively rather than
/// racing the deadline.
const EXPIRY_SOON_WINDOW: Duration = Duration::minutes(5);

/// `(access_token, token_type, expires_at?, refresh_token?, scope?)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Token {
    /// The bearer credential itself.
    pub access_token: String,
    /// Usually `"Bearer"`, echoed verbatim into the `Authorization` header.
    pub token_type: String,
    /// Absolute expiry instant, if the server advertised `expires_in`.
    pub expires_at: Option<DateTime<Utc>>,
    /// Refresh token, if the grant issued one.
    pub refresh_token: Option<String>,
    /// Space-delimited granted scope, if the server echoed one back.
    pub scope: Option<String>,
}

impl Token {
    /// Builds a token expiring `expires_in_secs` from now (`None` means it
    /// never expires, per the token endpoint omitting `expires_in`).
    #[must_use]
    pub fn new(
        access_token: impl Into<String>,
        token_type: impl Into<String>,
        expires_in_secs: Option<i64>,
        refresh_token: Option<String>,
        scope: Option<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: token_type.into(),
            expires_at: expires_in_secs.map(|s| Utc::now() + Duration::seconds(s)),
            refresh_token,
            scope,
        }
    }

    /// True once `now >= expires_at`. A token with no expiry never expires.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }

    /// True once within [`EXPIRY_SOON_WINDOW`] of expiry, the signal
    /// `access_token()` uses to refresh before a caller ever observes 401.
    #[must_use]
    pub fn expires_soon(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at - EXPIRY_SOON_WINDOW)
    }

    /// The literal `Authorization` header value for this token.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_echoes_token_type_verbatim() {
        let token = Token::new("abc123", "DPoP", None, None, None);
        assert_eq!(token.authorization_header(), "DPoP abc123");
    }

    #[test]
    fn expiry_and_soon_windows() {
        let fresh = Token::new("t", "Bearer", Some(3600), None, None);
        assert!(!fresh.expired());
        assert!(!fresh.expires_soon());

        let soon = Token::new("t", "Bearer", Some(60), None, None);
        assert!(!soon.expired());
        assert!(soon.expires_soon());

        let gone = Token::new("t", "Bearer", Some(-10), None, None);
        assert!(gone.expired());
    }

    #[test]
    fn no_expiry_never_expires() {
        let token = Token::new("t", "Bearer", None, None, None);
        assert!(!token.expired());
        assert!(!token.expires_soon());
    }
}
