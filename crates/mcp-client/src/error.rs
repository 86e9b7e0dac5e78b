//! Error-conversion glue at the boundary between the transport layer and
//! the coordinator's flat [`McpError`] taxonomy.
//!
//! These are plain functions rather than `From` impls: both
//! [`TransportError`] and [`McpError`] are defined in other crates, so a
//! blanket `impl From<TransportError> for McpError` here would violate
//! Rust's orphan rule. Call sites use `.map_err(|e| from_transport_error(e,
//! &id))` instead of `?`/`.into()`.

use mcp_protocol::envelope::RequestId;
use mcp_protocol::McpError;
use mcp_transport_traits::error::TransportError;

/// Converts a transport failure into the coordinator's error type.
/// `request_id` is attached to `Timeout` so the caller can still log which
/// request never got a reply.
pub fn from_transport_error(err: TransportError, request_id: &RequestId) -> McpError {
    match err {
        TransportError::Timeout => McpError::Timeout { request_id: request_id.clone() },
        TransportError::SessionExpired => McpError::SessionExpired,
        TransportError::AuthenticationChallenge { www_authenticate, resource_metadata_url } => {
            let detail = match resource_metadata_url {
                Some(url) => format!("{www_authenticate} (resource metadata: {url})"),
                None => www_authenticate,
            };
            McpError::AuthenticationRequired(detail)
        }
        TransportError::Http { status, message } => McpError::transport(format!("http {status}: {message}")),
        TransportError::Unsupported(what) => McpError::UnsupportedFeature(what),
        TransportError::Io(_)
        | TransportError::NotRunning
        | TransportError::Closed(_)
        | TransportError::ReconnectExhausted { .. } => McpError::transport(err.to_string()),
    }
}

/// Same conversion for transport failures that occur outside the context
/// of any particular request (e.g. during `start()`, before an id has been
/// allocated).
pub fn from_transport_error_untargeted(err: TransportError) -> McpError {
    match err {
        TransportError::Timeout => McpError::transport("timed out"),
        other => from_transport_error(other, &RequestId::Number(0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_expired_maps_directly() {
        let err = from_transport_error(TransportError::SessionExpired, &RequestId::Number(1));
        assert!(matches!(err, McpError::SessionExpired));
    }

    #[test]
    fn authentication_challenge_carries_resource_metadata_url() {
        let err = from_transport_error(
            TransportError::AuthenticationChallenge {
                www_authenticate: "Bearer realm=\"mcp\"".into(),
                resource_metadata_url: Some("https://example.com/.well-known/oauth-protected-resource".into()),
            },
            &RequestId::Number(2),
        );
        match err {
            McpError::AuthenticationRequired(detail) => {
                assert!(detail.contains("resource metadata"));
            }
            other => panic!("unexpected error variant: {other:?}"),
        }
    }

    #[test]
    fn timeout_preserves_request_id() {
        let id = RequestId::String("req-9".into());
        let err = from_transport_error(TransportError::Timeout, &id);
        match err {
            McpError::Timeout { request_id } => assert_eq!(request_id, id),
            other => panic!("unexpected error variant: {other:?}"),
        }
    }
}
