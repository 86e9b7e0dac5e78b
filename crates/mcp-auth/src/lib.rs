//! OAuth 2.1 authorization subsystem gating the HTTP transports (§4.4):
//! authorization-server discovery (RFC 8414), dynamic client registration
//! (RFC 7591), PKCE S256 authorization-code flow (RFC 7636), protected-
//! resource metadata (RFC 9728), and resource indicators (RFC 8707).
//!
//! Hand-rolled rather than built on the `oauth2` crate: the flow here is
//! narrow enough (one grant type, one PKCE method, DCR mandatory) that a
//! typestate HTTP client adds more ceremony than it saves, and staying on
//! `sha2`/`base64`/`subtle`/`rand`/`url` keeps this crate's dependency
//! footprint aligned with the rest of the workspace.

#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]
#![allow(clippy::module_name_repetitions)]

pub mod client_registration;
pub mod error;
pub mod metadata;
pub mod pkce;
pub mod provider;
pub mod storage;
pub mod token;
pub mod url_normalize;

pub use client_registration::{ClientRegistration, RegistrationRequest, RegistrationResponse};
pub use error::{AuthError, AuthResult};
pub use metadata::{ProtectedResourceMetadata, ServerMetadata};
pub use pkce::PkceState;
pub use provider::{OAuthProvider, OAuthProviderConfig};
pub use storage::{AuthStorage, InMemoryAuthStorage};
pub use token::Token;
pub use url_normalize::normalize;
