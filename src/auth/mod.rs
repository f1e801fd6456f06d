//! Authentication module
//!
//! Lightspeed R-Series uses OAuth2 with rotating refresh tokens.
//!
//! The `OAuthAuthenticator` caches the access token, refreshes it when it
//! expires or when the API answers 401, and reports every refresh to a
//! `TokenObserver` so the rotated refresh token can be persisted.

mod authenticator;
mod types;

pub use authenticator::OAuthAuthenticator;
pub use types::{CachedToken, OAuthConfig, RefreshedToken, TokenObserver};
