//! Auth configuration types

use crate::config::TapConfig;
use crate::error::Result;
use chrono::{DateTime, TimeDelta, Utc};

/// Lifetime assumed when the token endpoint omits or garbles `expires_in`
pub(crate) const DEFAULT_EXPIRES_IN: i64 = 3600;

/// OAuth2 refresh-token flow settings
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// Token endpoint URL
    pub token_url: String,
    /// Client ID
    pub client_id: String,
    /// Client secret
    pub client_secret: String,
    /// Refresh token at startup
    pub refresh_token: String,
}

impl OAuthConfig {
    /// Create a new OAuth config
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl From<&TapConfig> for OAuthConfig {
    fn from(config: &TapConfig) -> Self {
        Self::new(
            &config.auth_endpoint,
            &config.client_id,
            &config.client_secret,
            &config.refresh_token,
        )
    }
}

/// Cached token with expiration
#[derive(Debug, Clone)]
pub struct CachedToken {
    /// The access token
    pub token: String,
    /// When the token expires
    pub expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    /// Create a new cached token
    pub fn new(token: String, expires_at: Option<DateTime<Utc>>) -> Self {
        Self { token, expires_at }
    }

    /// Check if the token is expired (with 30 second buffer)
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                let buffer = TimeDelta::seconds(30);
                Utc::now() + buffer >= expires_at
            }
            None => false, // No expiration = never expires
        }
    }
}

/// Outcome of a successful token refresh
#[derive(Debug, Clone)]
pub struct RefreshedToken {
    /// New access token
    pub access_token: String,
    /// Rotated refresh token, when the server issued one
    pub refresh_token: Option<String>,
    /// Token lifetime in seconds
    pub expires_in: i64,
    /// When the refresh request was sent
    pub refreshed_at: DateTime<Utc>,
}

impl RefreshedToken {
    /// Absolute expiry; a lifetime out of range counts as the default hour
    pub fn expires_at(&self) -> DateTime<Utc> {
        TimeDelta::try_seconds(self.expires_in)
            .and_then(|lifetime| self.refreshed_at.checked_add_signed(lifetime))
            .unwrap_or_else(|| self.refreshed_at + TimeDelta::seconds(DEFAULT_EXPIRES_IN))
    }
}

/// Receives every refreshed token
pub trait TokenObserver: Send + Sync {
    /// Called after a refresh succeeded
    fn on_refresh(&self, token: &RefreshedToken) -> Result<()>;
}
