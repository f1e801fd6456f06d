//! OAuth2 authenticator
//!
//! Handles applying the bearer token to requests and refreshing it.

use super::types::{CachedToken, OAuthConfig, RefreshedToken, TokenObserver, DEFAULT_EXPIRES_IN};
use crate::error::{Error, Result};
use crate::http::retry_after_delay;
use chrono::Utc;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Token endpoint attempts before giving up on 429s
const MAX_REFRESH_ATTEMPTS: u32 = 3;

/// Applies OAuth2 bearer tokens and keeps them fresh
pub struct OAuthAuthenticator {
    /// Auth configuration
    config: OAuthConfig,
    /// Current refresh token (rotates on every refresh)
    refresh_token: Arc<RwLock<String>>,
    /// Cached access token
    cached_token: Arc<RwLock<Option<CachedToken>>>,
    /// HTTP client for token requests
    http_client: Client,
    /// Notified after each refresh
    observer: Option<Arc<dyn TokenObserver>>,
    /// Wait used on 429 when Retry-After is missing
    default_retry_after: Duration,
}

impl OAuthAuthenticator {
    /// Create a new authenticator with the given config
    pub fn new(config: OAuthConfig) -> Self {
        Self::with_client(config, Client::new())
    }

    /// Create an authenticator with a custom HTTP client
    pub fn with_client(config: OAuthConfig, http_client: Client) -> Self {
        let refresh_token = config.refresh_token.clone();
        Self {
            config,
            refresh_token: Arc::new(RwLock::new(refresh_token)),
            cached_token: Arc::new(RwLock::new(None)),
            http_client,
            observer: None,
            default_retry_after: Duration::from_secs(60),
        }
    }

    /// Report refreshed tokens to an observer
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn TokenObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Override the wait used on 429 without Retry-After
    #[must_use]
    pub fn with_default_retry_after(mut self, delay: Duration) -> Self {
        self.default_retry_after = delay;
        self
    }

    /// Start with a previously issued access token
    pub async fn seed(&self, token: CachedToken) {
        if token.is_expired() {
            debug!("Seeded access token already expired, ignoring it");
            return;
        }
        let mut cached = self.cached_token.write().await;
        *cached = Some(token);
    }

    /// Apply authentication to a request builder
    pub async fn apply(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.get_or_refresh_token().await?;
        Ok(req.bearer_auth(token))
    }

    /// Drop the cached token so the next request refreshes it
    pub async fn invalidate(&self) {
        let mut cached = self.cached_token.write().await;
        *cached = None;
    }

    /// Get a valid token, refreshing if necessary
    async fn get_or_refresh_token(&self) -> Result<String> {
        // Check if we have a valid cached token
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if !token.is_expired() {
                    return Ok(token.token.clone());
                }
            }
        }

        // Need to refresh - acquire write lock
        let mut cached = self.cached_token.write().await;

        // Double-check after acquiring write lock (another task might have refreshed)
        if let Some(token) = cached.as_ref() {
            if !token.is_expired() {
                return Ok(token.token.clone());
            }
        }

        let refreshed = self.fetch_new_token().await?;
        let token_str = refreshed.access_token.clone();
        *cached = Some(CachedToken::new(
            refreshed.access_token.clone(),
            Some(refreshed.expires_at()),
        ));
        drop(cached);

        if let Some(observer) = &self.observer {
            if let Err(e) = observer.on_refresh(&refreshed) {
                warn!("Refreshed token could not be persisted: {e}");
            }
        }

        Ok(token_str)
    }

    /// Exchange the refresh token for a new access token
    async fn fetch_new_token(&self) -> Result<RefreshedToken> {
        let current_refresh = self.refresh_token.read().await.clone();
        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", current_refresh.as_str()),
        ];

        let mut attempt = 0;
        loop {
            attempt += 1;
            let refreshed_at = Utc::now();
            let response = self
                .http_client
                .post(&self.config.token_url)
                .form(&form)
                .send()
                .await
                .map_err(Error::Http)?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS && attempt < MAX_REFRESH_ATTEMPTS {
                let delay = retry_after_delay(response.headers(), self.default_retry_after);
                warn!(
                    "Token endpoint rate limited (429), attempt {attempt}/{MAX_REFRESH_ATTEMPTS}, waiting {delay:?}"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::token_refresh(format!(
                    "Failed OAuth login, status {}: {body}",
                    status.as_u16()
                )));
            }

            let token_response: TokenResponse = response.json().await.map_err(Error::Http)?;
            info!("OAuth authorization attempt was successful");

            if let Some(rotated) = &token_response.refresh_token {
                let mut refresh = self.refresh_token.write().await;
                *refresh = rotated.clone();
            }

            return Ok(RefreshedToken {
                access_token: token_response.access_token,
                refresh_token: token_response.refresh_token,
                expires_in: token_response.expires_in.unwrap_or(DEFAULT_EXPIRES_IN),
                refreshed_at,
            });
        }
    }
}

impl std::fmt::Debug for OAuthAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthAuthenticator")
            .field("token_url", &self.config.token_url)
            .field("has_observer", &self.observer.is_some())
            .finish_non_exhaustive()
    }
}

/// OAuth2 token response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}
