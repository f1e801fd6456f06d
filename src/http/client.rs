//! HTTP client with retry and rate limiting
//!
//! Provides a robust HTTP client that handles:
//! - Automatic retries with configurable backoff
//! - Rate limiting to prevent API throttling
//! - Token refresh on 401
//! - Error classification for retry decisions

use super::rate_limit::{retry_after_delay, BucketThrottle, RateLimiter, RateLimiterConfig};
use crate::auth::OAuthAuthenticator;
use crate::error::{is_retryable_status, Error, Result};
use crate::types::BackoffType;
use reqwest::header::{HeaderMap, ACCEPT};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Longest response body kept in error messages
const MAX_ERROR_BODY: usize = 500;

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL for all requests
    pub base_url: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Maximum number of retries
    pub max_retries: u32,
    /// Initial delay for backoff
    pub initial_backoff: Duration,
    /// Maximum delay for backoff
    pub max_backoff: Duration,
    /// Type of backoff strategy
    pub backoff_type: BackoffType,
    /// Wait on 429 when the server sends no usable Retry-After
    pub default_retry_after: Duration,
    /// Rate limiter configuration
    pub rate_limit: Option<RateLimiterConfig>,
    /// Default headers for all requests
    pub default_headers: HashMap<String, String>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(300),
            max_retries: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            backoff_type: BackoffType::Exponential,
            default_retry_after: Duration::from_secs(60),
            rate_limit: Some(RateLimiterConfig::default()),
            default_headers: HashMap::new(),
            user_agent: format!("{}/{}", crate::NAME, crate::VERSION),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set max retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set backoff configuration
    pub fn backoff(mut self, backoff_type: BackoffType, initial: Duration, max: Duration) -> Self {
        self.config.backoff_type = backoff_type;
        self.config.initial_backoff = initial;
        self.config.max_backoff = max;
        self
    }

    /// Set the 429 fallback wait
    pub fn default_retry_after(mut self, delay: Duration) -> Self {
        self.config.default_retry_after = delay;
        self
    }

    /// Set rate limiter
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Disable rate limiting
    pub fn no_rate_limit(mut self) -> Self {
        self.config.rate_limit = None;
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// A fully read response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Final request URL (including query string)
    pub url: String,
    /// Status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body
    pub body: String,
}

impl HttpResponse {
    /// Parse the body as JSON; an empty body is `Value::Null`
    pub fn json(&self) -> Result<Value> {
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&self.body).map_err(|e| {
            Error::decode(format!(
                "Failed to parse JSON from {}: {e}; body starts with: {}",
                self.url,
                truncate(&self.body)
            ))
        })
    }
}

/// HTTP client with retry and rate limiting
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    authenticator: Option<Arc<OAuthAuthenticator>>,
    rate_limiter: Option<RateLimiter>,
    bucket: BucketThrottle,
}

impl HttpClient {
    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .expect("Failed to build HTTP client");

        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);
        let bucket = BucketThrottle::default().with_max_pause(config.max_backoff);

        Self {
            client,
            config,
            authenticator: None,
            rate_limiter,
            bucket,
        }
    }

    /// Attach an authenticator
    #[must_use]
    pub fn with_authenticator(mut self, authenticator: Arc<OAuthAuthenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Fetch one page: `url` is a path or an absolute next-page link
    pub async fn get_page(&self, url: &str, query: &[(String, String)]) -> Result<HttpResponse> {
        self.request(Method::GET, url, query).await
    }

    /// Make a request, retrying transient failures
    ///
    /// Once the retries are used up the last error is returned.
    async fn request(
        &self,
        method: Method,
        url: &str,
        query: &[(String, String)],
    ) -> Result<HttpResponse> {
        let full_url = self.build_url(url);
        let max_retries = self.config.max_retries;
        let mut attempt = 0;

        loop {
            // Wait for rate limiters
            if let Some(ref limiter) = self.rate_limiter {
                limiter.wait().await;
            }
            self.bucket.wait().await;

            // Build request
            let mut req = self
                .client
                .request(method.clone(), &full_url)
                .header(ACCEPT, "application/json");

            for (key, value) in &self.config.default_headers {
                req = req.header(key.as_str(), value.as_str());
            }
            if !query.is_empty() {
                req = req.query(query);
            }

            // Apply authentication
            if let Some(ref auth) = self.authenticator {
                req = auth.apply(req).await?;
            }

            let can_retry = attempt < max_retries;

            match req.send().await {
                Ok(response) => {
                    let status = response.status();
                    let headers = response.headers().clone();
                    let final_url = response.url().to_string();
                    self.bucket.observe(&headers);

                    if status.is_success() {
                        match response.text().await {
                            Ok(body) => {
                                debug!("Request succeeded: {} {}", method, final_url);
                                return Ok(HttpResponse {
                                    url: final_url,
                                    status,
                                    headers,
                                    body,
                                });
                            }
                            Err(e) if can_retry => {
                                let delay = self.calculate_backoff(attempt);
                                warn!(
                                    "Connection error while reading {final_url}: {e}, attempt {}/{}, retrying in {:?}",
                                    attempt + 1,
                                    max_retries + 1,
                                    delay
                                );
                                tokio::time::sleep(delay).await;
                                attempt += 1;
                                continue;
                            }
                            Err(e) => return Err(Error::Http(e)),
                        }
                    }

                    let body = response.text().await.unwrap_or_default();
                    let retryable = is_retryable_status(status.as_u16(), &body);
                    let error = Error::http_status(status.as_u16(), &final_url, truncate(&body));

                    // Check for rate limiting
                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = retry_after_delay(&headers, self.config.default_retry_after);
                        if can_retry {
                            warn!(
                                "Rate limited (429), attempt {}/{}, waiting {:?}",
                                attempt + 1,
                                max_retries + 1,
                                retry_after
                            );
                            tokio::time::sleep(retry_after).await;
                            attempt += 1;
                            continue;
                        }
                        return Err(error);
                    }

                    // Expired token: refresh and try again
                    if status == StatusCode::UNAUTHORIZED {
                        if let Some(ref auth) = self.authenticator {
                            if can_retry {
                                info!("Received 401 Unauthorized, token may have expired. Refreshing token...");
                                auth.invalidate().await;
                                attempt += 1;
                                continue;
                            }
                        }
                        return Err(error);
                    }

                    if retryable && can_retry {
                        let delay = self.calculate_backoff(attempt);
                        warn!(
                            "Request failed with {}, attempt {}/{}, retrying in {:?}",
                            status.as_u16(),
                            attempt + 1,
                            max_retries + 1,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    return Err(error);
                }
                Err(e) => {
                    let error = if e.is_timeout() {
                        Error::Timeout {
                            timeout_ms: self.config.timeout.as_millis() as u64,
                        }
                    } else {
                        Error::Http(e)
                    };

                    if error.is_retryable() && can_retry {
                        let delay = self.calculate_backoff(attempt);
                        warn!(
                            "Connection error while requesting {full_url}: {error}, attempt {}/{}, retrying in {:?}",
                            attempt + 1,
                            max_retries + 1,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    return Err(error);
                }
            }
        }
    }

    /// Build full URL from path
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        match &self.config.base_url {
            Some(base) => {
                let base = base.trim_end_matches('/');
                let path = path.trim_start_matches('/');
                format!("{base}/{path}")
            }
            None => path.to_string(),
        }
    }

    /// Calculate backoff delay for a given attempt
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let delay = match self.config.backoff_type {
            BackoffType::Constant => self.config.initial_backoff,
            BackoffType::Linear => self.config.initial_backoff * (attempt + 1),
            BackoffType::Exponential => {
                let factor = 2u32.saturating_pow(attempt);
                self.config.initial_backoff.saturating_mul(factor)
            }
        };

        std::cmp::min(delay, self.config.max_backoff)
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("has_authenticator", &self.authenticator.is_some())
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

/// Shorten a body for error messages
fn truncate(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
