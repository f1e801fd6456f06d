//! Tap configuration
//!
//! The config file is a flat JSON object. Known keys are parsed into
//! [`TapConfig`]; every other key (including the per-stream
//! `<stream>_relations` overrides) is kept in `extra` so that token
//! write-back never loses anything the user put in the file.

use crate::auth::{RefreshedToken, TokenObserver};
use crate::error::{Error, Result, ResultExt};
use crate::http::{HttpClientConfig, RateLimiterConfig};
use crate::types::{BackoffType, JsonObject, JsonValue, OptionStringExt};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

/// Default Lightspeed R-Series API root
pub const DEFAULT_BASE_URL: &str = "https://api.lightspeedapp.com/API/V3";

/// Default OAuth2 token endpoint
pub const DEFAULT_AUTH_ENDPOINT: &str = "https://cloud.lightspeedapp.com/auth/oauth/token";

/// Largest page the API will serve
pub const MAX_PAGE_SIZE: u32 = 100;

// ============================================================================
// Tap Config
// ============================================================================

/// Parsed tap configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TapConfig {
    /// OAuth2 client id
    #[serde(default)]
    pub client_id: String,

    /// OAuth2 client secret
    #[serde(default)]
    pub client_secret: String,

    /// OAuth2 refresh token
    #[serde(default)]
    pub refresh_token: String,

    /// Last known access token
    #[serde(default)]
    pub access_token: Option<String>,

    /// Lifetime of `access_token` in seconds
    #[serde(default)]
    pub expires_in: Option<i64>,

    /// Unix timestamp at which `access_token` expires
    #[serde(default)]
    pub expires: Option<i64>,

    /// Only sync this account
    #[serde(default)]
    pub account_id: Option<String>,

    /// Lower bound for incremental streams without a bookmark
    #[serde(default)]
    pub start_date: Option<String>,

    /// User-Agent header value
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Sent as Accept-Language
    #[serde(default)]
    pub locale: Option<String>,

    /// API root
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Token endpoint
    #[serde(default = "default_auth_endpoint")]
    pub auth_endpoint: String,

    /// Records per page (capped at 100)
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Maximum retries per request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Client-side rate limit
    #[serde(default = "default_rps")]
    pub requests_per_second: u32,

    /// Client-side burst size
    #[serde(default = "default_burst")]
    pub burst_size: u32,

    /// Everything else, preserved verbatim
    #[serde(flatten)]
    pub extra: JsonObject,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_auth_endpoint() -> String {
    DEFAULT_AUTH_ENDPOINT.to_string()
}

fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}

fn default_max_retries() -> u32 {
    5
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_rps() -> u32 {
    1
}

fn default_burst() -> u32 {
    10
}

impl TapConfig {
    /// Load, parse and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        ConfigStore::load(path)?.config()
    }

    /// Parse and validate a config from JSON
    pub fn from_value(value: JsonValue) -> Result<Self> {
        let config: TapConfig = serde_json::from_value(value)
            .map_err(|e| Error::config(format!("Invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check required fields and value ranges
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("refresh_token", &self.refresh_token),
        ] {
            if value.trim().is_empty() {
                return Err(Error::missing_field(field));
            }
        }

        if self.page_size == 0 {
            return Err(Error::invalid_value("page_size", "must be greater than 0"));
        }

        url::Url::parse(&self.base_url)
            .map_err(|e| Error::invalid_value("base_url", e.to_string()))?;
        url::Url::parse(&self.auth_endpoint)
            .map_err(|e| Error::invalid_value("auth_endpoint", e.to_string()))?;

        self.start_date()?;
        Ok(())
    }

    /// Parsed `start_date`, accepting RFC 3339 or a bare `YYYY-MM-DD`
    pub fn start_date(&self) -> Result<Option<DateTime<Utc>>> {
        let Some(raw) = self.start_date.clone().none_if_empty() else {
            return Ok(None);
        };

        if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(Some(dt.with_timezone(&Utc)));
        }
        if let Ok(date) = NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
            if let Some(dt) = date.and_hms_opt(0, 0, 0) {
                return Ok(Some(dt.and_utc()));
            }
        }

        Err(Error::invalid_value(
            "start_date",
            format!("'{raw}' is not an RFC 3339 timestamp"),
        ))
    }

    /// Effective page size sent as `limit`
    pub fn effective_page_size(&self) -> u32 {
        self.page_size.min(MAX_PAGE_SIZE)
    }

    /// Configured `load_relations` override for a stream
    pub fn relations_for(&self, stream: &str) -> Option<String> {
        match self.extra.get(&format!("{stream}_relations"))? {
            JsonValue::String(s) => s.clone().none_if_empty(),
            JsonValue::Array(items) => Some(JsonValue::Array(items.clone()).to_string()),
            _ => None,
        }
    }

    /// Access token seeded from the config, if it is still usable
    pub fn seeded_token(&self) -> Option<(String, DateTime<Utc>)> {
        let token = self.access_token.clone().none_if_empty()?;
        let expires_at = DateTime::from_timestamp(self.expires?, 0)?;
        Some((token, expires_at))
    }

    /// HTTP client settings derived from this config
    pub fn http_client_config(&self) -> HttpClientConfig {
        let mut builder = HttpClientConfig::builder()
            .base_url(&self.base_url)
            .timeout(Duration::from_secs(self.request_timeout_secs))
            .max_retries(self.max_retries)
            .backoff(
                BackoffType::Exponential,
                Duration::from_secs(1),
                Duration::from_secs(60),
            )
            .rate_limit(RateLimiterConfig::new(
                self.requests_per_second,
                self.burst_size,
            ));

        if let Some(agent) = self.user_agent.clone().none_if_empty() {
            builder = builder.user_agent(agent);
        }
        if let Some(locale) = self.locale.clone().none_if_empty() {
            builder = builder.header("Accept-Language", locale);
        }

        builder.build()
    }
}

// ============================================================================
// Config Store (token write-back)
// ============================================================================

/// Owns the raw config file so refreshed tokens can be written back
#[derive(Debug)]
pub struct ConfigStore {
    /// Config file location (None = in-memory)
    path: Option<PathBuf>,
    /// Raw JSON object as read from disk
    raw: Mutex<JsonObject>,
}

impl ConfigStore {
    /// Read a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let raw: JsonObject = serde_json::from_str(&contents)
            .map_err(|e| Error::config(format!("Invalid config JSON: {e}")))?;

        Ok(Self {
            path: Some(path),
            raw: Mutex::new(raw),
        })
    }

    /// Wrap an in-memory config (tokens are not persisted)
    pub fn in_memory(raw: JsonObject) -> Self {
        Self {
            path: None,
            raw: Mutex::new(raw),
        }
    }

    /// Parse and validate the stored config
    pub fn config(&self) -> Result<TapConfig> {
        TapConfig::from_value(JsonValue::Object(self.raw()))
    }

    /// Snapshot of the raw config object
    pub fn raw(&self) -> JsonObject {
        self.raw
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Config file path
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write refreshed token fields back into the config
    pub fn persist_tokens(&self, token: &RefreshedToken) -> Result<()> {
        let snapshot = {
            let mut raw = self
                .raw
                .lock()
                .map_err(|_| Error::config("Config store lock poisoned"))?;

            raw.insert(
                "access_token".to_string(),
                JsonValue::String(token.access_token.clone()),
            );
            if let Some(refresh) = &token.refresh_token {
                raw.insert(
                    "refresh_token".to_string(),
                    JsonValue::String(refresh.clone()),
                );
            }
            raw.insert("expires_in".to_string(), JsonValue::from(token.expires_in));
            raw.insert(
                "expires".to_string(),
                JsonValue::from(token.expires_at().timestamp()),
            );
            raw.clone()
        };

        let Some(path) = &self.path else {
            debug!("In-memory config, skipping token write-back");
            return Ok(());
        };

        let contents = serde_json::to_string_pretty(&snapshot)?;

        // Write to temp file first, then rename for atomicity
        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, contents)
            .map_err(|e| Error::config(format!("Failed to write config file: {e}")))?;
        std::fs::rename(&temp_path, path)
            .map_err(|e| Error::config(format!("Failed to rename config file: {e}")))?;

        info!("Stored refreshed access token in {}", path.display());
        Ok(())
    }
}

impl TokenObserver for ConfigStore {
    fn on_refresh(&self, token: &RefreshedToken) -> Result<()> {
        self.persist_tokens(token)
    }
}
