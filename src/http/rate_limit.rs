//! Rate limiting implementation
//!
//! Uses the governor crate for client-side token bucket rate limiting, and
//! reads Lightspeed's leaky-bucket headers to back off before the server
//! starts answering 429.

use chrono::{DateTime, Utc};
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Header carrying `used/size` of the server-side bucket
pub const BUCKET_LEVEL_HEADER: &str = "x-ls-api-bucket-level";

/// Header carrying the drip rate (units per second)
pub const DRIP_RATE_HEADER: &str = "x-ls-api-drip-rate";

/// Configuration for rate limiting
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum number of requests per second
    pub requests_per_second: u32,
    /// Burst size (max tokens in bucket)
    pub burst_size: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 1,
            burst_size: 10,
        }
    }
}

impl RateLimiterConfig {
    /// Create a new rate limiter config
    pub fn new(requests_per_second: u32, burst_size: u32) -> Self {
        Self {
            requests_per_second,
            burst_size,
        }
    }
}

/// Token bucket rate limiter
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given config
    pub fn new(config: &RateLimiterConfig) -> Self {
        let quota = Quota::per_second(
            NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN),
        )
        .allow_burst(NonZeroU32::new(config.burst_size).unwrap_or(NonZeroU32::MIN));

        Self {
            limiter: Arc::new(Governor::direct(quota)),
        }
    }

    /// Wait until a request can be made
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(&RateLimiterConfig::default())
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish()
    }
}

// ============================================================================
// Server bucket throttle
// ============================================================================

/// Pauses requests while the server-side leaky bucket is nearly full
#[derive(Debug)]
pub struct BucketThrottle {
    /// Fill ratio above which requests are paused
    threshold: f64,
    /// Longest single pause
    max_pause: Duration,
    /// Earliest instant the next request may go out
    pause_until: Mutex<Option<Instant>>,
}

impl Default for BucketThrottle {
    fn default() -> Self {
        Self::new(0.9)
    }
}

impl BucketThrottle {
    /// Create a throttle that kicks in above `threshold` (0.0..=1.0)
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
            max_pause: Duration::from_secs(60),
            pause_until: Mutex::new(None),
        }
    }

    /// Cap every pause at `max_pause`
    #[must_use]
    pub fn with_max_pause(mut self, max_pause: Duration) -> Self {
        self.max_pause = max_pause;
        self
    }

    /// Compute the pause needed for the given headers
    pub fn pause_for(&self, headers: &HeaderMap) -> Option<Duration> {
        let (used, size) = headers
            .get(BUCKET_LEVEL_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_bucket_level)?;
        let drip = headers
            .get(DRIP_RATE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0)?;

        let allowed = size * self.threshold;
        if size <= 0.0 || used <= allowed {
            return None;
        }

        let pause = Duration::try_from_secs_f64((used - allowed) / drip).unwrap_or(self.max_pause);
        Some(pause.min(self.max_pause))
    }

    /// Record the bucket headers of a response
    pub fn observe(&self, headers: &HeaderMap) {
        if let Some(pause) = self.pause_for(headers) {
            debug!("Server bucket nearly full, pausing {pause:?}");
            if let Ok(mut until) = self.pause_until.lock() {
                *until = Some(Instant::now() + pause);
            }
        }
    }

    /// Sleep until the bucket has drained
    pub async fn wait(&self) {
        let until = self.pause_until.lock().ok().and_then(|mut u| u.take());
        if let Some(until) = until {
            tokio::time::sleep_until(until).await;
        }
    }
}

/// Parse `"used/size"` from the bucket level header; both must be finite
pub fn parse_bucket_level(value: &str) -> Option<(f64, f64)> {
    let (used, size) = value.split_once('/')?;
    let used: f64 = used.trim().parse().ok()?;
    let size: f64 = size.trim().parse().ok()?;
    (used.is_finite() && size.is_finite()).then_some((used, size))
}

// ============================================================================
// Retry-After
// ============================================================================

/// Parse a Retry-After value: delta-seconds or an HTTP-date
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}

/// Delay requested by a response, or `default` when absent or unparsable
pub fn retry_after_delay(headers: &HeaderMap, default: Duration) -> Duration {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| parse_retry_after(s, Utc::now()))
        .unwrap_or(default)
}
