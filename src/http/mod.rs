//! HTTP client module
//!
//! Provides HTTP client with retry, rate limiting, and backoff strategies.
//!
//! # Features
//!
//! - **Automatic Retries**: 5xx, transport errors and "try again later" 400s
//! - **Rate Limiting**: Token bucket rate limiter using governor
//! - **Server Bucket**: Pauses when the Lightspeed leaky bucket fills up
//! - **Authentication**: 401 invalidates the access token and retries

mod client;
mod rate_limit;

pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder, HttpResponse};
pub use rate_limit::{
    parse_bucket_level, parse_retry_after, retry_after_delay, BucketThrottle, RateLimiter,
    RateLimiterConfig, BUCKET_LEVEL_HEADER, DRIP_RATE_HEADER,
};

#[cfg(test)]
mod tests;
