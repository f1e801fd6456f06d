//! Tests for the HTTP client module

use super::*;
use crate::auth::{OAuthAuthenticator, OAuthConfig};
use crate::error::{Error, TRY_AGAIN_LATER};
use crate::types::BackoffType;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_config(server: &MockServer, retries: u32) -> HttpClientConfig {
    HttpClientConfig::builder()
        .base_url(server.uri())
        .max_retries(retries)
        .backoff(
            BackoffType::Constant,
            Duration::from_millis(10),
            Duration::from_secs(1),
        )
        .default_retry_after(Duration::from_millis(10))
        .no_rate_limit()
        .build()
}

async fn mount_token(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/auth/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "fresh-token",
            "expires_in": 3600
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn authenticator(server: &MockServer) -> Arc<OAuthAuthenticator> {
    Arc::new(OAuthAuthenticator::new(OAuthConfig::new(
        format!("{}/auth/oauth/token", server.uri()),
        "client",
        "secret",
        "refresh",
    )))
}

#[test]
fn test_http_client_config_default() {
    let config = HttpClientConfig::default();
    assert_eq!(config.timeout, Duration::from_secs(300));
    assert_eq!(config.max_retries, 5);
    assert_eq!(config.default_retry_after, Duration::from_secs(60));
    assert!(config.base_url.is_none());
    assert!(config.rate_limit.is_some());
}

#[test]
fn test_http_client_config_builder() {
    let config = HttpClientConfig::builder()
        .base_url("https://api.example.com")
        .timeout(Duration::from_secs(60))
        .max_retries(7)
        .backoff(
            BackoffType::Linear,
            Duration::from_millis(200),
            Duration::from_secs(30),
        )
        .header("Accept-Language", "en-US")
        .user_agent("test-agent/1.0")
        .build();

    assert_eq!(config.base_url, Some("https://api.example.com".to_string()));
    assert_eq!(config.timeout, Duration::from_secs(60));
    assert_eq!(config.max_retries, 7);
    assert_eq!(config.backoff_type, BackoffType::Linear);
    assert_eq!(config.initial_backoff, Duration::from_millis(200));
    assert_eq!(config.max_backoff, Duration::from_secs(30));
    assert_eq!(
        config.default_headers.get("Accept-Language"),
        Some(&"en-US".to_string())
    );
    assert_eq!(config.user_agent, "test-agent/1.0");
}

#[tokio::test]
async fn test_http_client_get_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Account.json"))
        .and(header("Accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Account": {"accountID": "1", "name": "Demo"}
        })))
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_config(&mock_server, 0));
    let response = client.get_page("/Account.json", &[]).await.unwrap();

    assert_eq!(response.status, 200);
    let json = response.json().unwrap();
    assert_eq!(json["Account"]["name"], "Demo");
}

#[tokio::test]
async fn test_http_client_empty_body_is_null() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/empty"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_config(&mock_server, 0));
    let response = client.get_page("/empty", &[]).await.unwrap();
    assert!(response.json().unwrap().is_null());
}

#[tokio::test]
async fn test_http_client_invalid_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_config(&mock_server, 0));
    let response = client.get_page("/broken", &[]).await.unwrap();
    assert!(matches!(response.json().unwrap_err(), Error::Decode { .. }));
}

#[tokio::test]
async fn test_http_client_query_params_and_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Account/1/Item.json"))
        .and(query_param("limit", "100"))
        .and(query_param("load_relations", "all"))
        .and(header("Accept-Language", "fr-CA"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = HttpClientConfig::builder()
        .base_url(mock_server.uri())
        .header("Accept-Language", "fr-CA")
        .no_rate_limit()
        .build();
    let client = HttpClient::with_config(config);

    let query = vec![
        ("limit".to_string(), "100".to_string()),
        ("load_relations".to_string(), "all".to_string()),
    ];
    let response = client
        .get_page("/Account/1/Item.json", &query)
        .await
        .unwrap();
    assert_eq!(response.status, 200);
    assert!(response.url.contains("limit=100"));
}

#[tokio::test]
async fn test_http_client_404_is_fatal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_config(&mock_server, 3));
    let err = client.get_page("/missing", &[]).await.unwrap_err();

    assert!(matches!(err, Error::HttpStatus { status: 404, .. }));
}

#[tokio::test]
async fn test_http_client_retry_on_500() {
    let mock_server = MockServer::start().await;

    // First two calls return 500, third succeeds
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_config(&mock_server, 3));
    let response = client.get_page("/flaky", &[]).await.unwrap();

    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_http_client_retries_try_again_later() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(400).set_body_string(TRY_AGAIN_LATER))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_config(&mock_server, 2));
    let response = client.get_page("/busy", &[]).await.unwrap();
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_http_client_plain_400_is_fatal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bad"))
        .respond_with(ResponseTemplate::new(400).set_body_string("Invalid relation"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_config(&mock_server, 3));
    let err = client.get_page("/bad", &[]).await.unwrap_err();

    let message = err.to_string();
    assert!(message.contains("400"));
    assert!(message.contains("Invalid relation"));
}

#[tokio::test]
async fn test_http_client_rate_limit_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "0")
                .set_body_string("Rate limited"),
        )
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_config(&mock_server, 2));
    let response = client.get_page("/limited", &[]).await.unwrap();

    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_http_client_max_retries_exceeded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/always-fail"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Server error"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_config(&mock_server, 2));
    let err = client.get_page("/always-fail", &[]).await.unwrap_err();

    assert!(matches!(err, Error::HttpStatus { status: 500, .. }));
}

#[tokio::test]
async fn test_http_client_429_exhausted_returns_last_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "0")
                .set_body_string("Slow down"),
        )
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_config(&mock_server, 1));
    match client.get_page("/limited", &[]).await.unwrap_err() {
        Error::HttpStatus { status, body, .. } => {
            assert_eq!(status, 429);
            assert_eq!(body, "Slow down");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_http_client_try_again_later_after_long_body_is_retried() {
    let mock_server = MockServer::start().await;

    let body = format!("{} {TRY_AGAIN_LATER}", "x".repeat(800));
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(400).set_body_string(body))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_config(&mock_server, 2));
    let response = client.get_page("/busy", &[]).await.unwrap();
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_http_client_error_body_truncated() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/huge"))
        .respond_with(ResponseTemplate::new(403).set_body_string("x".repeat(2000)))
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_config(&mock_server, 0));
    match client.get_page("/huge", &[]).await.unwrap_err() {
        Error::HttpStatus { body, .. } => {
            assert_eq!(body.len(), 503);
            assert!(body.ends_with("..."));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_http_client_sends_bearer_token() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server, 1).await;

    Mock::given(method("GET"))
        .and(path("/Account.json"))
        .and(header("Authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_config(&mock_server, 0))
        .with_authenticator(authenticator(&mock_server));

    client.get_page("/Account.json", &[]).await.unwrap();
    client.get_page("/Account.json", &[]).await.unwrap();
}

#[tokio::test]
async fn test_http_client_401_refreshes_token() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server, 2).await;

    Mock::given(method("GET"))
        .and(path("/Account.json"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/Account.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_config(&mock_server, 2))
        .with_authenticator(authenticator(&mock_server));

    let response = client.get_page("/Account.json", &[]).await.unwrap();
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_http_client_401_without_authenticator_is_fatal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Account.json"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_config(&mock_server, 3));
    let err = client.get_page("/Account.json", &[]).await.unwrap_err();
    assert!(matches!(err, Error::HttpStatus { status: 401, .. }));
}

#[tokio::test]
async fn test_http_client_full_url() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/API/V3/Account/1/Sale.json"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    // Next-page links are absolute and bypass the base URL
    let config = HttpClientConfig::builder()
        .base_url("https://unused.example.com")
        .no_rate_limit()
        .build();
    let client = HttpClient::with_config(config);

    let response = client
        .get_page(&format!("{}/API/V3/Account/1/Sale.json", mock_server.uri()), &[])
        .await
        .unwrap();
    assert_eq!(response.status, 200);
}

#[test]
fn test_build_url_joins_slashes() {
    let config = HttpClientConfig::builder()
        .base_url("https://api.lightspeedapp.com/API/V3/")
        .no_rate_limit()
        .build();
    let client = HttpClient::with_config(config);

    assert_eq!(
        client.build_url("/Account.json"),
        "https://api.lightspeedapp.com/API/V3/Account.json"
    );
}

#[test]
fn test_calculate_backoff_constant() {
    let config = HttpClientConfig::builder()
        .backoff(
            BackoffType::Constant,
            Duration::from_millis(100),
            Duration::from_secs(10),
        )
        .no_rate_limit()
        .build();

    let client = HttpClient::with_config(config);

    assert_eq!(client.calculate_backoff(0), Duration::from_millis(100));
    assert_eq!(client.calculate_backoff(5), Duration::from_millis(100));
}

#[test]
fn test_calculate_backoff_linear() {
    let config = HttpClientConfig::builder()
        .backoff(
            BackoffType::Linear,
            Duration::from_millis(100),
            Duration::from_secs(10),
        )
        .no_rate_limit()
        .build();

    let client = HttpClient::with_config(config);

    assert_eq!(client.calculate_backoff(0), Duration::from_millis(100));
    assert_eq!(client.calculate_backoff(1), Duration::from_millis(200));
    assert_eq!(client.calculate_backoff(2), Duration::from_millis(300));
}

#[test]
fn test_calculate_backoff_exponential() {
    let config = HttpClientConfig::builder()
        .backoff(
            BackoffType::Exponential,
            Duration::from_millis(100),
            Duration::from_secs(10),
        )
        .no_rate_limit()
        .build();

    let client = HttpClient::with_config(config);

    assert_eq!(client.calculate_backoff(0), Duration::from_millis(100));
    assert_eq!(client.calculate_backoff(1), Duration::from_millis(200));
    assert_eq!(client.calculate_backoff(3), Duration::from_millis(800));
}

#[test]
fn test_calculate_backoff_respects_max() {
    let config = HttpClientConfig::builder()
        .backoff(
            BackoffType::Exponential,
            Duration::from_millis(100),
            Duration::from_millis(500),
        )
        .no_rate_limit()
        .build();

    let client = HttpClient::with_config(config);

    assert_eq!(client.calculate_backoff(10), Duration::from_millis(500));
    assert_eq!(client.calculate_backoff(40), Duration::from_millis(500));
}

#[test]
fn test_http_client_debug() {
    let client = HttpClient::with_config(HttpClientConfig::default());
    let debug_str = format!("{:?}", client);
    assert!(debug_str.contains("HttpClient"));
    assert!(debug_str.contains("has_authenticator"));
}

#[tokio::test]
async fn test_get_page_without_params_keeps_next_url_verbatim() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Account/1/Sale.json"))
        .and(query_param("after", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_config(&mock_server, 0));
    let next = format!("{}/Account/1/Sale.json?limit=100&after=abc", mock_server.uri());
    let response = client.get_page(&next, &[]).await.unwrap();

    assert_eq!(response.url, next);
}
