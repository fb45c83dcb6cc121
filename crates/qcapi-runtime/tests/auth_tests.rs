//! IAM token exchange and caching against a mock identity endpoint.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use qcapi_runtime::{Clock, IamTokenProvider, QcapiError, TokenSource};

/// Clock that only moves when told to.
struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    fn new() -> Arc<Self> {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        Arc::new(Self(Mutex::new(start)))
    }

    fn advance(&self, secs: i64) {
        *self.0.lock().unwrap() += chrono::Duration::seconds(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

fn provider(server: &MockServer, clock: Arc<ManualClock>) -> IamTokenProvider {
    IamTokenProvider::new("test-api-key", reqwest::Client::new())
        .with_token_url(format!("{}/identity/token", server.uri()))
        .with_clock(clock)
}

async fn mount_token(server: &MockServer, token: &str, expires_in: i64) {
    Mock::given(method("POST"))
        .and(path("/identity/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": token, "expires_in": expires_in})),
        )
        .mount(server)
        .await;
}

async fn exchange_count(server: &MockServer) -> usize {
    server.received_requests().await.map_or(0, |r| r.len())
}

#[tokio::test]
async fn sends_apikey_grant_as_form() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/identity/token"))
        .and(header("accept", "application/json"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains(
            "grant_type=urn%3Aibm%3Aparams%3Aoauth%3Agrant-type%3Aapikey",
        ))
        .and(body_string_contains("apikey=test-api-key"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "abc", "expires_in": 3600})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider(&server, ManualClock::new());
    assert_eq!(provider.get_token().await.unwrap(), "abc");
}

#[tokio::test]
async fn reuses_token_until_slack_window() {
    let server = MockServer::start().await;
    mount_token(&server, "abc", 3600).await;

    let clock = ManualClock::new();
    let provider = provider(&server, clock.clone());

    for _ in 0..5 {
        assert_eq!(provider.get_token().await.unwrap(), "abc");
    }
    assert_eq!(exchange_count(&server).await, 1);
    assert!(provider.has_valid_token().await);

    // 3539s in: 61s of validity left, still served from cache.
    clock.advance(3539);
    provider.get_token().await.unwrap();
    assert_eq!(exchange_count(&server).await, 1);

    // 3541s in: inside the 60s slack, one new exchange.
    clock.advance(2);
    assert!(!provider.has_valid_token().await);
    provider.get_token().await.unwrap();
    provider.get_token().await.unwrap();
    assert_eq!(exchange_count(&server).await, 2);
}

#[tokio::test]
async fn short_lived_token_is_never_cached() {
    let server = MockServer::start().await;
    mount_token(&server, "abc", 10).await;

    let clock = ManualClock::new();
    let provider = provider(&server, clock.clone());

    assert_eq!(provider.get_token().await.unwrap(), "abc");
    clock.advance(5);
    assert_eq!(provider.get_token().await.unwrap(), "abc");
    clock.advance(4);
    provider.get_token().await.unwrap();

    // 10s of life is already within the 60s slack.
    assert_eq!(exchange_count(&server).await, 3);
}

#[tokio::test]
async fn missing_expires_in_defaults_to_one_hour() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/identity/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "abc"})))
        .mount(&server)
        .await;

    let clock = ManualClock::new();
    let start = clock.now();
    let provider = provider(&server, clock.clone());
    provider.get_token().await.unwrap();

    let cached = provider.cached().await.unwrap();
    assert_eq!(cached.expires_at - start, chrono::Duration::seconds(3600));
}

#[tokio::test]
async fn invalidate_forces_new_exchange() {
    let server = MockServer::start().await;
    mount_token(&server, "abc", 3600).await;

    let provider = provider(&server, ManualClock::new());
    provider.get_token().await.unwrap();
    provider.invalidate().await;
    assert!(provider.cached().await.is_none());
    provider.get_token().await.unwrap();

    assert_eq!(exchange_count(&server).await, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_share_one_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/identity/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "shared", "expires_in": 3600}))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let provider = Arc::new(provider(&server, ManualClock::new()));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let provider = Arc::clone(&provider);
            tokio::spawn(async move { provider.get_token().await })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), "shared");
    }
}

#[tokio::test]
async fn rejected_api_key_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/identity/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string(
            r#"{"errorCode":"BXNIM0415E","errorMessage":"Provided API key could not be found."}"#,
        ))
        .mount(&server)
        .await;

    let provider = provider(&server, ManualClock::new());
    let err = provider.get_token().await.unwrap_err();
    assert!(matches!(err, QcapiError::Auth(_)));
    assert!(err.to_string().contains("400"));
    assert!(err.to_string().contains("BXNIM0415E"));
    assert!(provider.cached().await.is_none());
}

#[tokio::test]
async fn malformed_responses_are_auth_errors() {
    for body in [
        json!({"expires_in": 3600}),
        json!({"access_token": "", "expires_in": 3600}),
        json!({"access_token": 42}),
    ] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/identity/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
            .mount(&server)
            .await;

        let provider = provider(&server, ManualClock::new());
        let err = provider.get_token().await.unwrap_err();
        assert!(matches!(err, QcapiError::Auth(_)), "{body}: {err}");
    }
}

#[tokio::test]
async fn unreachable_identity_endpoint_is_auth_error() {
    let provider = IamTokenProvider::new("key", reqwest::Client::new())
        .with_token_url("http://127.0.0.1:9/identity/token");
    let err = provider.get_token().await.unwrap_err();
    assert!(matches!(err, QcapiError::Auth(_)));
}
