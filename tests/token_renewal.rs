//! Integration tests for transparent session renewal.
//!
//! These tests drive the client end-to-end against a mock backend and
//! verify that:
//! - Concurrent 401 failures share exactly one renewal call
//! - Replayed requests carry the renewed token
//! - A renewed credential pair atomically replaces the stored one
//! - Renewal failure tears the session down (purged store, ended event)
//! - A 401 on a replayed request is terminal, not a second renewal

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::{json, Value};
use wiremock::matchers::{bearer_token, body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tilldesk::auth::{
    CredentialStore, MemoryStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY,
};
use tilldesk::{ApiClient, ApiError, SessionEvent};

/// Wrap a payload in the backend's response envelope.
fn envelope(payload: Value) -> Value {
    json!({
        "status": "success",
        "statusCode": 200,
        "message": "OK",
        "payload": payload,
        "date": "2025-11-04T09:30:00.000Z"
    })
}

fn renewed_session(access: &str, refresh: &str) -> Value {
    envelope(json!({
        "accessToken": access,
        "refreshToken": refresh,
        "tokenType": "Bearer",
        "user": {"id": 7, "name": "Dana", "role": "manager"}
    }))
}

async fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.set(ACCESS_TOKEN_KEY, "a1").await.unwrap();
    store.set(REFRESH_TOKEN_KEY, "r1").await.unwrap();
    store.set(USER_KEY, r#"{"id":7}"#).await.unwrap();
    store
}

#[tokio::test]
async fn test_concurrent_failures_share_one_renewal_and_replay() {
    let server = MockServer::start().await;
    let store = seeded_store().await;

    // The old token is rejected on both resources.
    Mock::given(method("GET"))
        .and(path("/api/invoices"))
        .and(bearer_token("a1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/sales"))
        .and(bearer_token("a1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    // Exactly one exchange of r1; delayed so both failures land inside the
    // same renewal cycle.
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .and(body_json(json!({"refreshToken": "r1"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(200))
                .set_body_json(renewed_session("a2", "r2")),
        )
        .expect(1)
        .mount(&server)
        .await;

    // Replays succeed with the renewed token.
    Mock::given(method("GET"))
        .and(path("/api/invoices"))
        .and(bearer_token("a2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!([{"id": 1}]))))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/sales"))
        .and(bearer_token("a2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!([{"id": 2}]))))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri(), store.clone()).unwrap();

    let results = join_all(vec![
        client.get::<Value>("/api/invoices"),
        client.get::<Value>("/api/sales"),
    ])
    .await;

    for result in results {
        assert!(result.unwrap().is_success());
    }

    // The renewed pair atomically replaced the old one.
    assert_eq!(
        store.get(ACCESS_TOKEN_KEY).await.unwrap().as_deref(),
        Some("a2")
    );
    assert_eq!(
        store.get(REFRESH_TOKEN_KEY).await.unwrap().as_deref(),
        Some("r2")
    );
    assert!(store.get(USER_KEY).await.unwrap().is_some());
}

#[tokio::test]
async fn test_replayed_request_rejected_again_is_terminal() {
    let server = MockServer::start().await;
    let store = seeded_store().await;

    // The endpoint rejects every token, old and new.
    Mock::given(method("GET"))
        .and(path("/api/reports"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    // Renewal itself works, but only one cycle may run.
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(renewed_session("a2", "r2")))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri(), store.clone()).unwrap();

    let result = client.get::<Value>("/api/reports").await;
    assert!(matches!(result, Err(ApiError::Unauthorized)));

    // The renewal still rotated the stored pair before the replay failed.
    assert_eq!(
        store.get(ACCESS_TOKEN_KEY).await.unwrap().as_deref(),
        Some("a2")
    );
}

#[tokio::test]
async fn test_failed_renewal_ends_session_and_purges_credentials() {
    let server = MockServer::start().await;
    let store = seeded_store().await;

    Mock::given(method("GET"))
        .and(path("/api/transactions"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!("pong"))))
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri(), store.clone()).unwrap();
    let mut events = client.session_events();

    let result = client.get::<Value>("/api/transactions").await;
    assert!(matches!(result, Err(ApiError::SessionExpired)));
    assert_eq!(events.try_recv().unwrap(), SessionEvent::Ended);

    for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY] {
        assert!(store.get(key).await.unwrap().is_none(), "{} not purged", key);
    }

    // With no stored token, the next call goes out without a bearer header.
    client.get::<Value>("/api/ping").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let ping = requests
        .iter()
        .find(|r| r.url.path() == "/api/ping")
        .unwrap();
    assert!(!ping.headers.contains_key("authorization"));
}

#[tokio::test]
async fn test_missing_refresh_token_ends_session_without_renewal_call() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());
    store.set(ACCESS_TOKEN_KEY, "a1").await.unwrap();

    Mock::given(method("GET"))
        .and(path("/api/reports"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri(), store.clone()).unwrap();
    let mut events = client.session_events();

    let result = client.get::<Value>("/api/reports").await;
    assert!(matches!(result, Err(ApiError::SessionExpired)));
    assert_eq!(events.try_recv().unwrap(), SessionEvent::Ended);

    // The renewal endpoint was never attempted.
    let requests = server.received_requests().await.unwrap();
    assert!(requests
        .iter()
        .all(|r| r.url.path() != "/api/auth/refresh"));
}

#[tokio::test]
async fn test_login_persists_session_and_fixed_headers_are_sent() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(
            json!({"email": "dana@example.com", "password": "hunter2"}),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(renewed_session("a1", "r1")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/me"))
        .and(bearer_token("a1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({"id": 7}))))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri(), store.clone()).unwrap();

    let payload = client.login("dana@example.com", "hunter2").await.unwrap();
    assert_eq!(payload.access_token, "a1");

    assert_eq!(
        store.get(ACCESS_TOKEN_KEY).await.unwrap().as_deref(),
        Some("a1")
    );
    assert_eq!(
        store.get(REFRESH_TOKEN_KEY).await.unwrap().as_deref(),
        Some("r1")
    );
    let user = client.current_user().await.unwrap().unwrap();
    assert_eq!(user["name"], "Dana");

    // The stored token is attached to subsequent calls.
    client.get::<Value>("/api/me").await.unwrap();

    // Every outbound call carries the fixed headers.
    let requests = server.received_requests().await.unwrap();
    for request in &requests {
        assert_eq!(
            request
                .headers
                .get("ngrok-skip-browser-warning")
                .and_then(|v| v.to_str().ok()),
            Some("true")
        );
    }
}

#[tokio::test]
async fn test_logout_clears_credentials_locally() {
    let store = seeded_store().await;
    let client = ApiClient::new("https://api.example.com", store.clone()).unwrap();
    let mut events = client.session_events();

    client.logout().await;

    for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY] {
        assert!(store.get(key).await.unwrap().is_none());
    }
    // An explicit logout is host-initiated; no session-ended event fires.
    assert!(events.try_recv().is_err());
}
