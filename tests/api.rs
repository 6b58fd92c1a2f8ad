//! HTTP surface tests: requests go through the full router (middleware
//! included) via `tower::ServiceExt::oneshot`, backed by the fake provider.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use common::{harness, Harness};
use token_broker::{api, AppState};

fn app(h: &Harness) -> Router {
    let state = Arc::new(AppState {
        lifecycle: h.lifecycle.clone(),
        provider: h.provider.clone(),
    });
    api::router(state, None)
}

async fn call(app: Router, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    let req = builder
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_health_reports_summary() {
    let h = harness();
    h.lifecycle.issue("app1", None).await.unwrap();

    let (status, body) = call(app(&h), Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storedTokens"], 1);
    assert_eq!(body["tokenLifespanMs"], 300_000);
    assert_eq!(body["tokenLifespanMinutes"], 5.0);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_get_token_defaults_owner() {
    let h = harness();
    let (status, body) = call(app(&h), Method::GET, "/token", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["clientId"], "default");
    assert_eq!(body["token"], "ghs_fake_1");
    assert_eq!(body["cached"], false);
    assert!(body.get("repositories").is_none());
    assert!(body["expiresAt"].is_string());
    assert!(body["createdAt"].is_string());
}

#[tokio::test]
async fn test_get_token_for_named_owner_is_always_fresh() {
    let h = harness();
    let (_, first) = call(app(&h), Method::GET, "/token/app1", None).await;
    let (_, second) = call(app(&h), Method::GET, "/token/app1", None).await;
    assert_eq!(first["clientId"], "app1");
    assert_ne!(first["token"], second["token"]);
    assert_ne!(first["tokenId"], second["tokenId"]);
    assert_eq!(h.provider.exchanges(), 2);
}

#[tokio::test]
async fn test_post_token_with_repositories() {
    let h = harness();
    let (status, body) = call(
        app(&h),
        Method::POST,
        "/token/ci",
        Some(r#"{"repositories": ["api", "web"]}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["clientId"], "ci");
    assert_eq!(body["repositories"], serde_json::json!(["api", "web"]));
    assert_eq!(
        *h.provider.last_scope.lock().unwrap(),
        Some(vec!["api".to_string(), "web".to_string()])
    );
}

#[tokio::test]
async fn test_post_token_without_body_is_unrestricted() {
    let h = harness();
    let (status, body) = call(app(&h), Method::POST, "/token", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["clientId"], "default");
    assert!(h.provider.last_scope.lock().unwrap().is_none());
}

#[tokio::test]
async fn test_post_token_rejects_bad_repositories_before_upstream() {
    let h = harness();
    let (status, body) = call(
        app(&h),
        Method::POST,
        "/token/ci",
        Some(r#"{"repositories": "api"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "validation_failed");
    assert_eq!(h.provider.exchanges(), 0);
    assert_eq!(h.registry.size().await, 0);
}

#[tokio::test]
async fn test_upstream_failure_is_500() {
    let h = harness();
    h.provider.exchange_ok.store(false, Ordering::SeqCst);
    let (status, body) = call(app(&h), Method::GET, "/token/app1", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "token_exchange_failed");
    assert_eq!(h.registry.size().await, 0);
}

#[tokio::test]
async fn test_list_tokens_shape() {
    let h = harness();
    h.lifecycle.issue("app1", None).await.unwrap();
    h.lifecycle.issue("app2", None).await.unwrap();
    h.clock.advance(chrono::Duration::minutes(1));

    let (status, body) = call(app(&h), Method::GET, "/tokens", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["totalTokens"], 2);
    let first = &body["tokens"][0];
    assert_eq!(first["tokenId"], 1);
    assert_eq!(first["clientId"], "app1");
    assert_eq!(first["isExpired"], false);
    assert_eq!(first["timeUntilExpiry"], 240_000);
    assert!(first.get("token").is_none());
}

#[tokio::test]
async fn test_delete_by_id() {
    let h = harness();
    let record = h.lifecycle.issue("app1", None).await.unwrap();

    let uri = format!("/tokens/{}", record.id);
    let (status, body) = call(app(&h), Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["tokenId"], record.id);
    assert_eq!(body["revoked"], true);
    assert_eq!(h.registry.size().await, 0);
}

#[tokio::test]
async fn test_delete_falls_back_to_owner() {
    let h = harness();
    h.lifecycle.issue("app1", None).await.unwrap();
    h.lifecycle.issue("app1", None).await.unwrap();
    h.lifecycle.issue("app2", None).await.unwrap();

    let (status, body) = call(app(&h), Method::DELETE, "/tokens/app1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["clientId"], "app1");
    assert_eq!(body["deletedCount"], 2);
    assert_eq!(body["revokedCount"], 2);
    assert_eq!(h.registry.size().await, 1);
}

#[tokio::test]
async fn test_delete_numeric_owner_when_no_such_id() {
    let h = harness();
    h.lifecycle.issue("42", None).await.unwrap();

    let (_, body) = call(app(&h), Method::DELETE, "/tokens/42", None).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["clientId"], "42");
    assert_eq!(body["deletedCount"], 1);
}

#[tokio::test]
async fn test_delete_unknown_identifier_is_not_an_http_error() {
    let h = harness();
    let (status, body) = call(app(&h), Method::DELETE, "/tokens/nobody", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("nobody"));
}

#[tokio::test]
async fn test_delete_without_identifier_clears_all() {
    let h = harness();
    h.lifecycle.issue("app1", None).await.unwrap();
    h.lifecycle.issue("app2", None).await.unwrap();

    let (status, body) = call(app(&h), Method::DELETE, "/tokens", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["deletedCount"], 2);
    assert_eq!(body["revokedCount"], 2);
    assert_eq!(h.registry.size().await, 0);
}

#[tokio::test]
async fn test_sweep_endpoint() {
    let h = harness();
    h.lifecycle.issue("app1", None).await.unwrap();
    h.clock.advance(chrono::Duration::minutes(6));

    let (_, body) = call(app(&h), Method::POST, "/sweep", None).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["removedCount"], 1);
    assert_eq!(body["revokedCount"], 1);

    let (_, body) = call(app(&h), Method::POST, "/sweep", None).await;
    assert_eq!(body["removedCount"], 0);
}

#[tokio::test]
async fn test_rate_limit_endpoint() {
    let h = harness();
    let (status, body) = call(app(&h), Method::GET, "/rate-limit", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["rateLimit"]["limit"], 5000);
    assert_eq!(body["rateLimit"]["remaining"], 4990);
}

#[tokio::test]
async fn test_responses_carry_request_id_and_no_store() {
    let h = harness();
    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let resp = app(&h).oneshot(req).await.unwrap();
    assert!(resp.headers().contains_key("x-request-id"));
    assert_eq!(resp.headers()["cache-control"], "no-store");
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let h = harness();
    let (status, _) = call(app(&h), Method::GET, "/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
