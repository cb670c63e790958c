#![allow(clippy::unwrap_used)]

use super::*;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

use crate::db::{Database, DbPool};
use crate::models::{CounterKind, OrderLimit, SpendLimit, TypeLimit};

const BUSY: Duration = Duration::from_secs(5);

fn setup() -> (TempDir, Router) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("limits.db");

    let db = Database::open(&path, BUSY).unwrap();
    let mut limit = SpendLimit::new("CREDIT".into(), "5812".into(), dec!(1000));
    limit.hour_count = 10;
    db.upsert_spend_limit(&limit).unwrap();
    db.insert_type_limit(&TypeLimit::new("PIX".into(), "TRANSFER".into()))
        .unwrap();
    db.insert_order_limit(&OrderLimit::new(
        "PIX".into(),
        "CHANNEL:MOBILE".into(),
        CounterKind::Value,
        dec!(500),
    ))
    .unwrap();

    let pool = DbPool::open(&path, 2, BUSY).unwrap();
    let engine = LimitEngine::new(pool, Duration::from_secs(5));
    let info = AppInfo {
        app_name: "limitguard".into(),
        version: "1.2.3".into(),
        pod_name: "pod-a".into(),
        env: "test".into(),
        port: 5000,
    };
    (dir, router(AppState::new(engine, info)))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-request-id", "req-42")
        .body(Body::from(body.to_string()))
        .unwrap()
}

// ── Service info ──────────────────────────────────────────────

#[tokio::test]
async fn test_health_and_live() {
    let (_dir, app) = setup();
    let (status, body) = send(app.clone(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "true" }));

    let (status, body) = send(app, get("/live")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "true" }));
}

#[tokio::test]
async fn test_info_on_root_and_info() {
    let (_dir, app) = setup();
    for uri in ["/", "/info"] {
        let (status, body) = send(app.clone(), get(uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["version"], "1.2.3");
        assert_eq!(body["pod_name"], "pod-a");
    }
}

#[tokio::test]
async fn test_header_echo() {
    let (_dir, app) = setup();
    let request = Request::builder()
        .uri("/header")
        .header("x-tenant", "acme")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["x-tenant"], "acme");
}

#[tokio::test]
async fn test_context_carries_request_id() {
    let (_dir, app) = setup();
    let request = Request::builder()
        .uri("/context")
        .header("x-request-id", "abc-123")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["trace_id"], "abc-123");
    assert_eq!(body["method"], "GET");
    assert_eq!(body["path"], "/context");
    assert_eq!(body["timeout_secs"], 5);
}

#[tokio::test]
async fn test_stat_reports_pool() {
    let (_dir, app) = setup();
    let (status, body) = send(app, get("/stat")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["max_size"], 2);
}

// ── Evaluation ────────────────────────────────────────────────

#[tokio::test]
async fn test_check_limit_transaction() {
    let (_dir, app) = setup();
    let payload = r#"{"transaction_id":"tx-1","key":"CPF:1","type_limit":"PIX",
                      "order_limit":"CHANNEL:MOBILE","counter_limit":"VALUE",
                      "amount":100.5,"quantity":1}"#;
    let (status, body) = send(app, post_json("/checkLimitTransaction", payload)).await;
    assert_eq!(status, StatusCode::OK);
    let verdicts = body.as_array().unwrap();
    assert_eq!(verdicts.len(), 1);
    assert_eq!(verdicts[0]["status"], "LIMIT:VALUE:APPROVED");
    assert_eq!(verdicts[0]["counter_limit"], "VALUE");
    assert_eq!(verdicts[0]["amount"], 100.5);
}

#[tokio::test]
async fn test_check_limit_unknown_type_is_404() {
    let (_dir, app) = setup();
    let payload = r#"{"transaction_id":"tx-1","key":"CPF:1","type_limit":"TED","order_limit":"X"}"#;
    let (status, body) = send(app, post_json("/checkLimitTransaction", payload)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
    assert_eq!(body["trace_id"], "req-42");
    assert!(body["error"].as_str().unwrap().contains("TED"));
}

#[tokio::test]
async fn test_malformed_body_is_400() {
    let (_dir, app) = setup();
    let (status, body) = send(app, post_json("/checkLimitTransaction", "{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
    assert_eq!(body["trace_id"], "req-42");
}

#[tokio::test]
async fn test_missing_content_type_is_400_with_generated_trace_id() {
    let (_dir, app) = setup();
    let request = Request::builder()
        .method("POST")
        .uri("/transactionLimit")
        .body(Body::from("{}"))
        .unwrap();
    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["trace_id"].as_str().unwrap().len(), 36);
}

#[tokio::test]
async fn test_transaction_limit_returns_window_sums() {
    let (_dir, app) = setup();
    let payload = r#"{"category":"CREDIT","card_number":"4111","transaction_id":"tx-9",
                      "mcc":"5812","currency":"BRL","amount":950.0,"tenant_id":"t1"}"#;
    let (status, body) = send(app.clone(), post_json("/transactionLimit", payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "REQUESTED");
    assert_eq!(body["transaction_sum_amount"], 950.0);
    assert_eq!(body["transaction_sum_count"], 1);

    let (status, body) = send(app, post_json("/transactionLimit", payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "BREACH_LIMIT:CREDIT");
    assert_eq!(body["transaction_sum_amount"], 1900.0);
}

#[tokio::test]
async fn test_transaction_limit_without_spend_limit_is_404() {
    let (_dir, app) = setup();
    let payload = r#"{"category":"DEBIT","card_number":"4111","transaction_id":"tx-9","mcc":"5812","amount":1}"#;
    let (status, body) = send(app, post_json("/transactionLimit", payload)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
}

#[tokio::test]
async fn test_storage_failure_is_500_with_error_body() {
    let (dir, app) = setup();
    let db = Database::open(&dir.path().join("limits.db"), BUSY).unwrap();
    db.connection()
        .execute_batch("DROP TABLE limit_transaction;")
        .unwrap();

    let payload = r#"{"transaction_id":"tx-1","key":"CPF:1","type_limit":"PIX",
                      "order_limit":"CHANNEL:MOBILE","amount":10,"quantity":1}"#;
    let (status, body) = send(app, post_json("/checkLimitTransaction", payload)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], 500);
    assert_eq!(body["trace_id"], "req-42");
    assert!(!body["error"].as_str().unwrap().is_empty());
}
