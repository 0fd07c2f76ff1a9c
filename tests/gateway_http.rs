//! HTTP-level tests: the full router driven with `tower::ServiceExt::oneshot`

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use momo_rails::backend::{Backend, memory::MemoryBackend};
use momo_rails::config::AppConfig;
use momo_rails::gateway::{build_router, state::AppState};

const CONFIG: &str = r#"
log_level: info
log_dir: ./logs
log_file: test.log
use_json: false
rotation: never
gateway:
  host: 127.0.0.1
  port: 0
"#;

fn config() -> AppConfig {
    AppConfig::from_yaml(CONFIG).unwrap()
}

fn app(backend: &Arc<MemoryBackend>) -> Router {
    let state = AppState::new(Some(Backend::memory(backend.clone())), &config());
    build_router(Arc::new(state))
}

fn unconfigured_app() -> Router {
    build_router(Arc::new(AppState::new(None, &config())))
}

async fn send(app: Router, method: &str, uri: &str, body: Option<String>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    let request = builder
        .body(body.map(Body::from).unwrap_or_else(Body::empty))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn decimal(v: &Value) -> Decimal {
    Decimal::from_str(v.as_str().unwrap()).unwrap()
}

// ============================================================================
// /process-bill-payment
// ============================================================================

#[tokio::test]
async fn http_bill_payment_success() {
    let backend = Arc::new(MemoryBackend::new());
    let user = backend.add_account("+237650000001", dec!(20000));

    let body = json!({"user_id": user, "amount": 10000, "bill_type": "electricity"});
    let (status, json) = send(
        app(&backend),
        "POST",
        "/process-bill-payment",
        Some(body.to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(decimal(&json["amount"]), dec!(10150));
    assert_eq!(decimal(&json["new_balance"]), dec!(9850));
    assert_eq!(backend.balance_of(user), Some(dec!(9850)));
}

#[tokio::test]
async fn http_bill_payment_method_not_allowed() {
    let backend = Arc::new(MemoryBackend::new());
    let (status, json) = send(app(&backend), "GET", "/process-bill-payment", None).await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "Method not allowed");
}

#[tokio::test]
async fn http_bill_payment_missing_fields() {
    let backend = Arc::new(MemoryBackend::new());
    let (status, json) = send(
        app(&backend),
        "POST",
        "/process-bill-payment",
        Some(json!({"bill_type": "water"}).to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Missing required fields: user_id and amount");
    assert_eq!(backend.adjust_calls(), 0);
}

#[tokio::test]
async fn http_bill_payment_malformed_json() {
    let backend = Arc::new(MemoryBackend::new());
    let (status, json) = send(
        app(&backend),
        "POST",
        "/process-bill-payment",
        Some("{not json".to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn http_bill_payment_sub_cent_amount() {
    let backend = Arc::new(MemoryBackend::new());
    let user = backend.add_account("+237650000001", dec!(20000));

    let body = r#"{"user_id":"USER","amount":10000.125,"bill_type":"electricity"}"#
        .replace("USER", &user.to_string());
    let (status, json) = send(app(&backend), "POST", "/process-bill-payment", Some(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(backend.adjust_calls(), 0);
}

#[tokio::test]
async fn http_bill_payment_unknown_bill() {
    let backend = Arc::new(MemoryBackend::new());
    let user = backend.add_account("+237650000001", dec!(20000));

    let body = json!({"user_id": user, "amount": "10000", "bill_id": Uuid::new_v4()});
    let (status, json) = send(
        app(&backend),
        "POST",
        "/process-bill-payment",
        Some(body.to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "Bill not found");
}

#[tokio::test]
async fn http_bill_payment_insufficient_balance() {
    let backend = Arc::new(MemoryBackend::new());
    let user = backend.add_account("+237650000001", dec!(10000));

    let body = json!({"user_id": user, "amount": 10000, "bill_type": "electricity"});
    let (status, json) = send(
        app(&backend),
        "POST",
        "/process-bill-payment",
        Some(body.to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(backend.balance_of(user), Some(dec!(10000)));
}

#[tokio::test]
async fn http_bill_payment_without_backend() {
    let body = json!({"user_id": Uuid::new_v4(), "amount": 100, "bill_type": "water"});
    let (status, json) = send(
        unconfigured_app(),
        "POST",
        "/process-bill-payment",
        Some(body.to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["message"], "Server configuration error");
}

// ============================================================================
// /api/v1
// ============================================================================

#[tokio::test]
async fn http_health() {
    let backend = Arc::new(MemoryBackend::new());
    let (status, json) = send(app(&backend), "GET", "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["code"], 0);
    assert_eq!(json["data"]["backend"], "memory");

    let (status, json) = send(unconfigured_app(), "GET", "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["msg"], "unavailable");
}

#[tokio::test]
async fn http_fee_quote() {
    let backend = Arc::new(MemoryBackend::new());
    let (status, json) = send(
        app(&backend),
        "GET",
        "/api/v1/fees/quote?amount=1000&sender_country=CM&recipient_country=CM",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&json["data"]["fee"]), dec!(15));
    assert_eq!(decimal(&json["data"]["total"]), dec!(1015));

    let (status, json) = send(
        app(&backend),
        "GET",
        "/api/v1/fees/quote?amount=.5&sender_country=CM",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], 1001);

    // Largest representable amount: rejected, not a crash
    let (status, json) = send(
        app(&backend),
        "GET",
        "/api/v1/fees/quote?amount=79228162514264337593543950335&sender_country=CM",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], 1001);
}

#[tokio::test]
async fn http_transfer_and_lookup() {
    let backend = Arc::new(MemoryBackend::new());
    let sender = backend.add_account("+237650000001", dec!(10000));
    let recipient = backend.add_account("+237677123456", dec!(0));

    let body = json!({
        "sender_id": sender,
        "sender_country": "CM",
        "recipient": "677123456",
        "amount": "1000",
    });
    let (status, json) = send(
        app(&backend),
        "POST",
        "/api/v1/transfers",
        Some(body.to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["state"], "COMPLETED");
    assert_eq!(json["data"]["status"], "completed");
    assert_eq!(json["data"]["match_rule"], "last9");
    assert_eq!(backend.balance_of(recipient), Some(dec!(1000)));

    let id = json["data"]["transfer_id"].as_str().unwrap().to_string();
    let (status, json) = send(
        app(&backend),
        "GET",
        &format!("/api/v1/transfers/{}", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["state"], "COMPLETED");

    let (status, json) = send(app(&backend), "GET", "/api/v1/transfers/nope", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], 1001);
}

#[tokio::test]
async fn http_transfer_insufficient_funds() {
    let backend = Arc::new(MemoryBackend::new());
    let sender = backend.add_account("+237650000001", dec!(100));

    let body = json!({
        "sender_id": sender,
        "sender_country": "CM",
        "recipient": "677123456",
        "amount": "1000",
    });
    let (status, json) = send(
        app(&backend),
        "POST",
        "/api/v1/transfers",
        Some(body.to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["code"], 1002);
    assert_eq!(json["reason"], "INSUFFICIENT_FUNDS");
    assert_eq!(backend.adjust_calls(), 0);
}

#[tokio::test]
async fn http_claim_redeem_once() {
    let backend = Arc::new(MemoryBackend::new());
    let sender = backend.add_account("+237650000001", dec!(10000));

    let body = json!({
        "sender_id": sender,
        "sender_country": "CM",
        "recipient": "+237699000111",
        "amount": "1000",
    });
    let (_, json) = send(
        app(&backend),
        "POST",
        "/api/v1/transfers",
        Some(body.to_string()),
    )
    .await;
    assert_eq!(json["data"]["state"], "PENDING_CLAIM");
    let code = json["data"]["claim_code"].as_str().unwrap().to_string();

    let claimant = backend.add_account("+237699000111", dec!(0));
    let redeem = json!({
        "claimant_id": claimant,
        "claimant_phone": "699000111",
        "claim_code": code,
    });
    let (status, json) = send(
        app(&backend),
        "POST",
        "/api/v1/claims/redeem",
        Some(redeem.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "completed");
    assert_eq!(backend.balance_of(claimant), Some(dec!(1000)));

    let (status, json) = send(
        app(&backend),
        "POST",
        "/api/v1/claims/redeem",
        Some(redeem.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["reason"], "CLAIM_NOT_PENDING");
    assert_eq!(backend.balance_of(claimant), Some(dec!(1000)));
}

#[tokio::test]
async fn http_transfer_without_backend() {
    let body = json!({
        "sender_id": Uuid::new_v4(),
        "sender_country": "CM",
        "recipient": "677123456",
        "amount": "1000",
    });
    let (status, json) = send(
        unconfigured_app(),
        "POST",
        "/api/v1/transfers",
        Some(body.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["code"], 5001);
}
