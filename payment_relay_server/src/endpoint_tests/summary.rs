use actix_web::{http::StatusCode, test::TestRequest};
use chrono::{TimeZone, Utc};
use payment_relay_engine::{
    db_types::{PaymentsSummary, ProcessorId, TimeWindow},
    LedgerError,
};
use relay_common::Cents;
use serde_json::json;

use super::{
    helpers::{configure, error_message, send_request},
    mocks::{MockLedger, MockQueue},
};

fn get(uri: &str) -> TestRequest {
    TestRequest::get().uri(uri)
}

fn sample_summary() -> PaymentsSummary {
    let mut summary = PaymentsSummary::default();
    for cents in [1990, 1990, 1990] {
        summary.totals_mut(ProcessorId::Default).add(Cents::from(cents));
    }
    summary.totals_mut(ProcessorId::Fallback).add(Cents::from(1005));
    summary
}

fn idle_ledger() -> MockLedger {
    let mut ledger = MockLedger::new();
    ledger.expect_summarize().never();
    ledger
}

#[actix_web::test]
async fn unbounded_summary() {
    let mut ledger = MockLedger::new();
    ledger.expect_summarize().withf(|window| window.is_none()).times(1).returning(|_| Ok(sample_summary()));
    let (status, body) = send_request(get("/payments-summary"), configure(ledger, MockQueue::new())).await;
    assert_eq!(status, StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(
        body,
        json!({
            "default": {"totalRequests": 3, "totalAmount": 59.7},
            "fallback": {"totalRequests": 1, "totalAmount": 10.05}
        })
    );
}

#[actix_web::test]
async fn windowed_summary() {
    let from = Utc.with_ymd_and_hms(2025, 7, 15, 12, 0, 0).unwrap();
    let to = Utc.with_ymd_and_hms(2025, 7, 15, 12, 5, 0).unwrap();
    let expected = TimeWindow::new(from, to).unwrap();
    let mut ledger = MockLedger::new();
    ledger
        .expect_summarize()
        .withf(move |window| *window == Some(expected))
        .times(1)
        .returning(|_| Ok(PaymentsSummary::default()));
    let uri = "/payments-summary?from=2025-07-15T12:00:00.000Z&to=2025-07-15T12:05:00.000Z";
    let (status, body) = send_request(get(uri), configure(ledger, MockQueue::new())).await;
    assert_eq!(status, StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["default"]["totalRequests"], json!(0));
    assert_eq!(body["fallback"]["totalAmount"], json!(0.0));
}

#[actix_web::test]
async fn half_a_window() {
    let uri = "/payments-summary?from=2025-07-15T12:00:00.000Z";
    let (status, body) = send_request(get(uri), configure(idle_ledger(), MockQueue::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_message(&body).contains("supplied together"));
}

#[actix_web::test]
async fn unparsable_timestamp() {
    let uri = "/payments-summary?from=last%20tuesday&to=2025-07-15T12:05:00.000Z";
    let (status, body) = send_request(get(uri), configure(idle_ledger(), MockQueue::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_message(&body).contains("RFC3339"));
}

#[actix_web::test]
async fn reversed_window() {
    let uri = "/payments-summary?from=2025-07-15T12:05:00.000Z&to=2025-07-15T12:00:00.000Z";
    let (status, _) = send_request(get(uri), configure(idle_ledger(), MockQueue::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn storage_failure() {
    let mut ledger = MockLedger::new();
    ledger.expect_summarize().times(1).returning(|_| Err(LedgerError::StorageFailure("database is locked".into())));
    let (status, body) = send_request(get("/payments-summary"), configure(ledger, MockQueue::new())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(error_message(&body).contains("database is locked"));
}

#[actix_web::test]
async fn wrong_method() {
    let req = TestRequest::post().uri("/payments-summary");
    let (status, _) = send_request(req, configure(idle_ledger(), MockQueue::new())).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}
