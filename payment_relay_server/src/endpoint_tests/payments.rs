use actix_web::{http::StatusCode, test::TestRequest};
use payment_relay_engine::QueueError;
use relay_common::Cents;
use serde_json::json;

use super::{
    helpers::{configure, error_message, send_request},
    mocks::{MockLedger, MockQueue},
};

fn post(body: serde_json::Value) -> TestRequest {
    TestRequest::post().uri("/payments").set_json(body)
}

fn rejecting_queue() -> MockQueue {
    let mut queue = MockQueue::new();
    queue.expect_enqueue().never();
    queue
}

#[actix_web::test]
async fn payment_is_queued() {
    let mut queue = MockQueue::new();
    queue
        .expect_enqueue()
        .withf(|task| task.correlation_id == "4a7c0f52-1f0e-4c5e-9d55-2b0a6a3f4c11" && task.amount == Cents::from(1990))
        .times(1)
        .returning(|_| Ok(()));
    let body = json!({"correlationId": "4a7c0f52-1f0e-4c5e-9d55-2b0a6a3f4c11", "amount": 19.90});
    let (status, body) = send_request(post(body), configure(MockLedger::new(), queue)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
}

#[actix_web::test]
async fn malformed_body() {
    let req = TestRequest::post()
        .uri("/payments")
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{\"correlationId\": \"abc\", \"amount\": ");
    let (status, body) = send_request(req, configure(MockLedger::new(), rejecting_queue())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_message(&body).starts_with("Could not read request body"));
}

#[actix_web::test]
async fn amount_must_be_a_number() {
    let body = json!({"correlationId": "abc", "amount": "19.90"});
    let (status, _) = send_request(post(body), configure(MockLedger::new(), rejecting_queue())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn empty_correlation_id() {
    let body = json!({"correlationId": "", "amount": 10.0});
    let (status, body) = send_request(post(body), configure(MockLedger::new(), rejecting_queue())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_message(&body), "Could not read request body: correlationId must not be empty");
}

#[actix_web::test]
async fn non_positive_amounts() {
    for amount in [0.0, -5.5, 0.004] {
        let body = json!({"correlationId": "abc", "amount": amount});
        let (status, _) = send_request(post(body), configure(MockLedger::new(), rejecting_queue())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "amount {amount} was accepted");
    }
}

#[actix_web::test]
async fn queue_failure() {
    let mut queue = MockQueue::new();
    queue.expect_enqueue().times(1).returning(|_| Err(QueueError::StorageFailure("disk I/O error".into())));
    let body = json!({"correlationId": "abc", "amount": 10.0});
    let (status, body) = send_request(post(body), configure(MockLedger::new(), queue)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(error_message(&body).contains("disk I/O error"));
}

#[actix_web::test]
async fn wrong_method() {
    let req = TestRequest::get().uri("/payments");
    let (status, body) = send_request(req, configure(MockLedger::new(), rejecting_queue())).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(error_message(&body), "Method not allowed");
}

#[actix_web::test]
async fn health() {
    let req = TestRequest::get().uri("/health");
    let (status, body) = send_request(req, configure(MockLedger::new(), MockQueue::new())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}
