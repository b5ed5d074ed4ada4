//! Drives the routes against a real engine: in-memory storage, scripted processors and a running worker pool.
use std::{sync::Arc, time::Duration};

use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web, App};
use payment_relay_engine::{
    db_types::ProcessorId,
    test_utils::scripted_gateway::ScriptedGateway,
    DecisionConfig,
    HealthRegistry,
    MemoryLedger,
    MemoryQueue,
    PaymentRelayApi,
    Processors,
    WorkerConfig,
    WorkerContext,
    WorkerPool,
};
use serde_json::json;

use crate::routes::{health, json_config, query_config, PaymentsRoute, PaymentsSummaryRoute};

#[actix_web::test]
async fn submitted_payments_show_up_in_the_summary() {
    let _ = env_logger::try_init();
    let default = ScriptedGateway::new();
    default.set_delay(Duration::from_millis(20));
    let fallback = ScriptedGateway::new();
    let processors = Arc::new(Processors::new(default.clone(), fallback.clone()));
    let registry = Arc::new(HealthRegistry::default());
    let ledger = Arc::new(MemoryLedger::new());
    let queue = Arc::new(MemoryQueue::new());
    let context =
        WorkerContext::new(processors, registry.clone(), DecisionConfig::default(), queue.clone(), ledger.clone());
    let pool = WorkerPool::start(WorkerConfig { workers: 2, ..Default::default() }, context).await.unwrap();

    let api = PaymentRelayApi::new(ledger.clone(), queue.clone());
    let app = App::new()
        .app_data(web::Data::new(api))
        .app_data(json_config())
        .app_data(query_config())
        .service(health)
        .service(PaymentsRoute::<MemoryLedger, MemoryQueue>::new())
        .service(PaymentsSummaryRoute::<MemoryLedger, MemoryQueue>::new());
    let service = test::init_service(app).await;

    for (i, amount) in [10.0, 20.5, 5.25].into_iter().enumerate() {
        let req = TestRequest::post()
            .uri("/payments")
            .set_json(json!({"correlationId": format!("flow-{i}"), "amount": amount}))
            .to_request();
        let res = test::call_service(&service, req).await;
        assert_eq!(res.status(), StatusCode::OK);
    }
    for _ in 0..100 {
        if ledger.len() == 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(ledger.len(), 3);
    registry.set(ProcessorId::Default, true, 0);
    let req = TestRequest::post()
        .uri("/payments")
        .set_json(json!({"correlationId": "flow-fallback", "amount": 1.0}))
        .to_request();
    assert_eq!(test::call_service(&service, req).await.status(), StatusCode::OK);

    let mut summary = serde_json::Value::Null;
    for _ in 0..100 {
        let req = TestRequest::get().uri("/payments-summary").to_request();
        let res = test::call_service(&service, req).await;
        let body = res.into_body().try_into_bytes().unwrap();
        summary = serde_json::from_slice(&body).unwrap();
        let total = summary["default"]["totalRequests"].as_u64().unwrap_or_default() +
            summary["fallback"]["totalRequests"].as_u64().unwrap_or_default();
        if total == 4 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(
        summary,
        json!({
            "default": {"totalRequests": 3, "totalAmount": 35.75},
            "fallback": {"totalRequests": 1, "totalAmount": 1.0}
        })
    );
    assert_eq!(pool.shutdown().await.unwrap(), 0);
    assert_eq!(fallback.submissions(), vec!["flow-fallback"]);
}
