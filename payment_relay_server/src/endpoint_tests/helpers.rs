use std::sync::Arc;

use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web, web::ServiceConfig, App};
use log::debug;
use payment_relay_engine::PaymentRelayApi;

use super::mocks::{MockLedger, MockQueue};
use crate::routes::{health, json_config, query_config, PaymentsRoute, PaymentsSummaryRoute};

pub fn configure(ledger: MockLedger, queue: MockQueue) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg: &mut ServiceConfig| {
        let api = PaymentRelayApi::new(Arc::new(ledger), Arc::new(queue));
        cfg.app_data(web::Data::new(api))
            .app_data(json_config())
            .app_data(query_config())
            .service(health)
            .service(PaymentsRoute::<MockLedger, MockQueue>::new())
            .service(PaymentsSummaryRoute::<MockLedger, MockQueue>::new());
    }
}

pub async fn send_request(req: TestRequest, configure: impl FnOnce(&mut ServiceConfig)) -> (StatusCode, String) {
    let _ = env_logger::try_init();
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    let res = test::call_service(&service, req.to_request()).await;
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    (status, body)
}

pub fn error_message(body: &str) -> String {
    let json: serde_json::Value = serde_json::from_str(body).expect("Error body was not JSON");
    json["error"].as_str().expect("Error body has no error field").to_string()
}
