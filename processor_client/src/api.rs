use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Url,
};

use crate::{
    config::ProcessorConfig,
    data_objects::{PaymentOutcome, PaymentRequest, ServiceHealth},
    ProcessorApiError,
};

#[derive(Clone)]
pub struct ProcessorApi {
    config: ProcessorConfig,
    client: Arc<Client>,
}

impl ProcessorApi {
    pub fn new(config: ProcessorConfig) -> Result<Self, ProcessorApiError> {
        Url::parse(&config.base_url)
            .map_err(|e| ProcessorApiError::Initialization(format!("Invalid processor URL {}. {e}", config.base_url)))?;
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ProcessorApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    /// Forward a payment to the processor.
    ///
    /// This call never returns an error. Transport failures and timeouts are reported as
    /// [`PaymentOutcome::Retryable`], since from the caller's point of view they mean the same thing as a 5xx: the
    /// payment may be attempted again.
    pub async fn submit_payment(&self, payment: &PaymentRequest) -> PaymentOutcome {
        let url = self.url("/payments");
        trace!("Submitting payment {} to {url}", payment.correlation_id);
        let response =
            self.client.post(url).timeout(self.config.payment_timeout).json(payment).send().await;
        let response = match response {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                let ms = self.config.payment_timeout.as_millis();
                debug!("Payment {} timed out after {ms} ms", payment.correlation_id);
                return PaymentOutcome::Retryable(ProcessorApiError::Timeout(ms).to_string());
            },
            Err(e) => {
                debug!("Payment {} could not be delivered. {e}", payment.correlation_id);
                return PaymentOutcome::Retryable(ProcessorApiError::RestResponseError(e.to_string()).to_string());
            },
        };
        let status = response.status();
        if status.is_success() {
            trace!("Payment {} accepted. {status}", payment.correlation_id);
            return PaymentOutcome::Settled;
        }
        let message = response.text().await.unwrap_or_default();
        PaymentOutcome::from_status(status, message)
    }

    /// Query the processor's health endpoint.
    ///
    /// Note that the processors rate-limit this endpoint; a 429 is returned as a [`ProcessorApiError::QueryError`]
    /// like any other non-success status.
    pub async fn service_health(&self) -> Result<ServiceHealth, ProcessorApiError> {
        let url = self.url("/payments/service-health");
        trace!("Checking processor health: {url}");
        let response = self.client.get(url).timeout(self.config.health_timeout).send().await.map_err(|e| {
            if e.is_timeout() {
                ProcessorApiError::Timeout(self.config.health_timeout.as_millis())
            } else {
                ProcessorApiError::RestResponseError(e.to_string())
            }
        })?;
        if response.status().is_success() {
            response.json::<ServiceHealth>().await.map_err(|e| ProcessorApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            Err(ProcessorApiError::QueryError { status, message })
        }
    }
}
