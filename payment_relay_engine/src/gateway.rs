use async_trait::async_trait;
use log::*;
use processor_client::{PaymentOutcome, PaymentRequest, ProcessorApi, ServiceHealth};

use crate::db_types::{PaymentTask, ProcessorId};

/// The minimum response time reported for a processor whose health endpoint could not be read.
pub const UNREACHABLE_MIN_RESPONSE_TIME: u64 = 1_000;

/// The result of a health probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthReport {
    /// The processor answered its health endpoint.
    Reported(ServiceHealth),
    /// The probe itself failed (timeout, transport error, rate limiting or a garbled response).
    Unreachable(String),
}

impl HealthReport {
    /// The health to act on. An unreachable processor is assumed to be failing and slow.
    pub fn status(&self) -> ServiceHealth {
        match self {
            Self::Reported(health) => *health,
            Self::Unreachable(_) => ServiceHealth { failing: true, min_response_time: UNREACHABLE_MIN_RESPONSE_TIME },
        }
    }
}

/// Outbound access to a single payment processor.
///
/// Implementations have no side effects beyond the network call. Recording health and settlements is up to the caller.
#[async_trait]
pub trait ProcessorGateway: Send + Sync + 'static {
    async fn submit_payment(&self, task: &PaymentTask) -> PaymentOutcome;

    async fn check_health(&self) -> HealthReport;
}

#[async_trait]
impl ProcessorGateway for ProcessorApi {
    async fn submit_payment(&self, task: &PaymentTask) -> PaymentOutcome {
        let request = PaymentRequest::from(task);
        ProcessorApi::submit_payment(self, &request).await
    }

    async fn check_health(&self) -> HealthReport {
        match self.service_health().await {
            Ok(health) => HealthReport::Reported(health),
            Err(e) => {
                debug!("🩺️ Health probe against {} failed. {e}", self.config().base_url);
                HealthReport::Unreachable(e.to_string())
            },
        }
    }
}

/// The default and fallback gateways, addressable by [`ProcessorId`].
pub struct Processors<G> {
    default: G,
    fallback: G,
}

impl<G: ProcessorGateway> Processors<G> {
    pub fn new(default: G, fallback: G) -> Self {
        Self { default, fallback }
    }

    pub fn get(&self, processor: ProcessorId) -> &G {
        match processor {
            ProcessorId::Default => &self.default,
            ProcessorId::Fallback => &self.fallback,
        }
    }
}
