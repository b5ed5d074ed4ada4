use std::time::Duration;

pub const DEFAULT_PAYMENT_TIMEOUT: Duration = Duration::from_millis(300);
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_millis(300);

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// The base URL of the processor, e.g. "http://payment-processor-default:8080". A trailing slash is ignored.
    pub base_url: String,
    /// The deadline for a single `POST /payments` call, including reading the response.
    pub payment_timeout: Duration,
    /// The deadline for a single `GET /payments/service-health` call.
    pub health_timeout: Duration,
}

impl ProcessorConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            payment_timeout: DEFAULT_PAYMENT_TIMEOUT,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
        }
    }

    pub fn with_payment_timeout(mut self, timeout: Duration) -> Self {
        self.payment_timeout = timeout;
        self
    }

    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }
}
