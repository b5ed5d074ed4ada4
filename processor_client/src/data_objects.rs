use std::fmt::Display;

use chrono::{DateTime, SecondsFormat, Utc};
use relay_common::Cents;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize, Serializer};

/// The body of `POST /payments` on a processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub correlation_id: String,
    pub amount: Cents,
    #[serde(serialize_with = "rfc3339_millis")]
    pub requested_at: DateTime<Utc>,
}

fn rfc3339_millis<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// The body of `GET /payments/service-health` on a processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealth {
    pub failing: bool,
    /// The minimum response time of the payments endpoint, in milliseconds.
    pub min_response_time: u64,
}

/// How a processor answered a payment request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// The processor accepted the payment (2xx).
    Settled,
    /// A transient failure: 5xx, timeout or a transport error. Safe to try again, possibly on the other processor.
    Retryable(String),
    /// Any other response. The payment will never succeed on this processor as submitted.
    Rejected { status: u16, message: String },
}

impl PaymentOutcome {
    pub fn from_status(status: StatusCode, message: String) -> Self {
        if status.is_success() {
            Self::Settled
        } else if status.is_server_error() {
            Self::Retryable(format!("processor answered {status}. {message}"))
        } else {
            Self::Rejected { status: status.as_u16(), message }
        }
    }
}

impl Display for PaymentOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Settled => write!(f, "settled"),
            Self::Retryable(reason) => write!(f, "retryable ({reason})"),
            Self::Rejected { status, message } => write!(f, "rejected ({status}: {message})"),
        }
    }
}
