use std::fmt::Display;

use chrono::{DateTime, Utc};
use payment_relay_engine::db_types::TimeWindow;
use relay_common::Cents;
use serde::{Deserialize, Serialize};

use crate::errors::ServerError;

/// The body of `POST /payments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSubmission {
    pub correlation_id: String,
    pub amount: Cents,
}

impl PaymentSubmission {
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.correlation_id.trim().is_empty() {
            return Err(ServerError::InvalidRequestBody("correlationId must not be empty".into()));
        }
        if !self.amount.is_positive() {
            return Err(ServerError::InvalidRequestBody(format!("amount must be positive, not {}", self.amount)));
        }
        Ok(())
    }
}

/// The query string of `GET /payments-summary`. Empty values count as missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryParams {
    pub from: Option<String>,
    pub to: Option<String>,
}

impl Display for SummaryParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let from = self.from.as_deref().unwrap_or("*");
        let to = self.to.as_deref().unwrap_or("*");
        write!(f, "{from} .. {to}")
    }
}

impl SummaryParams {
    /// The window to summarize, or `None` for everything. `from` and `to` must be given together.
    pub fn window(&self) -> Result<Option<TimeWindow>, ServerError> {
        let from = self.from.as_deref().filter(|s| !s.trim().is_empty());
        let to = self.to.as_deref().filter(|s| !s.trim().is_empty());
        match (from, to) {
            (None, None) => Ok(None),
            (Some(from), Some(to)) => {
                let window = TimeWindow::new(parse_timestamp("from", from)?, parse_timestamp("to", to)?)
                    .map_err(|e| ServerError::InvalidQuery(e.to_string()))?;
                Ok(Some(window))
            },
            _ => Err(ServerError::InvalidQuery("from and to must be supplied together".into())),
        }
    }
}

fn parse_timestamp(name: &str, value: &str) -> Result<DateTime<Utc>, ServerError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| ServerError::InvalidQuery(format!("{name} is not an RFC3339 timestamp ({value}). {e}")))
}
