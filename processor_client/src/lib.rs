//! # Processor client
//!
//! A small HTTP client for the two external payment processors the relay forwards payments to. Both processors expose
//! the same API:
//! * `POST /payments` accepts `{correlationId, amount, requestedAt}`.
//! * `GET /payments/service-health` reports `{failing, minResponseTime}`.
//!
//! The client performs no bookkeeping of its own. Every call carries its own deadline, and payment responses are
//! classified into a [`PaymentOutcome`] so that callers can decide whether to retry, re-route or give up.
mod api;
mod config;
mod data_objects;
mod error;

pub use api::ProcessorApi;
pub use config::{ProcessorConfig, DEFAULT_HEALTH_TIMEOUT, DEFAULT_PAYMENT_TIMEOUT};
pub use data_objects::{PaymentOutcome, PaymentRequest, ServiceHealth};
pub use error::ProcessorApiError;
