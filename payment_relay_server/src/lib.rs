//! # Payment relay server
//! This crate hosts the HTTP front end of the payment relay. It is responsible for:
//! * Accepting payment submissions and queueing them for delivery.
//! * Serving per-processor totals from the transaction ledger.
//! * Wiring up storage, the processor health checker and the delivery workers, and tearing them down in order.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `POST /payments`: Queue a payment.
//! * `GET /payments-summary`: Totals per processor, optionally within a `from`/`to` window.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
