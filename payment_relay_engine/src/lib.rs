//! Payment Relay Engine
//!
//! The engine accepts payment tasks, and settles each of them against one of two external payment processors, a
//! "default" processor and a cheaper-to-avoid "fallback" processor. Neither processor is reliable, so the engine:
//!
//! 1. Tracks the health of both processors in a shared [`HealthRegistry`], fed by a periodic health checker and by
//!    the workers themselves whenever a delivery fails.
//! 2. Routes every delivery attempt through the [`DecisionEngine`], which prefers the default processor whenever it is
//!    healthy and fast enough, and waits when both processors are down.
//! 3. Decouples submission from delivery with a durable [`TaskQueue`]. Submitting a payment only enqueues it, and a
//!    fixed [`WorkerPool`] drains the queue, retrying and re-routing failed deliveries.
//! 4. Records every settled payment exactly once in a [`TransactionLedger`], which also answers the per-processor
//!    summary queries.
//!
//! Storage is pluggable. SQLite ([`SqliteDatabase`]) is the durable backend; [`MemoryQueue`] and [`MemoryLedger`]
//! exist for tests and throwaway deployments.
mod db;

pub mod db_types;
pub mod decision;
pub mod gateway;
pub mod health;
mod relay_api;
pub mod workers;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use db::{
    memory::{MemoryLedger, MemoryQueue},
    traits::{LedgerError, QueueError, TaskQueue, TransactionLedger},
};
#[cfg(feature = "sqlite")]
pub use db::sqlite::{SqliteDatabase, SqliteDatabaseError};
pub use decision::{DecisionConfig, DecisionEngine};
pub use gateway::{HealthReport, ProcessorGateway, Processors};
pub use health::{checker::start_health_checker, registry::HealthRegistry};
pub use relay_api::PaymentRelayApi;
pub use workers::{WorkerConfig, WorkerContext, WorkerPool};
