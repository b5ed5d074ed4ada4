//! The worker pool that drains the task queue.
//!
//! Every worker runs the same loop: claim the job at the head of the queue, deliver it to whichever processor the
//! [`crate::DecisionEngine`] picks, and record the settlement. Failed deliveries mark the processor as failing (so the
//! next attempt is steered to the other one), and jobs that cannot be finished right now go back to the head of the
//! queue.
mod pool;
mod worker;

use std::{sync::Arc, time::Duration};

pub use pool::WorkerPool;

use crate::{
    decision::DecisionEngine,
    gateway::{ProcessorGateway, Processors},
    health::registry::HealthRegistry,
    TaskQueue,
    TransactionLedger,
};

pub const DEFAULT_WORKER_COUNT: usize = 10;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;
pub const DEFAULT_QUEUE_BACKOFF: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerConfig {
    pub workers: usize,
    /// Delivery attempts per dequeue before the payment is put back on the queue.
    pub max_attempts: u32,
    /// How long a worker pauses after a storage failure before touching the queue again.
    pub queue_backoff: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { workers: DEFAULT_WORKER_COUNT, max_attempts: DEFAULT_MAX_ATTEMPTS, queue_backoff: DEFAULT_QUEUE_BACKOFF }
    }
}

/// Everything a worker needs. All of it is shared between workers.
pub struct WorkerContext<G, Q, L> {
    pub processors: Arc<Processors<G>>,
    pub registry: Arc<HealthRegistry>,
    pub decision: DecisionEngine,
    pub queue: Arc<Q>,
    pub ledger: Arc<L>,
}

impl<G, Q, L> WorkerContext<G, Q, L>
where
    G: ProcessorGateway,
    Q: TaskQueue,
    L: TransactionLedger,
{
    /// Builds a context whose decision engine reads from `registry`.
    pub fn new(
        processors: Arc<Processors<G>>,
        registry: Arc<HealthRegistry>,
        decision_config: crate::DecisionConfig,
        queue: Arc<Q>,
        ledger: Arc<L>,
    ) -> Self {
        let decision = DecisionEngine::new(Arc::clone(&registry), decision_config);
        Self { processors, registry, decision, queue, ledger }
    }
}

impl<G, Q, L> Clone for WorkerContext<G, Q, L> {
    fn clone(&self) -> Self {
        Self {
            processors: Arc::clone(&self.processors),
            registry: Arc::clone(&self.registry),
            decision: self.decision.clone(),
            queue: Arc::clone(&self.queue),
            ledger: Arc::clone(&self.ledger),
        }
    }
}
