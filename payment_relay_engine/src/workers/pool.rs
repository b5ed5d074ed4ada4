use std::sync::Arc;

use futures_util::future::join_all;
use log::*;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    db_types::PaymentTask,
    gateway::ProcessorGateway,
    workers::{worker::Worker, WorkerConfig, WorkerContext},
    QueueError,
    TaskQueue,
    TransactionLedger,
};

/// A fixed set of workers draining a shared [`TaskQueue`].
pub struct WorkerPool<Q> {
    queue: Arc<Q>,
    cancel: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

impl<Q: TaskQueue> WorkerPool<Q> {
    /// Returns any work left claimed by a previous run to the queue, then spawns `config.workers` workers.
    pub async fn start<G, L>(config: WorkerConfig, context: WorkerContext<G, Q, L>) -> Result<Self, QueueError>
    where
        G: ProcessorGateway,
        L: TransactionLedger,
    {
        let recovered = context.queue.recover_in_flight().await?;
        if recovered > 0 {
            info!("👷️ Recovered {recovered} unfinished jobs from a previous run");
        }
        let cancel = CancellationToken::new();
        let workers = (0..config.workers.max(1))
            .map(|id| {
                let worker = Worker::new(id, config, context.clone(), cancel.child_token());
                tokio::spawn(worker.run())
            })
            .collect::<Vec<_>>();
        info!("👷️ Started {} payment workers", workers.len());
        Ok(Self { queue: context.queue, cancel, workers })
    }

    /// Queues a payment for delivery. Returns as soon as the task is stored.
    pub async fn submit(&self, task: PaymentTask) -> Result<(), QueueError> {
        self.queue.enqueue(task).await
    }

    /// Stops every worker once its current job is done, then returns whatever is still claimed to the queue.
    /// Returns the number of recovered jobs.
    pub async fn shutdown(self) -> Result<u64, QueueError> {
        info!("👷️ Stopping {} payment workers", self.workers.len());
        self.cancel.cancel();
        for result in join_all(self.workers).await {
            if let Err(e) = result {
                error!("👷️ A payment worker did not shut down cleanly. {e}");
            }
        }
        let recovered = self.queue.recover_in_flight().await?;
        info!("👷️ All payment workers have stopped. {recovered} unfinished jobs were returned to the queue");
        Ok(recovered)
    }
}
