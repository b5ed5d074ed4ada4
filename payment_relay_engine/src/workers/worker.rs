use log::*;
use processor_client::PaymentOutcome;
use tokio_util::sync::CancellationToken;

use crate::{
    db_types::{Job, PaymentTask, ProcessorId, QueuedJob, Receipt, RecordResult, SettledTransaction},
    gateway::ProcessorGateway,
    workers::{WorkerConfig, WorkerContext},
    TaskQueue,
    TransactionLedger,
};

pub(crate) struct Worker<G, Q, L> {
    id: usize,
    config: WorkerConfig,
    context: WorkerContext<G, Q, L>,
    cancel: CancellationToken,
}

impl<G, Q, L> Worker<G, Q, L>
where
    G: ProcessorGateway,
    Q: TaskQueue,
    L: TransactionLedger,
{
    pub fn new(id: usize, config: WorkerConfig, context: WorkerContext<G, Q, L>, cancel: CancellationToken) -> Self {
        Self { id, config, context, cancel }
    }

    /// Claims and processes jobs until cancelled. Cancellation is only observed between jobs and while waiting for a
    /// processor to recover; a delivery that is already underway always runs to completion.
    pub async fn run(self) {
        debug!("👷️ Worker {} started", self.id);
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                next = self.context.queue.dequeue() => next,
            };
            match next {
                Ok(QueuedJob { receipt, job }) => {
                    trace!("👷️ Worker {} picked up {} job {receipt}", self.id, job.kind());
                    match job {
                        Job::Payment(task) => self.deliver(receipt, task).await,
                        Job::Settle { task, processor } => self.settle(receipt, task, processor).await,
                    }
                },
                Err(e) => {
                    error!("👷️ Worker {} could not read from the task queue. {e}", self.id);
                    self.backoff().await;
                },
            }
        }
        debug!("👷️ Worker {} stopped", self.id);
    }

    async fn deliver(&self, receipt: Receipt, task: PaymentTask) {
        for attempt in 1..=self.config.max_attempts {
            let Some(processor) = self.context.decision.choose(&self.cancel).await else {
                debug!("👷️ Worker {} is shutting down. Returning payment {} to the queue", self.id, task.correlation_id);
                self.requeue(receipt, Job::Payment(task)).await;
                return;
            };
            match self.context.processors.get(processor).submit_payment(&task).await {
                PaymentOutcome::Settled => {
                    debug!("👷️ Payment {} settled by the {processor} processor", task.correlation_id);
                    return self.settle(receipt, task, processor).await;
                },
                PaymentOutcome::Retryable(reason) => {
                    debug!(
                        "👷️ Attempt {attempt} to deliver payment {} to the {processor} processor failed. {reason}",
                        task.correlation_id
                    );
                    self.context.registry.set_failing_with_ttl(processor);
                },
                PaymentOutcome::Rejected { status, message } => {
                    warn!(
                        "👷️ The {processor} processor rejected payment {} with status {status}. The payment is \
                         dropped. {message}",
                        task.correlation_id
                    );
                    self.context.registry.set_failing_with_ttl(processor);
                    self.acknowledge(receipt).await;
                    return;
                },
            }
        }
        debug!(
            "👷️ Payment {} could not be delivered after {} attempts. Returning it to the head of the queue",
            task.correlation_id, self.config.max_attempts
        );
        self.requeue(receipt, Job::Payment(task)).await;
    }

    async fn settle(&self, receipt: Receipt, task: PaymentTask, processor: ProcessorId) {
        let transaction = SettledTransaction::new(&task, processor);
        match self.context.ledger.record(&transaction).await {
            Ok(RecordResult::Inserted) => {
                trace!("👷️ Recorded payment {} against the {processor} processor", task.correlation_id);
                self.acknowledge(receipt).await;
            },
            Ok(RecordResult::AlreadyRecorded) => {
                info!("👷️ Payment {} was delivered more than once. It is only counted once", task.correlation_id);
                self.acknowledge(receipt).await;
            },
            Err(e) => {
                error!("👷️ Could not record settled payment {}. Will try again. {e}", task.correlation_id);
                self.requeue(receipt, Job::Settle { task, processor }).await;
                self.backoff().await;
            },
        }
    }

    /// Returns the job to the head of the queue, retrying until the queue accepts it. Once the pool is shutting down
    /// a failed attempt leaves the slot claimed, and the pool recovers it after the workers have stopped.
    async fn requeue(&self, receipt: Receipt, job: Job) {
        loop {
            match self.context.queue.requeue_front(receipt, job.clone()).await {
                Ok(()) => return,
                Err(e) if self.cancel.is_cancelled() => {
                    warn!("👷️ Could not return job {receipt} to the queue during shutdown. {e}");
                    return;
                },
                Err(e) => {
                    error!("👷️ Could not return job {receipt} to the queue. Will try again. {e}");
                    self.backoff().await;
                },
            }
        }
    }

    async fn acknowledge(&self, receipt: Receipt) {
        if let Err(e) = self.context.queue.acknowledge(receipt).await {
            error!("👷️ Could not acknowledge job {receipt}. {e}");
        }
    }

    async fn backoff(&self) {
        tokio::select! {
            _ = self.cancel.cancelled() => {},
            _ = tokio::time::sleep(self.config.queue_backoff) => {},
        }
    }
}
