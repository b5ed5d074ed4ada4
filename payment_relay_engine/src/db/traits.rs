use async_trait::async_trait;
use thiserror::Error;

use crate::db_types::{Job, PaymentTask, PaymentsSummary, QueuedJob, Receipt, RecordResult, SettledTransaction, TimeWindow};

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("The ledger storage failed. {0}")]
    StorageFailure(String),
}

#[derive(Debug, Clone, Error)]
pub enum QueueError {
    #[error("The task queue storage failed. {0}")]
    StorageFailure(String),
    #[error("Queue entry {0} could not be decoded. {1}")]
    CorruptEntry(i64, String),
}

/// The append-only record of settled payments.
///
/// Implementations must be safe to call from many workers concurrently.
#[async_trait]
pub trait TransactionLedger: Send + Sync + 'static {
    /// Records a settled payment.
    ///
    /// This call is idempotent on `correlation_id`: recording the same payment twice leaves a single entry in the
    /// ledger and returns [`RecordResult::AlreadyRecorded`] the second time. Summaries therefore never double count a
    /// payment that was re-delivered after a crash.
    async fn record(&self, transaction: &SettledTransaction) -> Result<RecordResult, LedgerError>;

    /// Aggregates the ledger by processor. With a window, only transactions whose `requested_at` falls inside the
    /// (inclusive) window are counted.
    async fn summarize(&self, window: Option<TimeWindow>) -> Result<PaymentsSummary, LedgerError>;
}

/// An ordered buffer of pending jobs, shared by the submission path and every worker.
///
/// Fresh payments join the tail. Jobs that have already been attempted go back to the head, so that a task already in
/// flight is not starved by newer arrivals. A dequeued job keeps its slot (it is "claimed") until the worker either
/// acknowledges or requeues it; this is what lets a durable implementation recover work after a crash.
#[async_trait]
pub trait TaskQueue: Send + Sync + 'static {
    /// Appends a new payment at the tail of the queue.
    async fn enqueue(&self, task: PaymentTask) -> Result<(), QueueError>;

    /// Waits until a job is available and claims it.
    async fn dequeue(&self) -> Result<QueuedJob, QueueError>;

    /// Releases the claimed slot identified by `receipt`, replacing its content with `job` and moving it to the head
    /// of the queue.
    async fn requeue_front(&self, receipt: Receipt, job: Job) -> Result<(), QueueError>;

    /// Removes a claimed slot for good. Called once a job has been settled, or dropped permanently.
    async fn acknowledge(&self, receipt: Receipt) -> Result<(), QueueError>;

    /// The number of jobs waiting to be claimed.
    async fn pending(&self) -> Result<u64, QueueError>;

    /// Moves every claimed-but-unacknowledged slot back to the head of the queue and returns how many there were.
    ///
    /// Only call this when no worker is running, i.e. before the pool starts or after it has drained.
    async fn recover_in_flight(&self) -> Result<u64, QueueError>;
}
