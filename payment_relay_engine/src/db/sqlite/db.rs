use std::{fmt::Debug, sync::Arc, time::Duration};

use async_trait::async_trait;
use log::*;
use sqlx::{migrate, SqlitePool};
use tokio::sync::Notify;

use super::{ledger, new_pool, queue, SqliteDatabaseError};
use crate::{
    db::traits::{LedgerError, QueueError, TaskQueue, TransactionLedger},
    db_types::{Job, PaymentTask, PaymentsSummary, QueuedJob, Receipt, RecordResult, SettledTransaction, TimeWindow},
};

/// How long an idle `dequeue` waits before looking at the table again, in case rows were added by another process.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// SQLite storage for both the task queue and the transaction ledger.
///
/// The queue lives in the database, so payments that were accepted but not yet settled survive a restart. Call
/// [`TaskQueue::recover_in_flight`] on startup to return jobs that were being processed when the process died.
#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
    notify: Arc<Notify>,
    poll_interval: Duration,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Connects to the database at `url`, creating the file if necessary, and brings the schema up to date.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let pool = new_pool(url, max_connections).await?;
        migrate!("./src/db/sqlite/migrations").run(&pool).await?;
        debug!("🗃️ Database {url} is ready");
        Ok(Self { url: url.to_string(), pool, notify: Arc::new(Notify::new()), poll_interval: DEFAULT_POLL_INTERVAL })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }
}

#[async_trait]
impl TransactionLedger for SqliteDatabase {
    async fn record(&self, transaction: &SettledTransaction) -> Result<RecordResult, LedgerError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        let result = ledger::idempotent_insert(transaction, &mut conn).await?;
        match result {
            RecordResult::Inserted => {
                trace!("🗃️ Payment {} recorded against {}", transaction.correlation_id, transaction.processor)
            },
            RecordResult::AlreadyRecorded => {
                debug!("🗃️ Payment {} was already in the ledger", transaction.correlation_id)
            },
        }
        Ok(result)
    }

    async fn summarize(&self, window: Option<TimeWindow>) -> Result<PaymentsSummary, LedgerError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        let summary = ledger::summarize(window, &mut conn).await?;
        Ok(summary)
    }
}

#[async_trait]
impl TaskQueue for SqliteDatabase {
    async fn enqueue(&self, task: PaymentTask) -> Result<(), QueueError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        let id = queue::push_back(&Job::Payment(task), &mut conn).await?;
        trace!("📮️ Payment enqueued as #{id}");
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue(&self) -> Result<QueuedJob, QueueError> {
        loop {
            let claimed = {
                let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
                queue::claim_head(&mut conn).await?
            };
            if let Some(row) = claimed {
                let queued = QueuedJob::try_from(row)?;
                trace!("📮️ Claimed {} job {}", queued.job.kind(), queued.receipt);
                return Ok(queued);
            }
            let _ = tokio::time::timeout(self.poll_interval, self.notify.notified()).await;
        }
    }

    async fn requeue_front(&self, receipt: Receipt, job: Job) -> Result<(), QueueError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        if !queue::move_to_front(receipt, &job, &mut conn).await? {
            warn!("📮️ Queue slot {receipt} has disappeared. Re-inserting the {} job at the head", job.kind());
            queue::push_front(&job, &mut conn).await?;
        }
        self.notify.notify_one();
        Ok(())
    }

    async fn acknowledge(&self, receipt: Receipt) -> Result<(), QueueError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        if !queue::delete(receipt, &mut conn).await? {
            warn!("📮️ Queue slot {receipt} was acknowledged, but it no longer exists");
        }
        Ok(())
    }

    async fn pending(&self) -> Result<u64, QueueError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(queue::count_unclaimed(&mut conn).await?)
    }

    async fn recover_in_flight(&self) -> Result<u64, QueueError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        let recovered = queue::release_claimed(&mut conn).await?;
        for _ in 0..recovered {
            self.notify.notify_one();
        }
        Ok(recovered)
    }
}
