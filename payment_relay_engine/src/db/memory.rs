//! Volatile storage backends. Nothing here survives a restart; use [`crate::SqliteDatabase`] when durability matters.
use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use log::*;
use tokio::sync::Notify;

use crate::{
    db::traits::{LedgerError, QueueError, TaskQueue, TransactionLedger},
    db_types::{Job, PaymentTask, PaymentsSummary, QueuedJob, Receipt, RecordResult, SettledTransaction, TimeWindow},
};

//--------------------------------------     MemoryQueue     ---------------------------------------------------------
#[derive(Default)]
struct QueueState {
    next_receipt: i64,
    ready: VecDeque<QueuedJob>,
    in_flight: HashMap<Receipt, Job>,
}

impl QueueState {
    fn next_receipt(&mut self) -> Receipt {
        self.next_receipt += 1;
        Receipt(self.next_receipt)
    }
}

#[derive(Default)]
pub struct MemoryQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_claim(&self) -> Option<QueuedJob> {
        let mut state = self.lock();
        let queued = state.ready.pop_front()?;
        state.in_flight.insert(queued.receipt, queued.job.clone());
        Some(queued)
    }
}

#[async_trait]
impl TaskQueue for MemoryQueue {
    async fn enqueue(&self, task: PaymentTask) -> Result<(), QueueError> {
        {
            let mut state = self.lock();
            let receipt = state.next_receipt();
            state.ready.push_back(QueuedJob { receipt, job: Job::Payment(task) });
        }
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue(&self) -> Result<QueuedJob, QueueError> {
        loop {
            if let Some(queued) = self.try_claim() {
                trace!("📮️ Claimed {} job {}", queued.job.kind(), queued.receipt);
                return Ok(queued);
            }
            self.notify.notified().await;
        }
    }

    async fn requeue_front(&self, receipt: Receipt, job: Job) -> Result<(), QueueError> {
        {
            let mut state = self.lock();
            if state.in_flight.remove(&receipt).is_none() {
                warn!("📮️ Job {receipt} was not claimed, but is being requeued anyway");
            }
            state.ready.push_front(QueuedJob { receipt, job });
        }
        self.notify.notify_one();
        Ok(())
    }

    async fn acknowledge(&self, receipt: Receipt) -> Result<(), QueueError> {
        if self.lock().in_flight.remove(&receipt).is_none() {
            warn!("📮️ Job {receipt} was acknowledged, but it was not claimed");
        }
        Ok(())
    }

    async fn pending(&self) -> Result<u64, QueueError> {
        Ok(self.lock().ready.len() as u64)
    }

    async fn recover_in_flight(&self) -> Result<u64, QueueError> {
        let recovered = {
            let mut state = self.lock();
            let mut orphans = state.in_flight.drain().collect::<Vec<_>>();
            // Oldest receipt ends up at the very front
            orphans.sort_by_key(|(receipt, _)| std::cmp::Reverse(*receipt));
            let count = orphans.len();
            for (receipt, job) in orphans {
                state.ready.push_front(QueuedJob { receipt, job });
            }
            count
        };
        for _ in 0..recovered {
            self.notify.notify_one();
        }
        Ok(recovered as u64)
    }
}

//--------------------------------------     MemoryLedger    ---------------------------------------------------------
#[derive(Default)]
pub struct MemoryLedger {
    transactions: Mutex<HashMap<String, SettledTransaction>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.transactions.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TransactionLedger for MemoryLedger {
    async fn record(&self, transaction: &SettledTransaction) -> Result<RecordResult, LedgerError> {
        let mut transactions = self.transactions.lock().unwrap_or_else(PoisonError::into_inner);
        if transactions.contains_key(&transaction.correlation_id) {
            return Ok(RecordResult::AlreadyRecorded);
        }
        transactions.insert(transaction.correlation_id.clone(), transaction.clone());
        Ok(RecordResult::Inserted)
    }

    async fn summarize(&self, window: Option<TimeWindow>) -> Result<PaymentsSummary, LedgerError> {
        let transactions = self.transactions.lock().unwrap_or_else(PoisonError::into_inner);
        let summary = transactions
            .values()
            .filter(|tx| window.map_or(true, |w| w.contains(&tx.requested_at)))
            .fold(PaymentsSummary::default(), |mut summary, tx| {
                summary.totals_mut(tx.processor).add(tx.amount);
                summary
            });
        Ok(summary)
    }
}
