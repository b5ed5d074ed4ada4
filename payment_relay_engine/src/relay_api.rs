//! The entry point the HTTP layer uses to submit payments and query totals.
use std::{fmt::Debug, sync::Arc};

use log::*;
use relay_common::Cents;

use crate::{
    db_types::{PaymentTask, PaymentsSummary, TimeWindow},
    LedgerError,
    QueueError,
    TaskQueue,
    TransactionLedger,
};

pub struct PaymentRelayApi<L, Q> {
    ledger: Arc<L>,
    queue: Arc<Q>,
}

impl<L, Q> Debug for PaymentRelayApi<L, Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentRelayApi")
    }
}

impl<L, Q> Clone for PaymentRelayApi<L, Q> {
    fn clone(&self) -> Self {
        Self { ledger: Arc::clone(&self.ledger), queue: Arc::clone(&self.queue) }
    }
}

impl<L, Q> PaymentRelayApi<L, Q>
where
    L: TransactionLedger,
    Q: TaskQueue,
{
    pub fn new(ledger: Arc<L>, queue: Arc<Q>) -> Self {
        Self { ledger, queue }
    }

    /// Accepts a payment for delivery, stamping it with the current time. The payment is only queued here; delivery
    /// happens in the background.
    pub async fn submit_payment(&self, correlation_id: String, amount: Cents) -> Result<PaymentTask, QueueError> {
        let task = PaymentTask::now(correlation_id, amount);
        self.queue.enqueue(task.clone()).await?;
        trace!("📮️ Payment {} for {amount} queued", task.correlation_id);
        Ok(task)
    }

    /// Totals per processor, optionally limited to payments requested within `window`.
    pub async fn payments_summary(&self, window: Option<TimeWindow>) -> Result<PaymentsSummary, LedgerError> {
        self.ledger.summarize(window).await
    }

    pub async fn pending_tasks(&self) -> Result<u64, QueueError> {
        self.queue.pending().await
    }
}
