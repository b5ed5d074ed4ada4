use async_trait::async_trait;
use mockall::mock;
use payment_relay_engine::{
    db_types::{Job, PaymentTask, PaymentsSummary, QueuedJob, Receipt, RecordResult, SettledTransaction, TimeWindow},
    LedgerError,
    QueueError,
    TaskQueue,
    TransactionLedger,
};

mock! {
    pub Ledger {}
    #[async_trait]
    impl TransactionLedger for Ledger {
        async fn record(&self, transaction: &SettledTransaction) -> Result<RecordResult, LedgerError>;
        async fn summarize(&self, window: Option<TimeWindow>) -> Result<PaymentsSummary, LedgerError>;
    }
}

mock! {
    pub Queue {}
    #[async_trait]
    impl TaskQueue for Queue {
        async fn enqueue(&self, task: PaymentTask) -> Result<(), QueueError>;
        async fn dequeue(&self) -> Result<QueuedJob, QueueError>;
        async fn requeue_front(&self, receipt: Receipt, job: Job) -> Result<(), QueueError>;
        async fn acknowledge(&self, receipt: Receipt) -> Result<(), QueueError>;
        async fn pending(&self) -> Result<u64, QueueError>;
        async fn recover_in_flight(&self) -> Result<u64, QueueError>;
    }
}
