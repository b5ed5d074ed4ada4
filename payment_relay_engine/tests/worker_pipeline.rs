mod support;

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use async_trait::async_trait;
use payment_relay_engine::{
    db_types::{
        Job,
        PaymentTask,
        PaymentsSummary,
        ProcessorId,
        QueuedJob,
        Receipt,
        RecordResult,
        SettledTransaction,
        TimeWindow,
    },
    test_utils::scripted_gateway::ScriptedGateway,
    DecisionConfig,
    HealthRegistry,
    LedgerError,
    MemoryLedger,
    MemoryQueue,
    PaymentRelayApi,
    Processors,
    QueueError,
    TaskQueue,
    TransactionLedger,
    WorkerConfig,
    WorkerContext,
    WorkerPool,
};
use processor_client::PaymentOutcome;
use relay_common::Cents;
use support::{fresh_database, init_logging, task, wait_for};

const PATIENCE: Duration = Duration::from_secs(5);

struct Harness<Q, L> {
    default: ScriptedGateway,
    fallback: ScriptedGateway,
    registry: Arc<HealthRegistry>,
    queue: Arc<Q>,
    ledger: Arc<L>,
    pool: WorkerPool<Q>,
}

impl<Q: TaskQueue, L: TransactionLedger> Harness<Q, L> {
    async fn start(queue: Q, ledger: L, registry: HealthRegistry, workers: usize) -> Self {
        init_logging();
        let default = ScriptedGateway::new();
        let fallback = ScriptedGateway::new();
        let processors = Arc::new(Processors::new(default.clone(), fallback.clone()));
        let registry = Arc::new(registry);
        let queue = Arc::new(queue);
        let ledger = Arc::new(ledger);
        let decision = DecisionConfig { recovery_poll: Duration::from_millis(20), ..Default::default() };
        let context =
            WorkerContext::new(processors, registry.clone(), decision, queue.clone(), ledger.clone());
        let config = WorkerConfig { workers, queue_backoff: Duration::from_millis(20), ..Default::default() };
        let pool = WorkerPool::start(config, context).await.unwrap();
        Self { default, fallback, registry, queue, ledger, pool }
    }

    fn api(&self) -> PaymentRelayApi<L, Q> {
        PaymentRelayApi::new(self.ledger.clone(), self.queue.clone())
    }

    async fn summary(&self) -> PaymentsSummary {
        self.ledger.summarize(None).await.unwrap()
    }

    async fn wait_for_settlements(&self, expected: u64) -> PaymentsSummary {
        let this = self;
        wait_for(PATIENCE, &format!("{expected} settlements"), move || async move {
            this.summary().await.total_requests() >= expected
        })
        .await;
        self.summary().await
    }
}

async fn memory_harness(workers: usize) -> Harness<MemoryQueue, MemoryLedger> {
    Harness::start(MemoryQueue::new(), MemoryLedger::new(), HealthRegistry::default(), workers).await
}

#[tokio::test]
async fn healthy_default_takes_everything_until_it_fails() {
    let harness = memory_harness(4).await;
    let api = harness.api();
    for i in 0..3 {
        api.submit_payment(format!("first-{i}"), Cents::from(1000)).await.unwrap();
    }
    let summary = harness.wait_for_settlements(3).await;
    assert_eq!(summary.default.total_requests, 3);
    assert_eq!(summary.fallback.total_requests, 0);

    harness.registry.set(ProcessorId::Default, true, 0);
    for i in 0..2 {
        api.submit_payment(format!("second-{i}"), Cents::from(500)).await.unwrap();
    }
    let summary = harness.wait_for_settlements(5).await;
    assert_eq!(summary.default.total_requests, 3);
    assert_eq!(summary.default.total_amount, Cents::from(3000));
    assert_eq!(summary.fallback.total_requests, 2);
    assert_eq!(summary.fallback.total_amount, Cents::from(1000));
    harness.pool.shutdown().await.unwrap();
}

#[tokio::test]
async fn a_retried_payment_settles_exactly_once() {
    let registry = HealthRegistry::new(Duration::from_millis(100));
    registry.set(ProcessorId::Fallback, true, 0);
    let harness = Harness::start(MemoryQueue::new(), MemoryLedger::new(), registry, 2).await;
    harness.default.push_outcome(PaymentOutcome::Retryable("processor answered 500".into()));

    harness.api().submit_payment("retry-me".into(), Cents::from(1990)).await.unwrap();
    let summary = harness.wait_for_settlements(1).await;
    // Give a stray second settlement a chance to show up
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(harness.summary().await, summary);
    assert_eq!(summary.default.total_requests, 1);
    assert_eq!(summary.default.total_amount, Cents::from(1990));
    assert_eq!(harness.ledger.len(), 1);
    assert_eq!(harness.default.submissions(), vec!["retry-me", "retry-me"]);
    assert!(harness.fallback.submissions().is_empty());
    harness.pool.shutdown().await.unwrap();
}

#[tokio::test]
async fn failed_delivery_is_rerouted_to_the_other_processor() {
    let harness = memory_harness(1).await;
    harness.default.push_outcome(PaymentOutcome::Retryable("Request timed out after 300 ms".into()));
    harness.api().submit_payment("reroute".into(), Cents::from(700)).await.unwrap();
    let summary = harness.wait_for_settlements(1).await;
    assert_eq!(summary.fallback.total_requests, 1);
    assert_eq!(summary.default.total_requests, 0);
    assert!(harness.registry.get(ProcessorId::Default).failing);
    harness.pool.shutdown().await.unwrap();
}

#[tokio::test]
async fn submission_does_not_wait_for_the_processor() {
    let harness = memory_harness(2).await;
    harness.default.set_delay(Duration::from_millis(1_500));
    let started = Instant::now();
    harness.api().submit_payment("slow".into(), Cents::from(100)).await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(harness.summary().await.total_requests(), 0);

    let summary = harness.wait_for_settlements(1).await;
    assert_eq!(summary.default.total_requests, 1);
    harness.pool.shutdown().await.unwrap();
}

#[tokio::test]
async fn rejected_payments_are_dropped() {
    let harness = memory_harness(1).await;
    harness.default.push_outcome(PaymentOutcome::Rejected { status: 422, message: "bad amount".into() });
    harness.api().submit_payment("rejected".into(), Cents::from(100)).await.unwrap();
    harness.api().submit_payment("accepted".into(), Cents::from(100)).await.unwrap();

    let summary = harness.wait_for_settlements(1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(harness.summary().await, summary);
    assert_eq!(harness.queue.pending().await.unwrap(), 0);
    let recovered = harness.pool.shutdown().await.unwrap();
    assert_eq!(recovered, 0);
    assert_eq!(harness.default.submissions().iter().filter(|id| *id == "rejected").count(), 1);
}

#[tokio::test]
async fn shutdown_returns_stalled_payments_to_the_queue() {
    let registry = HealthRegistry::default();
    registry.set(ProcessorId::Default, true, 0);
    registry.set(ProcessorId::Fallback, true, 0);
    let harness = Harness::start(MemoryQueue::new(), MemoryLedger::new(), registry, 2).await;
    harness.api().submit_payment("stalled".into(), Cents::from(100)).await.unwrap();
    let queue = harness.queue.clone();
    wait_for(PATIENCE, "the payment to be claimed", move || {
        let queue = queue.clone();
        async move { queue.pending().await.unwrap() == 0 }
    })
    .await;

    harness.pool.shutdown().await.unwrap();
    assert_eq!(harness.queue.pending().await.unwrap(), 1);
    assert!(harness.default.submissions().is_empty());
    assert!(harness.fallback.submissions().is_empty());
}

#[tokio::test]
async fn many_payments_are_each_counted_once() {
    let harness = memory_harness(8).await;
    for _ in 0..5 {
        harness.default.push_outcome(PaymentOutcome::Retryable("processor answered 503".into()));
        harness.fallback.push_outcome(PaymentOutcome::Retryable("processor answered 502".into()));
    }
    let api = harness.api();
    for i in 0..50 {
        api.submit_payment(format!("burst-{i:02}"), Cents::from(100 + i)).await.unwrap();
    }
    let summary = harness.wait_for_settlements(50).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(harness.summary().await, summary);
    assert_eq!(summary.total_requests(), 50);
    let expected: i64 = (0..50).map(|i| 100 + i).sum();
    assert_eq!((summary.default.total_amount + summary.fallback.total_amount).value(), expected);
    assert_eq!(harness.ledger.len(), 50);
    harness.pool.shutdown().await.unwrap();
}

/// Fails the first `failures` writes, then behaves like a [`MemoryLedger`].
struct FlakyLedger {
    inner: MemoryLedger,
    failures: AtomicUsize,
}

#[async_trait]
impl TransactionLedger for FlakyLedger {
    async fn record(&self, transaction: &SettledTransaction) -> Result<RecordResult, LedgerError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(LedgerError::StorageFailure("database is locked".into()));
        }
        self.inner.record(transaction).await
    }

    async fn summarize(&self, window: Option<TimeWindow>) -> Result<PaymentsSummary, LedgerError> {
        self.inner.summarize(window).await
    }
}

#[tokio::test]
async fn ledger_failures_do_not_resend_the_payment() {
    let ledger = FlakyLedger { inner: MemoryLedger::new(), failures: AtomicUsize::new(3) };
    let harness = Harness::start(MemoryQueue::new(), ledger, HealthRegistry::default(), 1).await;
    harness.api().submit_payment("persist-me".into(), Cents::from(4200)).await.unwrap();
    let summary = harness.wait_for_settlements(1).await;
    assert_eq!(summary.default.total_amount, Cents::from(4200));
    assert_eq!(harness.default.submissions().len(), 1);
    assert_eq!(harness.ledger.failures.load(Ordering::SeqCst), 0);
    harness.pool.shutdown().await.unwrap();
}

/// A [`MemoryQueue`] whose first `failures` calls to `requeue_front` fail.
struct FlakyQueue {
    inner: MemoryQueue,
    failures: AtomicUsize,
}

#[async_trait]
impl TaskQueue for FlakyQueue {
    async fn enqueue(&self, task: PaymentTask) -> Result<(), QueueError> {
        self.inner.enqueue(task).await
    }

    async fn dequeue(&self) -> Result<QueuedJob, QueueError> {
        self.inner.dequeue().await
    }

    async fn requeue_front(&self, receipt: Receipt, job: Job) -> Result<(), QueueError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(QueueError::StorageFailure("disk I/O error".into()));
        }
        self.inner.requeue_front(receipt, job).await
    }

    async fn acknowledge(&self, receipt: Receipt) -> Result<(), QueueError> {
        self.inner.acknowledge(receipt).await
    }

    async fn pending(&self) -> Result<u64, QueueError> {
        self.inner.pending().await
    }

    async fn recover_in_flight(&self) -> Result<u64, QueueError> {
        self.inner.recover_in_flight().await
    }
}

#[tokio::test]
async fn a_failed_requeue_is_retried_while_the_pool_runs() {
    let queue = FlakyQueue { inner: MemoryQueue::new(), failures: AtomicUsize::new(1) };
    let ledger = FlakyLedger { inner: MemoryLedger::new(), failures: AtomicUsize::new(1) };
    let harness = Harness::start(queue, ledger, HealthRegistry::default(), 2).await;
    harness.api().submit_payment("hiccup".into(), Cents::from(2500)).await.unwrap();

    let summary = harness.wait_for_settlements(1).await;
    assert_eq!(summary.default.total_amount, Cents::from(2500));
    assert_eq!(harness.queue.failures.load(Ordering::SeqCst), 0);
    assert_eq!(harness.ledger.failures.load(Ordering::SeqCst), 0);
    assert_eq!(harness.default.submissions(), vec!["hiccup"]);
    assert_eq!(harness.queue.pending().await.unwrap(), 0);
    assert_eq!(harness.pool.shutdown().await.unwrap(), 0);
}

#[tokio::test]
async fn redelivered_payments_after_a_crash_are_not_double_counted() {
    let db = fresh_database().await;
    // The processor accepted "crash" and it was recorded, but the worker died before acknowledging the slot
    let crashed = task("crash", 1500);
    db.enqueue(crashed.clone()).await.unwrap();
    let _claimed = db.dequeue().await.unwrap();
    db.record(&SettledTransaction::new(&crashed, ProcessorId::Default)).await.unwrap();
    db.enqueue(task("after", 500)).await.unwrap();

    let harness = Harness::start(db.clone(), db, HealthRegistry::default(), 2).await;
    let h = &harness;
    wait_for(PATIENCE, "the queue to drain", move || async move {
        h.queue.pending().await.unwrap() == 0 && h.summary().await.total_requests() == 2
    })
    .await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let summary = harness.summary().await;
    assert_eq!(summary.default.total_requests, 2);
    assert_eq!(summary.default.total_amount, Cents::from(2000));
    assert_eq!(harness.default.submissions().iter().filter(|id| *id == "crash").count(), 1);
    assert_eq!(harness.pool.shutdown().await.unwrap(), 0);
}
