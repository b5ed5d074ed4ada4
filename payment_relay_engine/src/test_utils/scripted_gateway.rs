//! An in-memory [`ProcessorGateway`] whose answers are scripted by the test.
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use processor_client::{PaymentOutcome, ServiceHealth};

use crate::{
    db_types::PaymentTask,
    gateway::{HealthReport, ProcessorGateway},
};

struct Script {
    outcomes: VecDeque<PaymentOutcome>,
    fallthrough: PaymentOutcome,
    delay: Duration,
    health: HealthReport,
    submissions: Vec<String>,
    health_checks: usize,
}

/// Answers payments from a queue of scripted outcomes, then with a fixed outcome (`Settled` unless changed) once the
/// script runs out. Clones share the same script, so a test can keep a handle after moving one into the engine.
#[derive(Clone)]
pub struct ScriptedGateway {
    script: Arc<Mutex<Script>>,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedGateway {
    pub fn new() -> Self {
        let script = Script {
            outcomes: VecDeque::new(),
            fallthrough: PaymentOutcome::Settled,
            delay: Duration::ZERO,
            health: HealthReport::Reported(ServiceHealth { failing: false, min_response_time: 0 }),
            submissions: Vec::new(),
            health_checks: 0,
        };
        Self { script: Arc::new(Mutex::new(script)) }
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues an outcome for the next unanswered payment.
    pub fn push_outcome(&self, outcome: PaymentOutcome) -> &Self {
        self.lock().outcomes.push_back(outcome);
        self
    }

    /// Sets the outcome used once the scripted outcomes are exhausted.
    pub fn answer_with(&self, outcome: PaymentOutcome) -> &Self {
        self.lock().fallthrough = outcome;
        self
    }

    /// Every payment call takes at least this long.
    pub fn set_delay(&self, delay: Duration) -> &Self {
        self.lock().delay = delay;
        self
    }

    pub fn set_health(&self, health: HealthReport) -> &Self {
        self.lock().health = health;
        self
    }

    /// The correlation ids of every payment received, in order, including failed ones.
    pub fn submissions(&self) -> Vec<String> {
        self.lock().submissions.clone()
    }

    pub fn health_checks(&self) -> usize {
        self.lock().health_checks
    }
}

#[async_trait]
impl ProcessorGateway for ScriptedGateway {
    async fn submit_payment(&self, task: &PaymentTask) -> PaymentOutcome {
        let (delay, outcome) = {
            let mut script = self.lock();
            script.submissions.push(task.correlation_id.clone());
            let outcome = script.outcomes.pop_front().unwrap_or_else(|| script.fallthrough.clone());
            (script.delay, outcome)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        outcome
    }

    async fn check_health(&self) -> HealthReport {
        let mut script = self.lock();
        script.health_checks += 1;
        script.health.clone()
    }
}
