//! Processor selection.
//!
//! The default processor is cheaper, so it is chosen whenever it is healthy and not unreasonably slow. The fallback is
//! used only when the default is failing, or when the default is both slower than the latency threshold and slower
//! than the fallback. When both processors are failing, [`DecisionEngine::choose`] waits for either one to recover.
use std::{sync::Arc, time::Duration};

use log::*;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::{
    db_types::ProcessorId,
    health::registry::{HealthRegistry, ProcessorStatus},
};

pub const DEFAULT_LATENCY_THRESHOLD_MS: u64 = 100;
pub const DEFAULT_RECOVERY_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionConfig {
    /// A healthy default processor at or below this response time is always preferred.
    pub latency_threshold_ms: u64,
    /// How often to re-read the registry while both processors are failing.
    pub recovery_poll: Duration,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self { latency_threshold_ms: DEFAULT_LATENCY_THRESHOLD_MS, recovery_poll: DEFAULT_RECOVERY_POLL }
    }
}

#[derive(Debug, Clone)]
pub struct DecisionEngine {
    registry: Arc<HealthRegistry>,
    config: DecisionConfig,
}

impl DecisionEngine {
    pub fn new(registry: Arc<HealthRegistry>, config: DecisionConfig) -> Self {
        Self { registry, config }
    }

    /// The selection policy, applied to a `(default, fallback)` snapshot. `None` means both processors are failing.
    pub fn select(&self, (default, fallback): (ProcessorStatus, ProcessorStatus)) -> Option<ProcessorId> {
        if !default.failing {
            let fast_enough = default.min_response_time_ms <= self.config.latency_threshold_ms;
            let not_slower = default.min_response_time_ms <= fallback.min_response_time_ms;
            if fallback.failing || fast_enough || not_slower {
                return Some(ProcessorId::Default);
            }
        }
        if !fallback.failing {
            return Some(ProcessorId::Fallback);
        }
        None
    }

    /// Picks a processor for the next delivery attempt, waiting for as long as both processors are failing.
    ///
    /// Returns `None` only if `cancel` fires first.
    pub async fn choose(&self, cancel: &CancellationToken) -> Option<ProcessorId> {
        if let Some(processor) = self.select(self.registry.snapshot()) {
            trace!("🧭️ Routing to the {processor} processor");
            return Some(processor);
        }
        debug!("🧭️ Both processors are failing. Waiting for one of them to recover");
        let mut poll = tokio::time::interval(self.config.recovery_poll);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately and we've just checked
        poll.tick().await;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("🧭️ Gave up waiting for a processor to recover");
                    return None;
                },
                _ = poll.tick() => {
                    if let Some(processor) = self.select(self.registry.snapshot()) {
                        debug!("🧭️ The {processor} processor has recovered");
                        return Some(processor);
                    }
                },
            }
        }
    }
}
