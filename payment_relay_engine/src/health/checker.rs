use std::{sync::Arc, time::Duration};

use log::*;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    db_types::ProcessorId,
    gateway::{HealthReport, ProcessorGateway, Processors},
    health::registry::HealthRegistry,
};

pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Starts the periodic health checker. Both processors are probed concurrently on every tick, the first tick
/// immediately. The checker runs until `cancel` fires.
pub fn start_health_checker<G: ProcessorGateway>(
    processors: Arc<Processors<G>>,
    registry: Arc<HealthRegistry>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("🩺️ Processor health checker started. Checking every {} ms", interval.as_millis());
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = timer.tick() => {},
            }
            let (default, fallback) = tokio::join!(
                processors.get(ProcessorId::Default).check_health(),
                processors.get(ProcessorId::Fallback).check_health()
            );
            apply_report(&registry, ProcessorId::Default, default);
            apply_report(&registry, ProcessorId::Fallback, fallback);
        }
        info!("🩺️ Processor health checker stopped");
    })
}

/// Writes a probe result into the registry. A failed probe only marks the processor as failing for the registry's TTL,
/// so that an outage of the health endpoint alone cannot park traffic indefinitely.
pub fn apply_report(registry: &HealthRegistry, processor: ProcessorId, report: HealthReport) {
    match report {
        HealthReport::Reported(health) => {
            trace!("🩺️ {processor}: failing={} minResponseTime={}", health.failing, health.min_response_time);
            registry.set(processor, health.failing, health.min_response_time);
        },
        HealthReport::Unreachable(reason) => {
            warn!("🩺️ Could not check the health of the {processor} processor. {reason}");
            registry.set_failing_with_ttl(processor);
        },
    }
}
