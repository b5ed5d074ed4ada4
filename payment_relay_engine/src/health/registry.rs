use std::{
    sync::{PoisonError, RwLock},
    time::Duration,
};

use log::*;
use tokio::time::Instant;

use crate::db_types::ProcessorId;

pub const DEFAULT_FAILING_TTL: Duration = Duration::from_millis(1_000);

/// A point-in-time view of one processor's health.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorStatus {
    pub processor: ProcessorId,
    pub failing: bool,
    pub min_response_time_ms: u64,
    /// When the status was last written. `None` if it never has been.
    pub last_checked_at: Option<Instant>,
    /// Set when the current `failing` flag expires on its own.
    pub ttl: Option<Duration>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Entry {
    failing: bool,
    min_response_time_ms: u64,
    last_checked_at: Option<Instant>,
    ttl: Option<Duration>,
}

impl Entry {
    fn expired(&self, now: Instant) -> bool {
        match (self.last_checked_at, self.ttl) {
            (Some(at), Some(ttl)) => now >= at + ttl,
            _ => false,
        }
    }

    fn status(&self, processor: ProcessorId, now: Instant) -> ProcessorStatus {
        // A lapsed TTL means "assume recovered until proven otherwise"
        let failing = self.failing && !self.expired(now);
        ProcessorStatus {
            processor,
            failing,
            min_response_time_ms: self.min_response_time_ms,
            last_checked_at: self.last_checked_at,
            ttl: self.ttl,
        }
    }
}

/// Shared health state for both processors.
///
/// Each processor has its own lock, so a write for one never blocks readers of the other. Both processors start out
/// healthy with an unknown (zero) response time.
#[derive(Debug)]
pub struct HealthRegistry {
    default: RwLock<Entry>,
    fallback: RwLock<Entry>,
    failing_ttl: Duration,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_FAILING_TTL)
    }
}

impl HealthRegistry {
    pub fn new(failing_ttl: Duration) -> Self {
        Self { default: RwLock::new(Entry::default()), fallback: RwLock::new(Entry::default()), failing_ttl }
    }

    fn entry(&self, processor: ProcessorId) -> &RwLock<Entry> {
        match processor {
            ProcessorId::Default => &self.default,
            ProcessorId::Fallback => &self.fallback,
        }
    }

    pub fn get(&self, processor: ProcessorId) -> ProcessorStatus {
        let entry = self.entry(processor).read().unwrap_or_else(PoisonError::into_inner);
        entry.status(processor, Instant::now())
    }

    /// Both statuses, as `(default, fallback)`.
    pub fn snapshot(&self) -> (ProcessorStatus, ProcessorStatus) {
        (self.get(ProcessorId::Default), self.get(ProcessorId::Fallback))
    }

    /// Records a definitive health reading. The failing flag does not expire.
    pub fn set(&self, processor: ProcessorId, failing: bool, min_response_time_ms: u64) {
        let mut entry = self.entry(processor).write().unwrap_or_else(PoisonError::into_inner);
        if entry.failing != failing {
            info!("🩺️ The {processor} processor is now {}", if failing { "failing" } else { "healthy" });
        }
        *entry = Entry { failing, min_response_time_ms, last_checked_at: Some(Instant::now()), ttl: None };
    }

    /// Marks the processor as failing for the registry's TTL only. Used when the evidence is circumstantial: a health
    /// probe that could not complete, or a single failed delivery. The last known response time is kept.
    pub fn set_failing_with_ttl(&self, processor: ProcessorId) {
        let mut entry = self.entry(processor).write().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        if !entry.failing || entry.expired(now) {
            debug!("🩺️ The {processor} processor is marked as failing for {} ms", self.failing_ttl.as_millis());
        }
        entry.failing = true;
        entry.last_checked_at = Some(now);
        entry.ttl = Some(self.failing_ttl);
    }
}
