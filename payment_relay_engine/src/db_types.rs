use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, SubsecRound, Utc};
use relay_common::Cents;
use serde::{Deserialize, Serialize};
use thiserror::Error;

//--------------------------------------     ProcessorId     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessorId {
    Default,
    Fallback,
}

impl ProcessorId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Fallback => "fallback",
        }
    }

    pub fn other(&self) -> Self {
        match self {
            Self::Default => Self::Fallback,
            Self::Fallback => Self::Default,
        }
    }
}

impl Display for ProcessorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
#[error("Unknown payment processor: {0}")]
pub struct UnknownProcessor(pub String);

impl FromStr for ProcessorId {
    type Err = UnknownProcessor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Self::Default),
            "fallback" => Ok(Self::Fallback),
            _ => Err(UnknownProcessor(s.to_string())),
        }
    }
}

//--------------------------------------     PaymentTask     ---------------------------------------------------------
/// A payment that has been accepted from a client but not yet settled.
///
/// Tasks are immutable once created. `requested_at` is truncated to millisecond precision, which is the precision used
/// on the wire and in storage, so a task reads back from the queue exactly as it went in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTask {
    pub correlation_id: String,
    pub amount: Cents,
    pub requested_at: DateTime<Utc>,
}

impl PaymentTask {
    pub fn new<S: Into<String>>(correlation_id: S, amount: Cents, requested_at: DateTime<Utc>) -> Self {
        Self { correlation_id: correlation_id.into(), amount, requested_at: requested_at.trunc_subsecs(3) }
    }

    /// Creates a task stamped with the current time.
    pub fn now<S: Into<String>>(correlation_id: S, amount: Cents) -> Self {
        Self::new(correlation_id, amount, Utc::now())
    }
}

impl From<&PaymentTask> for processor_client::PaymentRequest {
    fn from(task: &PaymentTask) -> Self {
        Self { correlation_id: task.correlation_id.clone(), amount: task.amount, requested_at: task.requested_at }
    }
}

//--------------------------------------  SettledTransaction  --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettledTransaction {
    pub correlation_id: String,
    pub amount: Cents,
    pub requested_at: DateTime<Utc>,
    pub processor: ProcessorId,
}

impl SettledTransaction {
    pub fn new(task: &PaymentTask, processor: ProcessorId) -> Self {
        Self {
            correlation_id: task.correlation_id.clone(),
            amount: task.amount,
            requested_at: task.requested_at,
            processor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordResult {
    Inserted,
    /// A transaction with the same correlation id was already in the ledger. Nothing was written.
    AlreadyRecorded,
}

//--------------------------------------         Job         ---------------------------------------------------------
/// A unit of work in the task queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    /// The payment still has to be delivered to a processor.
    Payment(PaymentTask),
    /// `processor` has accepted the payment, but it has not been written to the ledger yet.
    Settle { task: PaymentTask, processor: ProcessorId },
}

impl Job {
    pub fn task(&self) -> &PaymentTask {
        match self {
            Self::Payment(task) => task,
            Self::Settle { task, .. } => task,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Payment(_) => "payment",
            Self::Settle { .. } => "settle",
        }
    }
}

/// Identifies the queue slot a dequeued job came from. Workers use it to acknowledge or requeue that slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Receipt(pub i64);

impl Display for Receipt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedJob {
    pub receipt: Receipt,
    pub job: Job,
}

//--------------------------------------       Summary       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorTotals {
    pub total_requests: u64,
    pub total_amount: Cents,
}

impl ProcessorTotals {
    pub fn add(&mut self, amount: Cents) {
        self.total_requests += 1;
        self.total_amount += amount;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentsSummary {
    pub default: ProcessorTotals,
    pub fallback: ProcessorTotals,
}

impl PaymentsSummary {
    pub fn totals_mut(&mut self, processor: ProcessorId) -> &mut ProcessorTotals {
        match processor {
            ProcessorId::Default => &mut self.default,
            ProcessorId::Fallback => &mut self.fallback,
        }
    }

    pub fn total_requests(&self) -> u64 {
        self.default.total_requests + self.fallback.total_requests
    }
}

/// An inclusive `[from, to]` range over `requested_at`.
///
/// Timestamps are stored with millisecond precision, so the bounds are narrowed to whole milliseconds: `from` is
/// rounded up and `to` is rounded down. The window then selects exactly the stored timestamps that fall inside the
/// requested range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

#[derive(Debug, Clone, Error)]
#[error("The start of the window ({from}) is after its end ({to})")]
pub struct InvalidTimeWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self, InvalidTimeWindow> {
        if from > to {
            return Err(InvalidTimeWindow { from, to });
        }
        let floor = from.trunc_subsecs(3);
        let from = if floor < from { floor + chrono::Duration::milliseconds(1) } else { floor };
        Ok(Self { from, to: to.trunc_subsecs(3) })
    }

    pub fn from(&self) -> DateTime<Utc> {
        self.from
    }

    pub fn to(&self) -> DateTime<Utc> {
        self.to
    }

    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        self.from <= *ts && *ts <= self.to
    }
}
