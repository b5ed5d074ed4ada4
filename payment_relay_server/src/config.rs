use std::{env, fmt::Display, str::FromStr, time::Duration};

use log::*;
use payment_relay_engine::{
    decision::{DecisionConfig, DEFAULT_LATENCY_THRESHOLD_MS, DEFAULT_RECOVERY_POLL},
    health::{checker::DEFAULT_HEALTH_CHECK_INTERVAL, registry::DEFAULT_FAILING_TTL},
    workers::{WorkerConfig, DEFAULT_MAX_ATTEMPTS, DEFAULT_QUEUE_BACKOFF, DEFAULT_WORKER_COUNT},
};
use processor_client::{ProcessorConfig, DEFAULT_HEALTH_TIMEOUT, DEFAULT_PAYMENT_TIMEOUT};
use relay_common::helpers::{parse_boolean_flag, parse_millis};

use crate::errors::ServerError;

const DEFAULT_RELAY_HOST: &str = "0.0.0.0";
const DEFAULT_RELAY_PORT: u16 = 8080;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/relay_store.db";
const DEFAULT_DB_CONNECTIONS: u32 = 25;
const DEFAULT_PROCESSOR_URL: &str = "http://payment-processor-default:8080";
const FALLBACK_PROCESSOR_URL: &str = "http://payment-processor-fallback:8080";

/// Where the task queue and the ledger live.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StorageBackend {
    /// Durable storage in the SQLite database at `database_url`.
    #[default]
    Sqlite,
    /// Volatile storage. Queued payments and totals are lost on restart.
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            _ => Err(format!("'{s}' is not a storage backend. Use 'sqlite' or 'memory'")),
        }
    }
}

impl Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite => write!(f, "sqlite"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub storage: StorageBackend,
    pub database_url: String,
    pub db_max_connections: u32,
    pub default_processor_url: String,
    pub fallback_processor_url: String,
    /// Deadline for a single payment call to a processor.
    pub payment_timeout: Duration,
    /// Deadline for a single health probe.
    pub health_timeout: Duration,
    /// If false, the periodic health checker is not started and processor health is only learnt from failed
    /// deliveries.
    pub health_checks: bool,
    pub health_check_interval: Duration,
    /// How long a processor stays marked as failing after a failed delivery or an unanswered health probe.
    pub health_failing_ttl: Duration,
    pub decision: DecisionConfig,
    pub workers: WorkerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RELAY_HOST.to_string(),
            port: DEFAULT_RELAY_PORT,
            storage: StorageBackend::default(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            db_max_connections: DEFAULT_DB_CONNECTIONS,
            default_processor_url: DEFAULT_PROCESSOR_URL.to_string(),
            fallback_processor_url: FALLBACK_PROCESSOR_URL.to_string(),
            payment_timeout: DEFAULT_PAYMENT_TIMEOUT,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
            health_checks: true,
            health_check_interval: DEFAULT_HEALTH_CHECK_INTERVAL,
            health_failing_ttl: DEFAULT_FAILING_TTL,
            decision: DecisionConfig::default(),
            workers: WorkerConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("RELAY_HOST").ok().unwrap_or_else(|| DEFAULT_RELAY_HOST.into());
        let port = parse_env("RELAY_PORT", DEFAULT_RELAY_PORT);
        let storage = parse_env("RELAY_STORAGE_BACKEND", StorageBackend::default());
        let database_url = env::var("RELAY_DATABASE_URL").ok().unwrap_or_else(|| {
            if storage == StorageBackend::Sqlite {
                info!("🪛️ RELAY_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            }
            DEFAULT_DATABASE_URL.into()
        });
        let db_max_connections = parse_env("RELAY_DB_MAX_CONNECTIONS", DEFAULT_DB_CONNECTIONS);
        let default_processor_url = env::var("RELAY_DEFAULT_PROCESSOR_URL").ok().unwrap_or_else(|| {
            info!("🪛️ RELAY_DEFAULT_PROCESSOR_URL is not set. Using {DEFAULT_PROCESSOR_URL}.");
            DEFAULT_PROCESSOR_URL.into()
        });
        let fallback_processor_url = env::var("RELAY_FALLBACK_PROCESSOR_URL").ok().unwrap_or_else(|| {
            info!("🪛️ RELAY_FALLBACK_PROCESSOR_URL is not set. Using {FALLBACK_PROCESSOR_URL}.");
            FALLBACK_PROCESSOR_URL.into()
        });
        let health_checks = parse_boolean_flag(env::var("RELAY_HEALTH_CHECKS").ok(), true);
        if !health_checks {
            warn!("🪛️ Processor health checks are disabled. Routing will rely on delivery failures alone.");
        }
        let decision = DecisionConfig {
            latency_threshold_ms: parse_env("RELAY_LATENCY_THRESHOLD_MS", DEFAULT_LATENCY_THRESHOLD_MS),
            recovery_poll: env_millis("RELAY_RECOVERY_POLL_MS", DEFAULT_RECOVERY_POLL),
        };
        let workers = WorkerConfig {
            workers: parse_env("RELAY_WORKERS", DEFAULT_WORKER_COUNT).max(1),
            max_attempts: parse_env("RELAY_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS).max(1),
            queue_backoff: env_millis("RELAY_QUEUE_BACKOFF_MS", DEFAULT_QUEUE_BACKOFF),
        };
        Self {
            host,
            port,
            storage,
            database_url,
            db_max_connections,
            default_processor_url,
            fallback_processor_url,
            payment_timeout: env_millis("RELAY_PAYMENT_TIMEOUT_MS", DEFAULT_PAYMENT_TIMEOUT),
            health_timeout: env_millis("RELAY_HEALTH_TIMEOUT_MS", DEFAULT_HEALTH_TIMEOUT),
            health_checks,
            health_check_interval: env_millis("RELAY_HEALTH_CHECK_INTERVAL_MS", DEFAULT_HEALTH_CHECK_INTERVAL),
            health_failing_ttl: env_millis("RELAY_HEALTH_TTL_MS", DEFAULT_FAILING_TTL),
            decision,
            workers,
        }
    }

    /// The client configuration for the default and fallback processors, in that order.
    pub fn processor_configs(&self) -> Result<(ProcessorConfig, ProcessorConfig), ServerError> {
        let build = |url: &str| {
            if url.trim().is_empty() {
                return Err(ServerError::ConfigurationError("A processor URL is empty".into()));
            }
            Ok(ProcessorConfig::new(url)
                .with_payment_timeout(self.payment_timeout)
                .with_health_timeout(self.health_timeout))
        };
        Ok((build(&self.default_processor_url)?, build(&self.fallback_processor_url)?))
    }
}

/// Reads and parses `name`, falling back to `default` (with a log message) if it is missing or invalid.
fn parse_env<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default value of {default}.");
            default
        },
    }
}

fn env_millis(name: &str, default: Duration) -> Duration {
    match env::var(name) {
        Ok(s) => parse_millis(&s).unwrap_or_else(|e| {
            warn!("🪛️ Invalid value for {name}: {e}. Using the default of {} ms instead.", default.as_millis());
            default
        }),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default value of {} ms.", default.as_millis());
            default
        },
    }
}
