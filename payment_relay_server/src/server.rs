use std::{path::Path, sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use payment_relay_engine::{
    start_health_checker,
    HealthRegistry,
    MemoryLedger,
    MemoryQueue,
    PaymentRelayApi,
    Processors,
    SqliteDatabase,
    TaskQueue,
    TransactionLedger,
    WorkerContext,
    WorkerPool,
};
use processor_client::ProcessorApi;
use tokio_util::sync::CancellationToken;

use crate::{
    config::{ServerConfig, StorageBackend},
    errors::ServerError,
    routes::{health, json_config, query_config, PaymentsRoute, PaymentsSummaryRoute},
};

/// Builds the relay from `config` and serves until the HTTP server stops. Workers are then stopped, and any payment
/// they were holding is returned to the queue.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let processors = create_processors(&config)?;
    match config.storage {
        StorageBackend::Sqlite => {
            ensure_database_dir(&config.database_url)?;
            let db = SqliteDatabase::new_with_url(&config.database_url, config.db_max_connections)
                .await
                .map_err(|e| ServerError::InitializeError(e.to_string()))?;
            info!("🗃️ Using the SQLite database at {}", config.database_url);
            let db = Arc::new(db);
            run_relay(config, processors, Arc::clone(&db), db).await
        },
        StorageBackend::Memory => {
            warn!("🗃️ Using in-memory storage. Queued payments and totals will be lost when the relay stops.");
            run_relay(config, processors, Arc::new(MemoryLedger::new()), Arc::new(MemoryQueue::new())).await
        },
    }
}

/// SQLite creates the database file on demand, but not the directory it lives in.
fn ensure_database_dir(url: &str) -> Result<(), ServerError> {
    let path = url.trim_start_matches("sqlite://").trim_start_matches("sqlite:");
    let path = path.split('?').next().unwrap_or_default();
    match Path::new(path).parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !path.starts_with(":memory:") => {
            std::fs::create_dir_all(dir).map_err(|e| {
                ServerError::InitializeError(format!("Could not create the database directory {}. {e}", dir.display()))
            })
        },
        _ => Ok(()),
    }
}

pub fn create_processors(config: &ServerConfig) -> Result<Processors<ProcessorApi>, ServerError> {
    let (default, fallback) = config.processor_configs()?;
    let default = ProcessorApi::new(default).map_err(|e| ServerError::ConfigurationError(e.to_string()))?;
    let fallback = ProcessorApi::new(fallback).map_err(|e| ServerError::ConfigurationError(e.to_string()))?;
    info!(
        "🚀️ Forwarding payments to {} (default) and {} (fallback)",
        default.config().base_url,
        fallback.config().base_url
    );
    Ok(Processors::new(default, fallback))
}

async fn run_relay<L, Q>(
    config: ServerConfig,
    processors: Processors<ProcessorApi>,
    ledger: Arc<L>,
    queue: Arc<Q>,
) -> Result<(), ServerError>
where
    L: TransactionLedger,
    Q: TaskQueue,
{
    let processors = Arc::new(processors);
    let registry = Arc::new(HealthRegistry::new(config.health_failing_ttl));
    let cancel = CancellationToken::new();
    let checker = config.health_checks.then(|| {
        start_health_checker(
            Arc::clone(&processors),
            Arc::clone(&registry),
            config.health_check_interval,
            cancel.child_token(),
        )
    });
    let context = WorkerContext::new(processors, registry, config.decision, Arc::clone(&queue), Arc::clone(&ledger));
    let pool = WorkerPool::start(config.workers, context)
        .await
        .map_err(|e| ServerError::InitializeError(format!("Could not start the payment workers. {e}")))?;

    let api = PaymentRelayApi::new(ledger, queue);
    let result = match create_server_instance(&config, api) {
        Ok(srv) => srv.await.map_err(|e| ServerError::Unspecified(e.to_string())),
        Err(e) => Err(e),
    };

    info!("🚀️ Shutting down the payment relay");
    cancel.cancel();
    if let Some(checker) = checker {
        if let Err(e) = checker.await {
            warn!("🩺️ The health checker did not stop cleanly. {e}");
        }
    }
    match pool.shutdown().await {
        Ok(0) => info!("🚀️ All payments were handed off before shutdown"),
        Ok(n) => info!("🚀️ {n} payments are still queued and will be delivered on the next start"),
        Err(e) => error!("🚀️ Could not return unfinished payments to the queue. {e}"),
    }
    result
}

pub fn create_server_instance<L, Q>(config: &ServerConfig, api: PaymentRelayApi<L, Q>) -> Result<Server, ServerError>
where
    L: TransactionLedger,
    Q: TaskQueue,
{
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("relay::access_log"))
            .app_data(web::Data::new(api.clone()))
            .app_data(json_config())
            .app_data(query_config())
            .service(health)
            .service(PaymentsRoute::<L, Q>::new())
            .service(PaymentsSummaryRoute::<L, Q>::new())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
