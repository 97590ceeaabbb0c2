//! FileWorks background file processing service
//!
//! Main entry point that wires the crates together and runs the worker pool
//! and maintenance scheduler until shutdown.

use std::sync::Arc;

use tokio::sync::watch;
use tracing;
use tracing_subscriber::{EnvFilter, fmt};

use fileworks_core::config::AppConfig;
use fileworks_core::error::AppError;
use fileworks_core::traits::storage::StorageProvider;
use fileworks_database::DatabasePool;
use fileworks_database::repositories::{FileRepository, JobRepository};
use fileworks_worker::jobs::ProcessFileJobHandler;
use fileworks_worker::{
    CronScheduler, JobExecutor, JobQueue, Maintenance, ProcessingPipeline, StatusSynchronizer,
    WorkerPool,
};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Service error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from files and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("FILEWORKS_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main service run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting FileWorks v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Database connection + migrations ─────────────────
    tracing::info!("Connecting to database...");
    let db = DatabasePool::connect(&config.database).await?;

    fileworks_database::migration::run_migrations(db.pool()).await?;

    // ── Step 2: Storage provider ─────────────────────────────────
    tracing::info!(
        "Initializing storage (provider: {})...",
        config.storage.provider
    );
    let storage = fileworks_storage::build_provider(&config.storage).await?;
    if !storage.health_check().await? {
        return Err(AppError::service_unavailable(
            "Storage provider failed its health check",
        ));
    }

    // ── Step 3: Repositories, queue, status sync ─────────────────
    let file_repo = Arc::new(FileRepository::new(db.pool().clone()));
    let job_repo = Arc::new(JobRepository::new(db.pool().clone()));
    let queue = Arc::new(JobQueue::new(job_repo, &config.worker));
    let status = Arc::new(StatusSynchronizer::new(file_repo));

    match queue.stats().await {
        Ok(stats) => tracing::info!(
            waiting = stats.waiting,
            active = stats.active,
            failed_retryable = stats.failed_retryable,
            "Job queue ready"
        ),
        Err(e) => tracing::warn!(error = %e, "Could not read queue statistics"),
    }

    if !config.worker.enabled {
        tracing::info!("Background worker disabled; nothing to run");
        db.close().await;
        return Ok(());
    }

    // ── Step 4: Worker pool ──────────────────────────────────────
    let pipeline = Arc::new(ProcessingPipeline::new(
        Arc::clone(&storage),
        config.processing.clone(),
    ));
    let mut executor = JobExecutor::new();
    executor.register(Arc::new(ProcessFileJobHandler::new(pipeline)));

    let pool = Arc::new(WorkerPool::new(
        Arc::clone(&queue),
        Arc::new(executor),
        Arc::clone(&status),
        config.worker.clone(),
    ));

    // ── Step 5: Maintenance schedule ─────────────────────────────
    let maintenance = Arc::new(Maintenance::new(
        Arc::clone(&queue),
        Arc::clone(&status),
        config.worker.retention(),
    ));
    let scheduler = CronScheduler::new(maintenance).await?;
    scheduler.register_default_tasks(&config.worker).await?;
    scheduler.start().await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pool_handle = tokio::spawn(Arc::clone(&pool).run(shutdown_rx));
    tracing::info!("Background worker started");

    // ── Step 6: Graceful shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown...");
    let _ = shutdown_tx.send(true);

    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!(error = %e, "Scheduler shutdown failed");
    }
    if let Err(e) = pool_handle.await {
        tracing::error!(error = %e, "Worker pool task failed");
    }

    db.close().await;
    tracing::info!("FileWorks shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
