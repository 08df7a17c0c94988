//! Inlet webhook ingestion service.
//!
//! Main entry point for the inlet server. Loads configuration, prepares
//! the database, registers webhook sources, and runs the HTTP intake API
//! alongside the background worker pool.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use inlet_api::{start_server, AppState, Config};
use inlet_core::{
    registry::{SourceRegistration, SourceRegistry},
    store::PostgresEventStore,
    time::RealClock,
    verify::Verifier,
};
use inlet_queue::{
    queue::PostgresTaskQueue,
    tasks::{GithubTask, StripeTask},
    worker_pool::WorkerPool,
};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    init_tracing(&config.rust_log);

    info!("Starting inlet webhook service");
    info!(
        database_url = %config.database_url_masked(),
        host = %config.host,
        port = config.port,
        workers = config.worker_pool_size,
        "Configuration loaded"
    );

    let db_pool = create_database_pool(&config).await?;
    info!("Database connection pool established");

    run_migrations(&db_pool).await?;
    info!("Database migrations completed");

    let store = Arc::new(PostgresEventStore::new(db_pool.clone()));
    let queue = Arc::new(PostgresTaskQueue::new(db_pool.clone()));
    let clock = Arc::new(RealClock::new());

    let registry = Arc::new(build_registry(&config, store.clone())?);
    info!(sources = ?registry.source_names(), "Webhook sources registered");

    let mut worker_pool = WorkerPool::new(
        queue.clone(),
        registry.clone(),
        config.to_worker_config(),
        CancellationToken::new(),
        clock.clone(),
    );
    worker_pool.spawn_workers().await;
    info!(workers = config.worker_pool_size, "Worker pool started");

    let state = AppState { registry, queue, store, clock };
    let addr = config.parse_server_addr()?;
    let request_timeout = Duration::from_secs(config.request_timeout);

    info!(%addr, "Inlet is ready to receive webhooks");
    start_server(state, addr, request_timeout).await.context("HTTP server failed")?;

    info!("HTTP server stopped, draining workers");
    worker_pool
        .shutdown_graceful(Duration::from_secs(config.worker_shutdown_timeout))
        .await
        .context("Worker pool shutdown failed")?;

    db_pool.close().await;
    info!("Database connections closed");

    info!("Inlet shutdown complete");
    Ok(())
}

/// Initializes tracing with environment-based configuration.
fn init_tracing(default_filter: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer().with_target(true).with_file(true).with_line_number(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}

/// Builds the source registry wiring each webhook source to its verifier
/// and processing task.
///
/// Registration happens once at startup; a duplicate source name is a
/// configuration bug and fails the boot.
fn build_registry(config: &Config, store: Arc<PostgresEventStore>) -> Result<SourceRegistry> {
    let registry = SourceRegistry::build(vec![
        SourceRegistration::new(
            "github",
            Verifier::HmacSha256 {
                secret: config.github_webhook_secret.clone(),
                header: "x-hub-signature-256".to_string(),
            },
            Arc::new(GithubTask::new(store.clone())),
        ),
        SourceRegistration::new(
            "stripe",
            Verifier::TokenPresence { header: "stripe-signature".to_string() },
            Arc::new(StripeTask::new(store)),
        ),
    ])
    .context("Failed to build source registry")?;

    Ok(registry)
}

/// Creates the database connection pool with retry logic.
async fn create_database_pool(config: &Config) -> Result<sqlx::PgPool> {
    let mut retries = 0;
    const MAX_RETRIES: u32 = 5;
    const RETRY_DELAY: Duration = Duration::from_secs(2);

    loop {
        match PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connection_timeout))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => {
                sqlx::query("SELECT 1")
                    .fetch_one(&pool)
                    .await
                    .context("Failed to verify database connection")?;

                return Ok(pool);
            },
            Err(_e) if retries < MAX_RETRIES => {
                retries += 1;
                info!(
                    attempt = retries,
                    max_retries = MAX_RETRIES,
                    "Database connection failed, retrying..."
                );
                tokio::time::sleep(RETRY_DELAY).await;
            },
            Err(e) => {
                return Err(e).context("Failed to create database connection pool after retries");
            },
        }
    }
}

/// Runs database migrations.
async fn run_migrations(pool: &sqlx::PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS events (
            id BIGSERIAL PRIMARY KEY,
            source TEXT NOT NULL,
            payload JSONB NOT NULL,
            received_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create events table")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS work_items (
            id UUID PRIMARY KEY,
            task TEXT NOT NULL,
            payload JSONB NOT NULL,
            attempt_count INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'pending',
            next_attempt_at TIMESTAMPTZ,
            enqueued_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            completed_at TIMESTAMPTZ,
            failure_reason TEXT
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create work_items table")?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_work_items_claimable
        ON work_items(status, next_attempt_at, enqueued_at)
        WHERE status = 'pending'
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create work_items claim index")?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_events_source
        ON events(source, received_at DESC)
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create events source index")?;

    Ok(())
}
