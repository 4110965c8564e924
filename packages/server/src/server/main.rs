// Main entry point: health endpoint, outbox worker, graceful drain

use std::sync::Arc;
use std::time::Duration;

use adoption_core::kernel::{JobWorker, JobWorkerConfig, PostgresJobQueue};
use adoption_core::server::{build_app, build_deps, build_registry, AppState};
use adoption_core::Config;
use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,adoption_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting shelter adoption server");

    let config = Config::from_env().context("Failed to load configuration")?;

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let queue = Arc::new(PostgresJobQueue::new(pool.clone()));
    let deps = build_deps(&config, pool.clone(), queue.clone())?;
    let registry = Arc::new(build_registry(&deps));

    let shutdown = CancellationToken::new();

    let worker_config = JobWorkerConfig {
        poll_interval: Duration::from_millis(config.worker_poll_interval_ms),
        ..JobWorkerConfig::default()
    };
    let worker = JobWorker::with_config(queue, registry, worker_config);
    let worker_handle = tokio::spawn(worker.run(shutdown.clone()));

    let app = build_app(AppState {
        db_pool: pool,
        deps: deps.clone(),
    });

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Health check: http://localhost:{}/health", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown signal received");
            signal.cancel();
        })
        .await
        .context("Server error")?;

    shutdown.cancel();
    if let Err(e) = worker_handle.await {
        tracing::error!(error = %e, "Job worker panicked");
    }

    tracing::info!("Draining background tasks...");
    deps.drain_background().await;
    tracing::info!("Shutdown complete");

    Ok(())
}
