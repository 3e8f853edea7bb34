use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cache;
mod config;
mod consumer;
mod error;
mod http;
mod metrics;
mod models;
mod repository;
mod store;

use cache::OrderCache;
use config::Config;
use consumer::OrderConsumer;
use metrics::Metrics;
use store::{OrderBackend, OrderStore};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Structured logging with environment-based filtering.
    // Override with RUST_LOG, e.g. RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,orderhub=debug")),
        )
        .init();

    tracing::info!("🚀 Starting orderhub");

    let config = Config::from_env()?;

    // === 1. Database ===
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run migrations")?;
    tracing::info!("database ready");

    let store: Arc<dyn OrderBackend> = Arc::new(OrderStore::new(pool.clone()));
    let cache = Arc::new(OrderCache::new());
    let metrics = Arc::new(Metrics::new()?);

    // === 2. Warm the cache before accepting any traffic ===
    let loaded = cache.bulk_load(store.as_ref()).await?;
    metrics.cache_orders.set(loaded as i64);

    // === 3. Ingestion pipeline ===
    let shutdown = CancellationToken::new();
    let pipeline = OrderConsumer::new(&config, store, cache.clone(), metrics.clone())?;
    let mut pipeline_task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { pipeline.run(shutdown).await }
    });

    // === 4. HTTP lookup front-end ===
    let state = Arc::new(http::AppState {
        cache,
        metrics,
    });
    let server = http::build_server(state, config.http_port)?;
    let server_handle = server.handle();
    let server_task = tokio::spawn(server);
    tracing::info!(port = config.http_port, "HTTP server listening");

    // === 5. Supervise: run until SIGINT or a fatal pipeline error ===
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
        result = &mut pipeline_task => {
            match result {
                Ok(Ok(())) => tracing::info!("ingestion pipeline exited"),
                Ok(Err(e)) => tracing::error!(error = %e, "ingestion pipeline failed"),
                Err(e) => tracing::error!(error = %e, "ingestion pipeline panicked"),
            }
        }
    }

    // === 6. Orderly shutdown: stop reads, drain the pipeline, release
    // connections. The in-flight message may finish its transaction within
    // the grace period; past that the task is aborted and the write counts
    // as uncommitted. ===
    let stop_reads = server_handle.stop(true);
    shutdown.cancel();
    stop_reads.await;

    if !pipeline_task.is_finished() {
        match tokio::time::timeout(config.shutdown_grace, &mut pipeline_task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => tracing::error!(error = %e, "pipeline error during drain"),
            Ok(Err(e)) => tracing::error!(error = %e, "pipeline panicked during drain"),
            Err(_) => {
                tracing::warn!("pipeline did not drain within grace period, aborting");
                pipeline_task.abort();
            }
        }
    }

    let _ = server_task.await;
    pool.close().await;

    tracing::info!("shutdown complete");
    Ok(())
}
