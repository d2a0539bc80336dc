//! bunkhouse - reservation backend for shared sleeping accommodations
//!
//! Bookings and accommodations are event sourced; queries are served from
//! read models kept up to date by projections.

use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bunkhouse::handlers::LogNotifier;
use bunkhouse::{api, db, Config, Services, Settings, Stores};

/// Initialize tracing/logging
fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "bunkhouse=debug,tower_http=debug".into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;
    init_tracing(config.is_production());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("Starting bunkhouse server");
    tracing::info!("Connecting to database...");

    // Create database pool
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    db::run_migrations(&pool).await?;
    if !db::check_schema(&pool).await? {
        tracing::error!("Database schema is not complete. Please run migrations.");
        return Err(anyhow::anyhow!("Database schema incomplete"));
    }
    tracing::info!("Database connected successfully");

    let services = Services::build(
        Stores::postgres(pool.clone()),
        &Settings::from(&config),
        Arc::new(LogNotifier),
    );

    if config.migrate_on_startup && services.migration.is_migration_required().await? {
        let report = services.migration.migrate().await?;
        if !report.is_complete() {
            tracing::warn!(
                failed = report.failures.len(),
                "Legacy migration incomplete, serving migrated data only"
            );
        }
    }

    // Repair read models that lag behind the event store
    match services.catch_up().await {
        Ok(report) if !report.failed.is_empty() => tracing::warn!(
            applied = report.applied,
            failed = report.failed.len(),
            "Some read models are still behind the event store"
        ),
        Ok(report) if report.applied > 0 => {
            tracing::info!(applied = report.applied, "Read models caught up")
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "Read model catch-up skipped"),
    }
    services.warm_up().await?;

    tracing::info!("Listening on http://{}", addr);

    // Build router and start server
    let app = api::build_router(services);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Cleanup
    tracing::info!("Server shutting down...");
    pool.close().await;
    tracing::info!("Database connections closed. Goodbye!");

    Ok(())
}

/// Shutdown signal handler for graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}
