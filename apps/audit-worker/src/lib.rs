//! Audit Worker Service
//!
//! A background worker that persists every appointment change event into the
//! append-only audit log.
//!
//! ## Architecture
//!
//! ```text
//! Redis Streams (clinicboard:appointments:audit:{0..2})
//!   ↓ (Consumer Group: audit-consumer-group)
//! StreamWorker<AuditEvent, AuditIngestProcessor>
//!   ↓ (idempotent ingestion keyed by event id)
//! AuditService<PgAuditLogRepository>
//!   ↓
//! PostgreSQL (audit_logs)
//! ```
//!
//! ## Features
//!
//! - Consumer group support for horizontal scaling
//! - One sequential task per partition, so each appointment's history is
//!   ingested in publish order
//! - Replayed events are acknowledged without a second row
//! - Dead letter queue for events that exhaust their delivery attempts
//! - Graceful shutdown handling
//! - Health check endpoint for Kubernetes probes

use axum::Router;
use core_config::{Environment, FromEnv, app_info};
use database::{
    postgres::{PostgresConfig, connect_from_config_with_retry, run_migrations},
    redis::RedisConfig,
};
use domain_appointments::{AuditEvent, AuditStream};
use domain_audit::{AuditIngestProcessor, AuditService, PgAuditLogRepository};
use event_stream::{HealthState, StreamWorker, WorkerConfig, admin_router, metrics};
use eyre::{Result, WrapErr};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

/// Start the health and admin HTTP server
///
/// Provides endpoints for:
/// - Liveness probes: `/health`
/// - Readiness probes: `/ready`
/// - Per-partition stream info: `/streams`
/// - Prometheus metrics: `/metrics`
/// - DLQ admin: `/dlq/*`
async fn start_health_server(health_state: HealthState, port: u16) -> Result<()> {
    // admin_router includes both the health and the DLQ admin endpoints
    let app: Router = admin_router(health_state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("Failed to bind health server to {}", addr))?;

    info!(port = %port, "Health and admin server listening");

    axum::serve(listener, app)
        .await
        .wrap_err("Health server failed")?;

    Ok(())
}

/// Run the audit worker
///
/// This is the main entry point for the worker. It:
/// 1. Sets up structured logging (env-aware: JSON for prod, pretty for dev)
/// 2. Connects to PostgreSQL and applies pending migrations
/// 3. Connects to Redis for stream processing
/// 4. Starts the worker with graceful shutdown handling
///
/// # Errors
///
/// Returns an error if:
/// - PostgreSQL configuration is invalid
/// - PostgreSQL connection or migration fails
/// - Redis configuration is invalid
/// - Redis connection fails
/// - Worker encounters a fatal error
pub async fn run() -> Result<()> {
    // Initialize tracing (env-aware: JSON for prod, pretty for dev)
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    // Initialize Prometheus metrics
    metrics::init_metrics();

    // App info for health endpoint
    let app_info = app_info!();

    info!(name = %app_info.name, version = %app_info.version, "Starting audit worker service");
    info!("Environment: {:?}", environment);

    // Health server port (default 8082)
    // Checks AUDIT_WORKER_HEALTH_PORT first, then HEALTH_PORT, then default
    let health_port: u16 = std::env::var("AUDIT_WORKER_HEALTH_PORT")
        .or_else(|_| std::env::var("HEALTH_PORT"))
        .unwrap_or_else(|_| "8082".to_string())
        .parse()
        .unwrap_or(8082);

    // Load PostgreSQL configuration from environment
    let pg_config =
        PostgresConfig::from_env().wrap_err("Failed to load PostgreSQL configuration")?;

    // Connect to PostgreSQL with retry logic
    info!("Connecting to PostgreSQL...");
    let db = connect_from_config_with_retry(pg_config, None)
        .await
        .wrap_err("Failed to connect to PostgreSQL")?;
    info!("Connected to PostgreSQL successfully");

    // The worker owns the audit_logs schema, so it applies migrations on boot
    run_migrations::<migration::Migrator>(&db, app_info.name)
        .await
        .wrap_err("Failed to run database migrations")?;

    // Load Redis configuration from the environment
    let redis_config = RedisConfig::from_env().wrap_err("Failed to load Redis configuration")?;

    // Connect to Redis with retry logic
    info!("Connecting to Redis...");
    let redis = database::redis::connect_from_config_with_retry(redis_config, None)
        .await
        .wrap_err("Failed to connect to Redis")?;
    info!("Connected to Redis successfully");

    // Create worker configuration from the AuditStream definition
    let worker_config = WorkerConfig::from_stream_def::<AuditStream>();
    info!(
        stream_base = %worker_config.stream_base,
        consumer_group = %worker_config.consumer_group,
        consumer_id = %worker_config.consumer_id,
        partitions = %worker_config.partitions,
        max_deliveries = %worker_config.max_deliveries,
        "Worker configuration loaded"
    );

    // Create the audit repository, service, and processor
    let repository = PgAuditLogRepository::new(db);
    let service = AuditService::new(repository);
    let processor = AuditIngestProcessor::new(service);
    info!("Audit ingest processor initialized");

    // Set up a shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Spawn shutdown signal handler
    tokio::spawn(async move {
        if let Err(e) = shutdown_signal().await {
            error!("Error waiting for shutdown signal: {}", e);
        }
        let _ = shutdown_tx.send(true);
    });

    // Create a health state
    let health_state = HealthState::new(
        redis.clone(),
        app_info.name,
        app_info.version,
        &worker_config,
    );

    // Start health server in background
    tokio::spawn(async move {
        if let Err(e) = start_health_server(health_state, health_port).await {
            error!(error = %e, "Health server failed");
        }
    });

    // Run the worker
    info!("Starting audit event processor...");
    let worker = StreamWorker::<AuditEvent, _>::new(redis, processor, worker_config);
    worker
        .run(shutdown_rx)
        .await
        .map_err(|e| eyre::eyre!("{}", e))?;

    info!("Audit worker service stopped");
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        },
    }

    Ok(())
}
