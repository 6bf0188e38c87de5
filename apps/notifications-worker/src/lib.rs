//! Notifications Worker Service
//!
//! A background worker that turns appointment events into patient facing
//! notifications.
//!
//! ## Architecture
//!
//! ```text
//! Redis Streams (clinicboard:appointments:events:{0..2})
//!   ↓ (Consumer Group: notification-consumer-group)
//! StreamWorker<NotificationEvent, NotificationProcessor>
//!   ↓ (SCHEDULED and REMINDER payloads)
//! NotificationSink (log channel)
//! ```
//!
//! ## Features
//!
//! - Consumer group support for horizontal scaling
//! - One sequential task per partition, so one appointment's notifications
//!   go out in publish order
//! - Sink failures are logged and dropped, never redelivered
//! - Graceful shutdown handling
//! - Health check endpoint for Kubernetes probes

use axum::Router;
use core_config::{Environment, FromEnv, app_info};
use database::redis::RedisConfig;
use domain_appointments::{NotificationEvent, NotificationStream};
use domain_notifications::{LogNotificationSink, NotificationProcessor};
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

/// Run the notifications worker
///
/// This is the main entry point for the worker. It:
/// 1. Sets up structured logging (env-aware: JSON for prod, pretty for dev)
/// 2. Connects to Redis for stream processing
/// 3. Starts the worker with graceful shutdown handling
///
/// # Errors
///
/// Returns an error if:
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

    info!(name = %app_info.name, version = %app_info.version, "Starting notifications worker service");
    info!("Environment: {:?}", environment);

    // Health server port (default 8083)
    // Checks NOTIFICATIONS_WORKER_HEALTH_PORT first, then HEALTH_PORT, then default
    let health_port: u16 = std::env::var("NOTIFICATIONS_WORKER_HEALTH_PORT")
        .or_else(|_| std::env::var("HEALTH_PORT"))
        .unwrap_or_else(|_| "8083".to_string())
        .parse()
        .unwrap_or(8083);

    // Load Redis configuration from the environment
    let redis_config = RedisConfig::from_env().wrap_err("Failed to load Redis configuration")?;

    // Connect to Redis with retry logic
    info!("Connecting to Redis...");
    let redis = database::redis::connect_from_config_with_retry(redis_config, None)
        .await
        .wrap_err("Failed to connect to Redis")?;
    info!("Connected to Redis successfully");

    // Create worker configuration from the NotificationStream definition
    let worker_config = WorkerConfig::from_stream_def::<NotificationStream>();
    info!(
        stream_base = %worker_config.stream_base,
        consumer_group = %worker_config.consumer_group,
        consumer_id = %worker_config.consumer_id,
        partitions = %worker_config.partitions,
        max_deliveries = %worker_config.max_deliveries,
        "Worker configuration loaded"
    );

    // Create the notification sink and processor
    let processor = NotificationProcessor::new(LogNotificationSink);
    info!("Notification processor initialized");

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
    info!("Starting notification event processor...");
    let worker = StreamWorker::<NotificationEvent, _>::new(redis, processor, worker_config);
    worker
        .run(shutdown_rx)
        .await
        .map_err(|e| eyre::eyre!("{}", e))?;

    info!("Notifications worker service stopped");
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
