//! Health and admin endpoints for stream workers.
//!
//! Workers are headless; this module gives each one a small HTTP surface
//! for liveness, readiness, per-partition stream info, Prometheus metrics,
//! and dead letter inspection and replay.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use redis::aio::ConnectionManager;
use serde::Deserialize;
use serde_json::json;

use crate::config::WorkerConfig;
use crate::consumer::StreamConsumer;
use crate::dlq::DlqManager;
use crate::metrics;

/// Shared state for worker health and admin endpoints.
#[derive(Clone)]
pub struct HealthState {
    redis: Arc<ConnectionManager>,
    app_name: String,
    app_version: String,
    stream_base: String,
    consumer_group: String,
    partitions: u32,
    dlq_stream: String,
}

impl HealthState {
    pub fn new(
        redis: ConnectionManager,
        app_name: impl Into<String>,
        app_version: impl Into<String>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            redis: Arc::new(redis),
            app_name: app_name.into(),
            app_version: app_version.into(),
            stream_base: config.stream_base.clone(),
            consumer_group: config.consumer_group.clone(),
            partitions: config.partitions,
            dlq_stream: config.dlq_stream.clone(),
        }
    }

    fn dlq_manager(&self) -> DlqManager {
        DlqManager::new(Arc::clone(&self.redis), &self.dlq_stream)
    }

    /// Read-only consumer used for stream introspection.
    fn consumer_for(&self, partition: u32) -> StreamConsumer {
        StreamConsumer::new(
            (*self.redis).clone(),
            format!("{}:{}", self.stream_base, partition),
            &self.consumer_group,
            "health",
        )
    }
}

/// Liveness, readiness, stream info, and Prometheus metrics.
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/streams", get(streams_info))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
}

/// Dead letter inspection and replay endpoints.
pub fn dlq_admin_router(state: HealthState) -> Router {
    Router::new()
        .route("/dlq", get(dlq_stats).delete(dlq_purge))
        .route("/dlq/messages", get(dlq_list))
        .route("/dlq/messages/{id}", delete(dlq_archive))
        .route("/dlq/messages/{id}/reprocess", post(dlq_reprocess))
        .route("/dlq/reprocess", post(dlq_reprocess_batch))
        .with_state(state)
}

/// Everything a worker exposes on its admin port.
pub fn admin_router(state: HealthState) -> Router {
    health_router(state.clone()).merge(dlq_admin_router(state))
}

async fn health(State(state): State<HealthState>) -> Response {
    Json(json!({
        "status": "ok",
        "name": state.app_name,
        "version": state.app_version,
    }))
    .into_response()
}

async fn ready(State(state): State<HealthState>) -> Response {
    let mut conn = (*state.redis).clone();
    match redis::cmd("PING").query_async::<String>(&mut conn).await {
        Ok(_) => (StatusCode::OK, Json(json!({ "status": "ready" }))).into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not ready", "error": e.to_string() })),
        )
            .into_response(),
    }
}

async fn streams_info(State(state): State<HealthState>) -> Response {
    let mut partitions = Vec::with_capacity(state.partitions as usize);
    for partition in 0..state.partitions {
        let consumer = state.consumer_for(partition);
        let length = consumer.stream_length().await.unwrap_or(0);
        let pending = consumer.pending_count().await.unwrap_or(0);
        partitions.push(json!({
            "stream": consumer.stream(),
            "partition": partition,
            "length": length,
            "pending": pending,
        }));
    }
    Json(json!({
        "stream_base": state.stream_base,
        "consumer_group": state.consumer_group,
        "partitions": partitions,
    }))
    .into_response()
}

async fn metrics_endpoint() -> Response {
    metrics::render_metrics().into_response()
}

async fn dlq_stats(State(state): State<HealthState>) -> Response {
    match state.dlq_manager().stats().await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

#[derive(Deserialize)]
struct ListParams {
    limit: Option<usize>,
}

async fn dlq_list(State(state): State<HealthState>, Query(params): Query<ListParams>) -> Response {
    let limit = params.limit.unwrap_or(10).min(100);
    match state.dlq_manager().list(limit).await {
        Ok(records) => Json(records).into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

async fn dlq_archive(State(state): State<HealthState>, Path(id): Path<String>) -> Response {
    match state.dlq_manager().archive(&id).await {
        Ok(true) => Json(json!({ "archived": id })).into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "entry not found" })),
        )
            .into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

async fn dlq_purge(State(state): State<HealthState>) -> Response {
    match state.dlq_manager().purge().await {
        Ok(removed) => Json(json!({ "removed": removed })).into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

async fn dlq_reprocess(State(state): State<HealthState>, Path(id): Path<String>) -> Response {
    match state.dlq_manager().reprocess(&id).await {
        Ok(Some(new_id)) => Json(json!({ "requeued": new_id })).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "entry not found" })),
        )
            .into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

#[derive(Deserialize)]
struct ReprocessParams {
    count: Option<usize>,
}

async fn dlq_reprocess_batch(
    State(state): State<HealthState>,
    Query(params): Query<ReprocessParams>,
) -> Response {
    let count = params.count.unwrap_or(10).min(100);
    match state.dlq_manager().reprocess_oldest(count).await {
        Ok(requeued) => Json(json!({
            "requeued": requeued.len(),
            "entry_ids": requeued,
        }))
        .into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

fn internal_error(e: crate::error::StreamError) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.to_string() })),
    )
}
