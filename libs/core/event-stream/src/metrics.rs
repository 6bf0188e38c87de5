//! Prometheus metrics for the stream pipeline.

use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::info;

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Initialize Prometheus metrics.
///
/// Call once at startup. Subsequent calls are no-ops.
pub fn init_metrics() {
    let _ = PROMETHEUS_HANDLE.get_or_init(|| {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("Failed to install Prometheus recorder");
        info!("Prometheus metrics initialized");
        handle
    });
}

/// Get the Prometheus handle for rendering metrics.
pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

/// Render metrics in Prometheus exposition format.
pub fn render_metrics() -> String {
    prometheus_handle().map(|h| h.render()).unwrap_or_default()
}

/// Count a publish outcome (`delivered` or `dead_lettered`).
pub fn record_publish(stream: &str, outcome: &str) {
    counter!(
        "event_stream_publish_total",
        "stream" => stream.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Count a circuit breaker transition.
pub fn record_breaker_transition(breaker: &str, state: &str) {
    counter!(
        "event_stream_breaker_transitions_total",
        "breaker" => breaker.to_string(),
        "state" => state.to_string()
    )
    .increment(1);
}

/// Per-worker metrics helper.
#[derive(Clone)]
pub struct StreamMetrics {
    /// Stream base name for labeling.
    stream_base: String,
    /// Processor name for labeling.
    processor_name: String,
}

impl StreamMetrics {
    pub fn new(stream_base: impl Into<String>, processor_name: impl Into<String>) -> Self {
        Self {
            stream_base: stream_base.into(),
            processor_name: processor_name.into(),
        }
    }

    /// Record a message being picked up.
    pub fn message_received(&self) {
        counter!(
            "event_stream_messages_received_total",
            "stream" => self.stream_base.clone(),
            "processor" => self.processor_name.clone()
        )
        .increment(1);
    }

    /// Record a message processed successfully.
    pub fn message_processed(&self, duration: Duration) {
        counter!(
            "event_stream_messages_processed_total",
            "stream" => self.stream_base.clone(),
            "processor" => self.processor_name.clone(),
            "status" => "success"
        )
        .increment(1);

        histogram!(
            "event_stream_processing_duration_seconds",
            "stream" => self.stream_base.clone(),
            "processor" => self.processor_name.clone()
        )
        .record(duration.as_secs_f64());
    }

    /// Record a processing failure.
    pub fn message_failed(&self, category: &str) {
        counter!(
            "event_stream_messages_processed_total",
            "stream" => self.stream_base.clone(),
            "processor" => self.processor_name.clone(),
            "status" => "failed"
        )
        .increment(1);

        counter!(
            "event_stream_errors_total",
            "stream" => self.stream_base.clone(),
            "processor" => self.processor_name.clone(),
            "category" => category.to_string()
        )
        .increment(1);
    }

    /// Record a message parked on the dead letter stream.
    pub fn message_parked(&self) {
        counter!(
            "event_stream_messages_parked_total",
            "stream" => self.stream_base.clone(),
            "processor" => self.processor_name.clone()
        )
        .increment(1);
    }

    /// Record entries claimed from dead consumers.
    pub fn messages_claimed(&self, count: usize) {
        counter!(
            "event_stream_messages_claimed_total",
            "stream" => self.stream_base.clone(),
            "processor" => self.processor_name.clone()
        )
        .increment(count as u64);
    }

    /// Update the depth gauge for one partition stream.
    pub fn stream_depth(&self, partition: u32, depth: i64) {
        gauge!(
            "event_stream_depth",
            "stream" => self.stream_base.clone(),
            "partition" => partition.to_string()
        )
        .set(depth as f64);
    }

    /// Update the pending gauge for one partition stream.
    pub fn pending(&self, partition: u32, count: i64) {
        gauge!(
            "event_stream_pending",
            "stream" => self.stream_base.clone(),
            "partition" => partition.to_string()
        )
        .set(count as f64);
    }
}
