//! Worker configuration.

use uuid::Uuid;

use crate::registry::StreamDef;

/// Configuration for a partitioned stream worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Base stream name. Partitions are `{stream_base}:{partition}`.
    pub stream_base: String,
    /// Consumer group name.
    pub consumer_group: String,
    /// Consumer name within the group. Unique per worker instance so
    /// abandoned entries can be told apart from our own.
    pub consumer_id: String,
    /// Dead letter stream name.
    pub dlq_stream: String,
    /// Partition count. Must match the producer side.
    pub partitions: u32,
    /// Approximate cap on the dead letter stream.
    pub dlq_max_length: i64,
    /// Max entries fetched per read.
    pub batch_size: usize,
    /// Sleep between polls while a partition is idle.
    pub poll_interval_ms: u64,
    /// Deliveries (or consecutive failures) after which an entry is parked.
    pub max_deliveries: u32,
    /// How often to look for entries abandoned by dead consumers.
    pub claim_interval_secs: u64,
    /// Minimum idle time before an abandoned entry is claimed.
    pub claim_min_idle_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            stream_base: "events".to_string(),
            consumer_group: "workers".to_string(),
            consumer_id: default_consumer_id(),
            dlq_stream: "events:dlq".to_string(),
            partitions: 3,
            dlq_max_length: 10_000,
            batch_size: 10,
            poll_interval_ms: 1000,
            max_deliveries: 5,
            claim_interval_secs: 60,
            claim_min_idle_ms: 30_000,
        }
    }
}

impl WorkerConfig {
    /// Create a config for the given stream and group, with the DLQ stream
    /// derived as `{stream_base}:dlq`.
    pub fn new(stream_base: impl Into<String>, consumer_group: impl Into<String>) -> Self {
        let stream_base = stream_base.into();
        Self {
            dlq_stream: format!("{stream_base}:dlq"),
            stream_base,
            consumer_group: consumer_group.into(),
            ..Self::default()
        }
    }

    /// Create a config from a stream definition.
    pub fn from_stream_def<S: StreamDef>() -> Self {
        Self {
            stream_base: S::STREAM_BASE.to_string(),
            consumer_group: S::CONSUMER_GROUP.to_string(),
            dlq_stream: S::DLQ_STREAM.to_string(),
            partitions: S::PARTITIONS.max(1),
            ..Self::default()
        }
    }

    pub fn with_consumer_id(mut self, consumer_id: impl Into<String>) -> Self {
        self.consumer_id = consumer_id.into();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_poll_interval_ms(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    pub fn with_max_deliveries(mut self, max_deliveries: u32) -> Self {
        self.max_deliveries = max_deliveries.max(1);
        self
    }

    pub fn with_claim_interval_secs(mut self, claim_interval_secs: u64) -> Self {
        self.claim_interval_secs = claim_interval_secs;
        self
    }

    pub fn with_claim_min_idle_ms(mut self, claim_min_idle_ms: u64) -> Self {
        self.claim_min_idle_ms = claim_min_idle_ms;
        self
    }

    pub fn with_dlq_max_length(mut self, dlq_max_length: i64) -> Self {
        self.dlq_max_length = dlq_max_length;
        self
    }
}

fn default_consumer_id() -> String {
    format!("worker-{}", Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AppointmentStream;

    impl StreamDef for AppointmentStream {
        const STREAM_BASE: &'static str = "appointments:events";
        const CONSUMER_GROUP: &'static str = "appointment-workers";
        const DLQ_STREAM: &'static str = "appointments:events:dlq";
    }

    #[test]
    fn test_from_stream_def() {
        let config = WorkerConfig::from_stream_def::<AppointmentStream>();
        assert_eq!(config.stream_base, "appointments:events");
        assert_eq!(config.consumer_group, "appointment-workers");
        assert_eq!(config.dlq_stream, "appointments:events:dlq");
        assert_eq!(config.partitions, 3);
        assert_eq!(config.max_deliveries, 5);
    }

    #[test]
    fn test_new_derives_dlq_stream() {
        let config = WorkerConfig::new("billing:events", "billing-workers");
        assert_eq!(config.dlq_stream, "billing:events:dlq");
        assert_eq!(config.stream_base, "billing:events");
    }

    #[test]
    fn test_consumer_ids_are_unique() {
        let a = WorkerConfig::from_stream_def::<AppointmentStream>();
        let b = WorkerConfig::from_stream_def::<AppointmentStream>();
        assert_ne!(a.consumer_id, b.consumer_id);
        assert!(a.consumer_id.starts_with("worker-"));
    }

    #[test]
    fn test_builders() {
        let config = WorkerConfig::from_stream_def::<AppointmentStream>()
            .with_consumer_id("worker-test")
            .with_batch_size(25)
            .with_max_deliveries(2)
            .with_poll_interval_ms(100)
            .with_claim_interval_secs(5)
            .with_claim_min_idle_ms(500)
            .with_dlq_max_length(99);
        assert_eq!(config.consumer_id, "worker-test");
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.max_deliveries, 2);
        assert_eq!(config.poll_interval_ms, 100);
        assert_eq!(config.claim_interval_secs, 5);
        assert_eq!(config.claim_min_idle_ms, 500);
        assert_eq!(config.dlq_max_length, 99);
    }

    #[test]
    fn test_batch_size_and_deliveries_floor_at_one() {
        let config = WorkerConfig::default()
            .with_batch_size(0)
            .with_max_deliveries(0);
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.max_deliveries, 1);
    }
}
