//! Partition-aware stream producer.

use std::sync::Arc;

use redis::aio::ConnectionManager;
use tracing::debug;

use crate::error::StreamError;
use crate::registry::{StreamDef, StreamMessage, fnv1a64};

/// Appends messages to partition streams.
///
/// Each message's routing key is hashed to pick the partition, so one key
/// always lands on one stream. Partition count must match the consuming
/// worker or ordering guarantees silently break; building both sides from
/// the same [`StreamDef`] avoids that.
#[derive(Clone)]
pub struct StreamProducer {
    redis: Arc<ConnectionManager>,
    stream_base: String,
    partitions: u32,
    max_length: i64,
}

impl StreamProducer {
    pub fn new(redis: ConnectionManager, stream_base: impl Into<String>, partitions: u32) -> Self {
        Self::from_arc(Arc::new(redis), stream_base, partitions)
    }

    pub fn from_arc(
        redis: Arc<ConnectionManager>,
        stream_base: impl Into<String>,
        partitions: u32,
    ) -> Self {
        Self {
            redis,
            stream_base: stream_base.into(),
            partitions: partitions.max(1),
            max_length: 100_000,
        }
    }

    /// Build a producer from a stream definition.
    pub fn from_stream_def<S: StreamDef>(redis: ConnectionManager) -> Self {
        Self {
            redis: Arc::new(redis),
            stream_base: S::STREAM_BASE.to_string(),
            partitions: S::PARTITIONS.max(1),
            max_length: S::MAX_LENGTH,
        }
    }

    pub fn with_max_length(mut self, max_length: i64) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn stream_base(&self) -> &str {
        &self.stream_base
    }

    pub fn partition_for(&self, routing_key: &str) -> u32 {
        (fnv1a64(routing_key.as_bytes()) % u64::from(self.partitions)) as u32
    }

    pub fn stream_for(&self, routing_key: &str) -> String {
        format!("{}:{}", self.stream_base, self.partition_for(routing_key))
    }

    /// Append a message to its partition stream. Returns the entry id.
    pub async fn send<M: StreamMessage>(&self, message: &M) -> Result<String, StreamError> {
        let payload = serde_json::to_string(message)?;
        self.send_raw(message.routing_key(), &payload).await
    }

    /// Append an already serialized payload, routed by the given key.
    ///
    /// Used by the guarded publisher so the payload it retries and the
    /// payload it parks are the same bytes.
    pub async fn send_raw(&self, routing_key: &str, payload: &str) -> Result<String, StreamError> {
        let stream = self.stream_for(routing_key);
        let mut conn = (*self.redis).clone();
        let id: String = redis::cmd("XADD")
            .arg(&stream)
            .arg("MAXLEN")
            .arg("~")
            .arg(self.max_length)
            .arg("*")
            .arg("job")
            .arg(payload)
            .query_async(&mut conn)
            .await?;
        debug!(stream = %stream, entry_id = %id, "message appended");
        Ok(id)
    }
}
