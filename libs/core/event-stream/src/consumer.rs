//! Consumer-group reads over one partition stream.

use redis::aio::ConnectionManager;
use tracing::{debug, warn};

use crate::error::StreamError;

/// A raw entry as read from a partition stream, before decoding.
#[derive(Debug, Clone)]
pub struct RawEntry {
    /// Stream entry id (`{ms}-{seq}`).
    pub id: String,
    /// Serialized payload, taken from the entry's `job` field.
    pub payload: String,
    /// How many times the group has delivered this entry.
    pub delivery_count: u32,
}

impl RawEntry {
    /// Entry timestamp, taken from the id's millisecond prefix.
    pub fn timestamp(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        let ms = self.id.split('-').next()?.parse::<i64>().ok()?;
        chrono::DateTime::from_timestamp_millis(ms)
    }

    pub fn age_ms(&self) -> Option<i64> {
        self.timestamp()
            .map(|t| (chrono::Utc::now() - t).num_milliseconds())
    }

    pub fn is_redelivery(&self) -> bool {
        self.delivery_count > 1
    }
}

/// XREADGROUP reply: streams, each with (id, field-value pairs) entries.
type ReadReply = Vec<(String, Vec<(String, Vec<(String, String)>)>)>;

/// Reads entries from a single partition stream on behalf of a consumer
/// group.
///
/// Callers are expected to drain [`read_pending`](Self::read_pending) before
/// touching [`read_new`](Self::read_new); that is what keeps a partition
/// strictly ordered across retries and restarts.
#[derive(Clone)]
pub struct StreamConsumer {
    redis: ConnectionManager,
    stream: String,
    group: String,
    consumer_id: String,
}

impl StreamConsumer {
    pub fn new(
        redis: ConnectionManager,
        stream: impl Into<String>,
        group: impl Into<String>,
        consumer_id: impl Into<String>,
    ) -> Self {
        Self {
            redis,
            stream: stream.into(),
            group: group.into(),
            consumer_id: consumer_id.into(),
        }
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn consumer_id(&self) -> &str {
        &self.consumer_id
    }

    /// Create the consumer group if it does not exist yet.
    ///
    /// The group starts at id 0 so entries appended before the first worker
    /// came up are still consumed.
    pub async fn ensure_group(&self) -> Result<(), StreamError> {
        let mut conn = self.redis.clone();
        let created: Result<String, redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.stream)
            .arg(&self.group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;
        match created {
            Ok(_) => {
                debug!(stream = %self.stream, group = %self.group, "consumer group created");
                Ok(())
            }
            Err(e) if e.to_string().contains("BUSYGROUP") => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Read entries this consumer already owns but has not acknowledged,
    /// oldest first. Delivery counts are joined in from XPENDING.
    pub async fn read_pending(&self, count: usize) -> Result<Vec<RawEntry>, StreamError> {
        let mut entries = self.read_group("0", count).await?;
        if entries.is_empty() {
            return Ok(entries);
        }

        let counts = self.delivery_counts(entries.len()).await?;
        for entry in &mut entries {
            if let Some(&(_, count)) = counts.iter().find(|(id, _)| *id == entry.id) {
                entry.delivery_count = count;
            }
        }
        Ok(entries)
    }

    /// Read entries never delivered to any consumer in the group.
    pub async fn read_new(&self, count: usize) -> Result<Vec<RawEntry>, StreamError> {
        self.read_group(">", count).await
    }

    /// Acknowledge one entry, removing it from the pending list.
    pub async fn ack(&self, entry_id: &str) -> Result<(), StreamError> {
        let mut conn = self.redis.clone();
        let _: i64 = redis::cmd("XACK")
            .arg(&self.stream)
            .arg(&self.group)
            .arg(entry_id)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    /// Take over entries stuck with consumers that stopped acknowledging.
    ///
    /// Claimed entries move into our pending list with their delivery count
    /// incremented, and surface through [`read_pending`](Self::read_pending)
    /// on the next poll. Returns how many entries were claimed.
    pub async fn claim_abandoned(
        &self,
        count: usize,
        min_idle_ms: u64,
    ) -> Result<usize, StreamError> {
        let mut conn = self.redis.clone();
        let pending: Result<Vec<(String, String, i64, i64)>, redis::RedisError> =
            redis::cmd("XPENDING")
                .arg(&self.stream)
                .arg(&self.group)
                .arg("IDLE")
                .arg(min_idle_ms)
                .arg("-")
                .arg("+")
                .arg(count)
                .query_async(&mut conn)
                .await;
        let pending = match pending {
            Ok(pending) => pending,
            Err(e) if is_nogroup(&e) => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let ids: Vec<String> = pending
            .into_iter()
            .filter(|(_, consumer, _, _)| consumer != &self.consumer_id)
            .map(|(id, _, _, _)| id)
            .collect();
        if ids.is_empty() {
            return Ok(0);
        }

        let mut cmd = redis::cmd("XCLAIM");
        cmd.arg(&self.stream)
            .arg(&self.group)
            .arg(&self.consumer_id)
            .arg(min_idle_ms);
        for id in &ids {
            cmd.arg(id);
        }
        let claimed: Vec<(String, Vec<(String, String)>)> = cmd.query_async(&mut conn).await?;
        if !claimed.is_empty() {
            warn!(
                stream = %self.stream,
                consumer = %self.consumer_id,
                count = claimed.len(),
                "claimed abandoned entries"
            );
        }
        Ok(claimed.len())
    }

    /// Entries pending for the whole group on this stream.
    pub async fn pending_count(&self) -> Result<i64, StreamError> {
        // XPENDING summary reply: (count, min id, max id, per-consumer counts).
        type Summary = (i64, Option<String>, Option<String>, Option<Vec<(String, String)>>);
        let mut conn = self.redis.clone();
        let reply: Result<Summary, redis::RedisError> = redis::cmd("XPENDING")
            .arg(&self.stream)
            .arg(&self.group)
            .query_async(&mut conn)
            .await;
        match reply {
            Ok((count, ..)) => Ok(count),
            Err(e) if is_nogroup(&e) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Stream length after MAXLEN trimming.
    pub async fn stream_length(&self) -> Result<i64, StreamError> {
        let mut conn = self.redis.clone();
        let length: i64 = redis::cmd("XLEN")
            .arg(&self.stream)
            .query_async(&mut conn)
            .await?;
        Ok(length)
    }

    async fn read_group(&self, cursor: &str, count: usize) -> Result<Vec<RawEntry>, StreamError> {
        let mut conn = self.redis.clone();
        let reply: Result<Option<ReadReply>, redis::RedisError> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.group)
            .arg(&self.consumer_id)
            .arg("COUNT")
            .arg(count)
            .arg("STREAMS")
            .arg(&self.stream)
            .arg(cursor)
            .query_async(&mut conn)
            .await;
        match reply {
            Ok(reply) => Ok(parse_reply(reply)),
            Err(e) if is_nogroup(&e) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Delivery counts for the first `count` entries pending for this
    /// consumer, in the same order XREADGROUP returns them.
    async fn delivery_counts(&self, count: usize) -> Result<Vec<(String, u32)>, StreamError> {
        let mut conn = self.redis.clone();
        let reply: Result<Vec<(String, String, i64, i64)>, redis::RedisError> =
            redis::cmd("XPENDING")
                .arg(&self.stream)
                .arg(&self.group)
                .arg("-")
                .arg("+")
                .arg(count)
                .arg(&self.consumer_id)
                .query_async(&mut conn)
                .await;
        match reply {
            Ok(rows) => Ok(rows
                .into_iter()
                .map(|(id, _, _, deliveries)| (id, deliveries.max(0) as u32))
                .collect()),
            Err(e) if is_nogroup(&e) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

fn is_nogroup(err: &redis::RedisError) -> bool {
    err.to_string().contains("NOGROUP")
}

fn parse_reply(reply: Option<ReadReply>) -> Vec<RawEntry> {
    let Some(streams) = reply else {
        return Vec::new();
    };
    let mut entries = Vec::new();
    for (_, stream_entries) in streams {
        for (id, fields) in stream_entries {
            // Entries without a job field decode to an empty payload and get
            // parked as malformed instead of wedging the partition.
            let payload = fields
                .into_iter()
                .find(|(name, _)| name == "job")
                .map(|(_, value)| value)
                .unwrap_or_default();
            entries.push(RawEntry {
                id,
                payload,
                delivery_count: 1,
            });
        }
    }
    entries
}
