//! Dead letter stream management.
//!
//! Messages that cannot be processed or delivered are parked on a separate
//! stream with enough context to inspect and replay them later. Parking is
//! terminal for the worker: the source entry gets acknowledged and never
//! redelivered.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::StreamError;

/// A parked message with its failure context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqEntry {
    /// Message id from the payload, or the stream entry id when the payload
    /// could not be decoded.
    pub message_id: String,
    /// Original payload. Stored as parsed JSON when it parses so entries
    /// stay readable in admin tooling; anything else is kept verbatim as a
    /// JSON string. Replaying reverses this exactly.
    pub payload: Value,
    /// Why the message was parked.
    pub error: String,
    /// Stream the message came from, or was destined for.
    pub source_stream: String,
    /// Deliveries or attempts consumed before parking.
    pub delivery_count: u32,
    /// When the message was parked.
    pub failed_at: DateTime<Utc>,
}

/// A parked message together with its id on the dead letter stream.
#[derive(Debug, Clone, Serialize)]
pub struct DlqRecord {
    pub id: String,
    #[serde(flatten)]
    pub entry: DlqEntry,
}

/// Summary of the dead letter stream.
#[derive(Debug, Clone, Serialize)]
pub struct DlqStats {
    pub stream: String,
    pub length: i64,
    pub oldest_id: Option<String>,
    pub newest_id: Option<String>,
}

/// Reads and writes one dead letter stream.
#[derive(Clone)]
pub struct DlqManager {
    redis: Arc<ConnectionManager>,
    dlq_stream: String,
    max_length: i64,
}

impl DlqManager {
    pub fn new(redis: Arc<ConnectionManager>, dlq_stream: impl Into<String>) -> Self {
        Self {
            redis,
            dlq_stream: dlq_stream.into(),
            max_length: 10_000,
        }
    }

    pub fn with_max_length(mut self, max_length: i64) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn stream(&self) -> &str {
        &self.dlq_stream
    }

    /// Park a message. Returns the id of the new dead letter entry.
    pub async fn park(
        &self,
        message_id: &str,
        payload: &str,
        error: &str,
        source_stream: &str,
        delivery_count: u32,
    ) -> Result<String, StreamError> {
        let entry = DlqEntry {
            message_id: message_id.to_string(),
            payload: serde_json::from_str(payload)
                .unwrap_or_else(|_| Value::String(payload.to_string())),
            error: error.to_string(),
            source_stream: source_stream.to_string(),
            delivery_count,
            failed_at: Utc::now(),
        };
        let data = serde_json::to_string(&entry)?;

        let mut conn = (*self.redis).clone();
        let id: String = redis::cmd("XADD")
            .arg(&self.dlq_stream)
            .arg("MAXLEN")
            .arg("~")
            .arg(self.max_length)
            .arg("*")
            .arg("data")
            .arg(&data)
            .query_async(&mut conn)
            .await?;
        warn!(
            dlq = %self.dlq_stream,
            dlq_id = %id,
            message_id = %message_id,
            source = %source_stream,
            error = %error,
            "message parked"
        );
        Ok(id)
    }

    pub async fn stats(&self) -> Result<DlqStats, StreamError> {
        let mut conn = (*self.redis).clone();
        let length: i64 = redis::cmd("XLEN")
            .arg(&self.dlq_stream)
            .query_async(&mut conn)
            .await?;
        let oldest: Vec<(String, Vec<(String, String)>)> = redis::cmd("XRANGE")
            .arg(&self.dlq_stream)
            .arg("-")
            .arg("+")
            .arg("COUNT")
            .arg(1)
            .query_async(&mut conn)
            .await?;
        let newest: Vec<(String, Vec<(String, String)>)> = redis::cmd("XREVRANGE")
            .arg(&self.dlq_stream)
            .arg("+")
            .arg("-")
            .arg("COUNT")
            .arg(1)
            .query_async(&mut conn)
            .await?;
        Ok(DlqStats {
            stream: self.dlq_stream.clone(),
            length,
            oldest_id: oldest.into_iter().next().map(|(id, _)| id),
            newest_id: newest.into_iter().next().map(|(id, _)| id),
        })
    }

    /// List parked messages, newest first.
    pub async fn list(&self, count: usize) -> Result<Vec<DlqRecord>, StreamError> {
        let mut conn = (*self.redis).clone();
        let rows: Vec<(String, Vec<(String, String)>)> = redis::cmd("XREVRANGE")
            .arg(&self.dlq_stream)
            .arg("+")
            .arg("-")
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|(id, fields)| parse_fields(fields).map(|entry| DlqRecord { id, entry }))
            .collect())
    }

    pub async fn get(&self, dlq_id: &str) -> Result<Option<DlqEntry>, StreamError> {
        let mut conn = (*self.redis).clone();
        let rows: Vec<(String, Vec<(String, String)>)> = redis::cmd("XRANGE")
            .arg(&self.dlq_stream)
            .arg(dlq_id)
            .arg(dlq_id)
            .query_async(&mut conn)
            .await?;
        Ok(rows.into_iter().next().and_then(|(_, fields)| parse_fields(fields)))
    }

    /// Remove one entry without replaying it.
    pub async fn archive(&self, dlq_id: &str) -> Result<bool, StreamError> {
        let mut conn = (*self.redis).clone();
        let deleted: i64 = redis::cmd("XDEL")
            .arg(&self.dlq_stream)
            .arg(dlq_id)
            .query_async(&mut conn)
            .await?;
        Ok(deleted > 0)
    }

    /// Drop every parked entry. Returns how many were removed.
    pub async fn purge(&self) -> Result<i64, StreamError> {
        let mut conn = (*self.redis).clone();
        let removed: i64 = redis::cmd("XTRIM")
            .arg(&self.dlq_stream)
            .arg("MAXLEN")
            .arg(0)
            .query_async(&mut conn)
            .await?;
        info!(dlq = %self.dlq_stream, removed, "dead letter stream purged");
        Ok(removed)
    }

    /// Replay one parked message back onto its source stream.
    ///
    /// Returns the new entry id, or `None` when the dead letter entry does
    /// not exist.
    pub async fn reprocess(&self, dlq_id: &str) -> Result<Option<String>, StreamError> {
        let Some(entry) = self.get(dlq_id).await? else {
            return Ok(None);
        };
        let payload = match &entry.payload {
            Value::String(raw) => raw.clone(),
            other => serde_json::to_string(other)?,
        };

        let mut conn = (*self.redis).clone();
        let new_id: String = redis::cmd("XADD")
            .arg(&entry.source_stream)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .query_async(&mut conn)
            .await?;
        self.archive(dlq_id).await?;
        info!(
            dlq = %self.dlq_stream,
            dlq_id = %dlq_id,
            stream = %entry.source_stream,
            new_id = %new_id,
            "parked message requeued"
        );
        Ok(Some(new_id))
    }

    /// Replay the oldest `count` parked messages. Returns the new entry ids.
    pub async fn reprocess_oldest(&self, count: usize) -> Result<Vec<String>, StreamError> {
        let mut conn = (*self.redis).clone();
        let rows: Vec<(String, Vec<(String, String)>)> = redis::cmd("XRANGE")
            .arg(&self.dlq_stream)
            .arg("-")
            .arg("+")
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;

        let mut requeued = Vec::new();
        for (id, _) in rows {
            if let Some(new_id) = self.reprocess(&id).await? {
                requeued.push(new_id);
            }
        }
        Ok(requeued)
    }
}

fn parse_fields(fields: Vec<(String, String)>) -> Option<DlqEntry> {
    let data = fields
        .into_iter()
        .find(|(name, _)| name == "data")
        .map(|(_, value)| value)?;
    serde_json::from_str(&data).ok()
}
