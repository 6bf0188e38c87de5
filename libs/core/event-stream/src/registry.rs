//! Stream topology definitions.
//!
//! A [`StreamDef`] describes one logical stream: its base name, consumer
//! group, dead letter stream, and partition count. Messages are routed to a
//! physical partition stream by hashing their routing key, which keeps every
//! message for one key on one partition and therefore in order.

use serde::Serialize;
use serde::de::DeserializeOwned;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a 64-bit hash.
///
/// Stable across processes and releases, which is what keeps partition
/// assignment consistent between producers and workers.
pub fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Compile-time description of one logical stream.
///
/// Implementors are unit structs owned by the domain that produces the
/// messages, so producers and workers agree on names and partition count
/// through the type system instead of configuration drift.
pub trait StreamDef {
    /// Base stream name. Partition streams are derived as `{base}:{partition}`.
    const STREAM_BASE: &'static str;
    /// Consumer group used by workers on every partition stream.
    const CONSUMER_GROUP: &'static str;
    /// Stream that receives parked messages.
    const DLQ_STREAM: &'static str;
    /// Number of partition streams. Must be at least 1.
    const PARTITIONS: u32 = 3;
    /// Approximate per-partition entry cap, applied with `XADD MAXLEN ~`.
    const MAX_LENGTH: i64 = 100_000;

    /// Partition for a routing key.
    fn partition_for(routing_key: &str) -> u32 {
        (fnv1a64(routing_key.as_bytes()) % u64::from(Self::PARTITIONS.max(1))) as u32
    }

    /// Physical stream name for one partition.
    fn partition_stream(partition: u32) -> String {
        format!("{}:{}", Self::STREAM_BASE, partition)
    }

    /// Physical stream a routing key maps to.
    fn stream_for(routing_key: &str) -> String {
        Self::partition_stream(Self::partition_for(routing_key))
    }

    /// Every physical partition stream of this definition.
    fn partition_streams() -> Vec<String> {
        (0..Self::PARTITIONS.max(1))
            .map(Self::partition_stream)
            .collect()
    }
}

/// A message that can travel on a stream.
pub trait StreamMessage: Serialize + DeserializeOwned + Send + Sync {
    /// Globally unique id, used for idempotency and dead letter bookkeeping.
    fn message_id(&self) -> String;

    /// Key that decides the partition. Messages sharing a key stay ordered.
    fn routing_key(&self) -> &str;
}
