//! Partitioned Redis Streams pipeline.
//!
//! Building blocks for event pipelines that need per-key ordering and an
//! explicit story for every failure:
//!
//! - [`registry`]: stream definitions and routing-key partitioning
//! - [`producer`]: partition-aware appends
//! - [`guard`]: publishing with probe, retry, circuit breaker, and DLQ divert
//! - [`consumer`] / [`worker`]: consumer-group workers, one sequential task
//!   per partition, pending entries first
//! - [`dlq`]: parking, inspection, and replay of failed messages
//! - [`resilience`]: circuit breaker
//! - [`health`] / [`metrics`]: admin endpoints and Prometheus metrics
//!
//! A message accepted by a [`GuardedPublisher`] ends up in exactly one
//! place: its partition stream or the dead letter stream. A message read by
//! a [`StreamWorker`] is either processed and acknowledged, or parked and
//! acknowledged; nothing is silently dropped and nothing is redelivered
//! after parking.

pub mod config;
pub mod consumer;
pub mod dlq;
pub mod error;
pub mod guard;
pub mod health;
pub mod metrics;
pub mod probe;
pub mod producer;
pub mod registry;
pub mod resilience;
pub mod worker;

pub use config::WorkerConfig;
pub use consumer::{RawEntry, StreamConsumer};
pub use dlq::{DlqEntry, DlqManager, DlqRecord, DlqStats};
pub use error::{ErrorCategory, StreamError};
pub use guard::{GuardConfig, GuardedPublisher, PublishOutcome};
pub use health::{HealthState, admin_router};
pub use metrics::{StreamMetrics, init_metrics, render_metrics};
pub use probe::{AlwaysAvailable, AvailabilityProbe, HttpAvailabilityProbe, RedisAvailabilityProbe};
pub use producer::StreamProducer;
pub use registry::{StreamDef, StreamMessage};
pub use resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use worker::{MessageProcessor, StreamWorker};
