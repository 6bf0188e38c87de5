//! Appointments Domain
//!
//! The producer side of the appointment event pipeline. This crate owns the
//! construction of both event families and the guarded publishing path that
//! puts them on the broker:
//!
//! ```text
//! ┌──────────────────┐
//! │ AppointmentEvents│  ← record_* / announce_*, per kind failure policy
//! └────────┬─────────┘
//!          │
//! ┌────────▼─────────┐
//! │ GuardedPublisher │  ← probe, retry, circuit breaker, DLQ divert
//! └────────┬─────────┘
//!          │
//! ┌────────▼─────────┐
//! │   StreamDefs     │  ← audit + notification streams, 3 partitions each
//! └──────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use domain_appointments::{AppointmentEvents, AuditStream, NotificationStream, PublishPolicy};
//! use event_stream::{
//!     AlwaysAvailable, CircuitBreaker, CircuitBreakerConfig, DlqManager, GuardedPublisher,
//!     StreamDef, StreamProducer,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = redis::Client::open("redis://localhost:6379")?;
//! let redis = redis::aio::ConnectionManager::new(client).await?;
//!
//! let audit = GuardedPublisher::new(
//!     StreamProducer::from_stream_def::<AuditStream>(redis.clone()),
//!     Arc::new(AlwaysAvailable),
//!     Arc::new(CircuitBreaker::named("audit", CircuitBreakerConfig::default())),
//!     DlqManager::new(Arc::new(redis.clone()), AuditStream::DLQ_STREAM),
//! );
//! let notifications = GuardedPublisher::new(
//!     StreamProducer::from_stream_def::<NotificationStream>(redis.clone()),
//!     Arc::new(AlwaysAvailable),
//!     Arc::new(CircuitBreaker::named("notifications", CircuitBreakerConfig::default())),
//!     DlqManager::new(Arc::new(redis), NotificationStream::DLQ_STREAM),
//! );
//!
//! let events = AppointmentEvents::new(audit, notifications, PublishPolicy::default());
//! let date = chrono::NaiveDate::from_ymd_opt(2024, 12, 20).unwrap();
//! let hour = chrono::NaiveTime::from_hms_opt(14, 0, 0).unwrap();
//! events
//!     .record_created("appointment-1", "prof-1", "patient-1", date, hour, "user-1")
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod events;
pub mod publisher;
pub mod streams;

// Re-export commonly used types
pub use error::PublishError;
pub use events::{AuditEvent, AuditEventKind, NotificationEvent, NotificationPayload};
pub use publisher::{AppointmentEvents, EventPolicy, PublishPolicy};
pub use streams::{AuditStream, NotificationStream};
