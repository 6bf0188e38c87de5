//! Audit Domain
//!
//! Durable, queryable audit trail for appointment lifecycle events. Events
//! published by the scheduling side arrive over the audit stream, are
//! persisted exactly once, and are served back over a small read API.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐    ┌──────────────────┐
//! │     Handlers     │    │    Processor     │  ← read API / stream intake
//! └────────┬─────────┘    └────────┬─────────┘
//!          │                       │
//!          └──────────┬────────────┘
//!                     │
//!            ┌────────▼─────────┐
//!            │     Service      │  ← idempotent ingest, history queries
//!            └────────┬─────────┘
//!                     │
//!            ┌────────▼─────────┐
//!            │    Repository    │  ← trait + Postgres implementation
//!            └────────┬─────────┘
//!                     │
//!            ┌────────▼─────────┐
//!            │    audit_logs    │  ← append-only, event id is the key
//!            └──────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_audit::{handlers, AuditService, PgAuditLogRepository};
//!
//! # async fn example(db: sea_orm::DatabaseConnection) {
//! let repository = PgAuditLogRepository::new(db);
//! let service = AuditService::new(repository);
//!
//! // Axum router with the three history endpoints
//! let router = handlers::router(service);
//! # }
//! ```

pub mod entity;
pub mod error;
pub mod handlers;
pub mod models;
pub mod postgres;
pub mod processor;
pub mod repository;
pub mod service;

// Re-export commonly used types
pub use error::{AuditError, AuditResult};
pub use handlers::ApiDoc;
pub use models::{AuditLog, IngestOutcome};
pub use postgres::PgAuditLogRepository;
pub use processor::AuditIngestProcessor;
pub use repository::AuditLogRepository;
pub use service::AuditService;
