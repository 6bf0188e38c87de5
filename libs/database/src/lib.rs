//! Store connectors for the appointment audit services.
//!
//! Two stores back the pipeline: PostgreSQL holds the durable audit trail,
//! Redis carries the partitioned event streams. Both connectors read their
//! settings from the environment (`config` feature) and retry the initial
//! connection with backoff, since at startup the containers may come up in
//! any order.
//!
//! # Features
//!
//! - `postgres` (default) - PostgreSQL support with SeaORM
//! - `redis` (default) - Redis support
//! - `config` - `core_config::FromEnv` implementations for the configs
//! - `all` - everything
//!
//! # Example
//!
//! ```ignore
//! use core_config::FromEnv;
//! use database::postgres::{self, PostgresConfig};
//! use migration::Migrator;
//!
//! let db = postgres::connect_from_config_with_retry(PostgresConfig::from_env()?, None).await?;
//! postgres::run_migrations::<Migrator>(&db, "audit_worker").await?;
//! ```

pub mod common;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "redis")]
pub mod redis;
