//! PostgreSQL connector: pool configuration, retrying connect, migrations.

mod config;
mod connector;

pub use config::PostgresConfig;
pub use connector::{connect_from_config, connect_from_config_with_retry, run_migrations};

// Callers hold the pool under this name without importing sea_orm themselves
pub use sea_orm::DatabaseConnection;
