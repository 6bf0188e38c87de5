//! Environment-driven configuration shared by every service binary.
//!
//! Each app composes its config from pieces that implement [`FromEnv`]
//! (server bind address, store settings) and fails fast at startup when a
//! required variable is missing or unparsable.

pub mod server;
pub mod tracing;

use std::env;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable '{0}' is required but not set")]
    MissingEnvVar(String),

    #[error("Failed to parse environment variable '{key}': {details}")]
    ParseError { key: String, details: String },
}

/// Pieces of configuration that load themselves from the environment.
pub trait FromEnv: Sized {
    fn from_env() -> Result<Self, ConfigError>;
}

/// The variable's value, or `default` when unset.
pub fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// The variable's value, or a [`ConfigError`] naming it when unset.
pub fn env_required(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Deployment environment, selected by `APP_ENV`.
///
/// Only `production` (any casing) selects [`Environment::Production`];
/// everything else, including an unset variable, is development.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn from_env() -> Self {
        match env::var("APP_ENV") {
            Ok(value) if value.eq_ignore_ascii_case("production") => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Static name/version pair identifying the running binary.
///
/// Built by the [`app_info!`] macro so each crate reports its own
/// `CARGO_PKG_NAME`/`CARGO_PKG_VERSION`, not this library's.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AppInfo {
    pub name: &'static str,
    pub version: &'static str,
}

/// Capture the calling crate's package name and version.
///
/// # Example
/// ```ignore
/// use core_config::app_info;
///
/// let info = app_info!();
/// println!("{} v{}", info.name, info.version);
/// ```
#[macro_export]
macro_rules! app_info {
    () => {
        $crate::AppInfo {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
        }
    };
}
