//! Redis connector for the stream transport.

mod config;
mod connector;

pub use config::RedisConfig;
pub use connector::{connect_from_config, connect_from_config_with_retry};
