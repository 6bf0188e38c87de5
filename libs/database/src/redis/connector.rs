use redis::Client;
use redis::aio::ConnectionManager;
use tracing::info;

use super::RedisConfig;
use crate::common::{RetryConfig, retry_with_backoff};

/// Opens a [`ConnectionManager`] for the configured Redis.
///
/// The manager reconnects transparently, so the returned handle can be
/// cloned freely and held for the life of the process. A PING round trip
/// verifies the server before the handle is given out.
pub async fn connect_from_config(config: RedisConfig) -> redis::RedisResult<ConnectionManager> {
    info!("Attempting to connect to Redis at {}", config.url);

    let client = Client::open(config.url.as_str())?;
    let manager = ConnectionManager::new(client).await?;

    let mut conn = manager.clone();
    let _: String = redis::cmd("PING").query_async(&mut conn).await?;

    info!("Successfully connected to Redis");
    Ok(manager)
}

/// Like [`connect_from_config`], but retries with exponential backoff.
///
/// `None` uses the default schedule (three retries).
///
/// ```ignore
/// use core_config::FromEnv;
/// use database::redis::{RedisConfig, connect_from_config_with_retry};
///
/// let redis = connect_from_config_with_retry(RedisConfig::from_env()?, None).await?;
/// ```
pub async fn connect_from_config_with_retry(
    config: RedisConfig,
    retry: Option<RetryConfig>,
) -> redis::RedisResult<ConnectionManager> {
    let retry = retry.unwrap_or_default();
    retry_with_backoff(&retry, "redis connect", || {
        connect_from_config(config.clone())
    })
    .await
}
