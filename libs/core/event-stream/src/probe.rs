//! Availability probing for publish destinations.
//!
//! The guarded publisher asks a probe before each delivery attempt instead
//! of discovering an outage through a failed write. Probes must be cheap;
//! they run on the publish path.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;

use crate::error::StreamError;

/// Answers whether the destination is worth attempting right now.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AvailabilityProbe: Send + Sync {
    async fn is_available(&self) -> bool;
}

/// Probe that always reports available.
///
/// Used when no meaningful health signal exists for the destination, which
/// degrades the guard to plain retry plus circuit breaker.
pub struct AlwaysAvailable;

#[async_trait]
impl AvailabilityProbe for AlwaysAvailable {
    async fn is_available(&self) -> bool {
        true
    }
}

/// Probe that PINGs Redis. Suits publishers whose destination is a Redis
/// stream.
pub struct RedisAvailabilityProbe {
    redis: ConnectionManager,
}

impl RedisAvailabilityProbe {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl AvailabilityProbe for RedisAvailabilityProbe {
    async fn is_available(&self) -> bool {
        let mut conn = self.redis.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|reply| reply == "PONG")
            .unwrap_or(false)
    }
}

/// Probe backed by an HTTP health endpoint, for destinations that live
/// behind another service.
pub struct HttpAvailabilityProbe {
    client: reqwest::Client,
    health_url: String,
}

impl HttpAvailabilityProbe {
    pub fn new(health_url: impl Into<String>) -> Result<Self, StreamError> {
        Self::with_timeout(health_url, Duration::from_secs(2))
    }

    pub fn with_timeout(
        health_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, StreamError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StreamError::Config(format!("failed to build probe client: {e}")))?;
        Ok(Self {
            client,
            health_url: health_url.into(),
        })
    }
}

#[async_trait]
impl AvailabilityProbe for HttpAvailabilityProbe {
    async fn is_available(&self) -> bool {
        match self.client.get(&self.health_url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_always_available_reports_true() {
        assert!(AlwaysAvailable.is_available().await);
    }

    #[tokio::test]
    async fn test_http_probe_reports_false_when_unreachable() {
        // Port 1 is never listening locally.
        let probe =
            HttpAvailabilityProbe::with_timeout("http://127.0.0.1:1/health", Duration::from_millis(200))
                .unwrap();
        assert!(!probe.is_available().await);
    }

    #[tokio::test]
    async fn test_mock_probe_sequences_answers() {
        let mut probe = MockAvailabilityProbe::new();
        probe.expect_is_available().times(1).returning(|| false);
        probe.expect_is_available().times(1).returning(|| true);

        assert!(!probe.is_available().await);
        assert!(probe.is_available().await);
    }
}
