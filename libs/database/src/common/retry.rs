//! Bounded retry with exponential backoff for store connections.
//!
//! Startup is the only caller: a service that cannot reach Postgres or
//! Redis yet (container orchestration races, rolling restarts) retries a
//! few times before giving up and exiting.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Backoff schedule for connection attempts.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first failed attempt
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds
    pub initial_delay_ms: u64,
    /// Ceiling on the computed delay, in milliseconds
    pub max_delay_ms: u64,
    /// Growth factor applied per retry
    pub backoff_multiplier: f64,
    /// Randomize each delay to half-to-full of its computed value
    pub use_jitter: bool,
}

impl Default for RetryConfig {
    /// 3 retries, 100ms initial delay, 5s cap, doubling, jitter on.
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
            use_jitter: true,
        }
    }
}

impl RetryConfig {
    /// Delay to sleep before retry number `attempt` (1-based).
    fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let scaled = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let mut millis = (scaled as u64).min(self.max_delay_ms);

        if self.use_jitter {
            let factor = 0.5 + rand::random::<f64>() / 2.0;
            millis = (millis as f64 * factor) as u64;
        }

        Duration::from_millis(millis)
    }
}

/// Runs `operation` until it succeeds or the retry budget is spent.
///
/// `what` names the operation in logs ("postgres connect", "redis connect").
/// The last error is returned unchanged once `max_retries` retries have
/// failed.
pub async fn retry_with_backoff<F, Fut, T, E>(
    config: &RetryConfig,
    what: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("{} succeeded after {} retries", what, attempt);
                }
                return Ok(value);
            }
            Err(err) => {
                attempt += 1;

                if attempt > config.max_retries {
                    warn!("{} failed after {} attempts: {}", what, attempt, err);
                    return Err(err);
                }

                let delay = config.delay_for(attempt);
                debug!(
                    "{} failed (attempt {}/{}): {}. Retrying in {:?}",
                    what,
                    attempt,
                    config.max_retries + 1,
                    err,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
