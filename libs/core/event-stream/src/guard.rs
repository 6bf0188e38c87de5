//! Guarded publishing.
//!
//! A [`GuardedPublisher`] wraps a [`StreamProducer`] with the full delivery
//! discipline: probe the destination, retry with capped backoff, trip a
//! circuit breaker, and divert to the dead letter stream once delivery is
//! clearly not happening. Every accepted message ends up in exactly one
//! place, either its partition stream or the DLQ, and the payload parked is
//! byte for byte the payload that would have been delivered.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::dlq::DlqManager;
use crate::error::StreamError;
use crate::metrics;
use crate::probe::AvailabilityProbe;
use crate::producer::StreamProducer;
use crate::registry::StreamMessage;
use crate::resilience::CircuitBreaker;

/// Retry and backoff tuning for guarded publishing.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// Delivery attempts before diverting to the DLQ.
    pub max_attempts: u32,
    /// Backoff before the second attempt.
    pub initial_backoff_ms: u64,
    /// Backoff ceiling.
    pub max_backoff_ms: u64,
    /// Randomize each backoff between 50% and 100% of the computed delay.
    pub use_jitter: bool,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 5000,
            use_jitter: true,
        }
    }
}

impl GuardConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_initial_backoff_ms(mut self, initial_backoff_ms: u64) -> Self {
        self.initial_backoff_ms = initial_backoff_ms;
        self
    }

    pub fn with_max_backoff_ms(mut self, max_backoff_ms: u64) -> Self {
        self.max_backoff_ms = max_backoff_ms;
        self
    }

    pub fn without_jitter(mut self) -> Self {
        self.use_jitter = false;
        self
    }
}

/// Where an accepted message ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Appended to its partition stream.
    Delivered { stream_id: String },
    /// Diverted to the dead letter stream.
    DeadLettered { dlq_id: String },
}

impl PublishOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// Publisher that never drops a message on the floor.
pub struct GuardedPublisher {
    producer: StreamProducer,
    probe: Arc<dyn AvailabilityProbe>,
    breaker: Arc<CircuitBreaker>,
    dlq: DlqManager,
    config: GuardConfig,
}

impl GuardedPublisher {
    pub fn new(
        producer: StreamProducer,
        probe: Arc<dyn AvailabilityProbe>,
        breaker: Arc<CircuitBreaker>,
        dlq: DlqManager,
    ) -> Self {
        Self {
            producer,
            probe,
            breaker,
            dlq,
            config: GuardConfig::default(),
        }
    }

    pub fn with_config(mut self, config: GuardConfig) -> Self {
        self.config = config;
        self
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn dlq(&self) -> &DlqManager {
        &self.dlq
    }

    /// Publish a message, diverting to the DLQ instead of failing.
    ///
    /// An open circuit diverts immediately without consuming retry budget.
    /// Returns an error only when the message could not be written anywhere,
    /// including the DLQ; callers treat that as an outage, not a bad message.
    pub async fn publish<M: StreamMessage>(
        &self,
        message: &M,
    ) -> Result<PublishOutcome, StreamError> {
        let payload = serde_json::to_string(message)?;
        let message_id = message.message_id();
        let target = self.producer.stream_for(message.routing_key());

        if !self.breaker.can_execute() {
            warn!(
                stream = %target,
                message_id = %message_id,
                "circuit open, diverting without attempting"
            );
            return self
                .divert(&message_id, &payload, &target, "circuit breaker open", 0)
                .await;
        }

        let mut last_error = String::new();
        for attempt in 1..=self.config.max_attempts {
            if self.probe.is_available().await {
                match self
                    .producer
                    .send_raw(message.routing_key(), &payload)
                    .await
                {
                    Ok(stream_id) => {
                        self.breaker.record_success();
                        metrics::record_publish(self.producer.stream_base(), "delivered");
                        debug!(
                            stream = %target,
                            message_id = %message_id,
                            stream_id = %stream_id,
                            attempt,
                            "message delivered"
                        );
                        return Ok(PublishOutcome::Delivered { stream_id });
                    }
                    Err(e) => {
                        last_error = e.to_string();
                    }
                }
            } else {
                last_error = "availability probe reported destination down".to_string();
            }

            if attempt < self.config.max_attempts {
                let delay = compute_backoff(&self.config, attempt);
                debug!(
                    stream = %target,
                    message_id = %message_id,
                    attempt,
                    delay_ms = delay,
                    "delivery attempt failed, backing off"
                );
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }

        // One breaker failure per exhausted publish cycle, not per attempt;
        // retries within a cycle are the guard's own recovery mechanism.
        self.breaker.record_failure();
        warn!(
            stream = %target,
            message_id = %message_id,
            attempts = self.config.max_attempts,
            error = %last_error,
            "delivery attempts exhausted, diverting"
        );
        self.divert(
            &message_id,
            &payload,
            &target,
            &last_error,
            self.config.max_attempts,
        )
        .await
    }

    async fn divert(
        &self,
        message_id: &str,
        payload: &str,
        target: &str,
        error: &str,
        attempts: u32,
    ) -> Result<PublishOutcome, StreamError> {
        let dlq_id = self
            .dlq
            .park(message_id, payload, error, target, attempts)
            .await?;
        metrics::record_publish(self.producer.stream_base(), "dead_lettered");
        Ok(PublishOutcome::DeadLettered { dlq_id })
    }
}

fn compute_backoff(config: &GuardConfig, attempt: u32) -> u64 {
    let exp = attempt.saturating_sub(1).min(16);
    let delay = config
        .initial_backoff_ms
        .saturating_mul(1u64 << exp)
        .min(config.max_backoff_ms);
    if config.use_jitter {
        let factor = 0.5 + rand::random::<f64>() / 2.0;
        (delay as f64 * factor) as u64
    } else {
        delay
    }
}
