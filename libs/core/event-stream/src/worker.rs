//! Partitioned stream worker.
//!
//! One worker owns every partition of a logical stream. Each partition is
//! drained by its own task, strictly in order: pending entries are always
//! re-read before new ones, and a failing head entry blocks its partition,
//! and only its partition, until it is processed or parked.
//!
//! Failure handling per entry:
//! - undecodable payload: parked immediately, then acknowledged
//! - permanent processing error: parked immediately, then acknowledged
//! - transient processing error: retried in place with backoff; parked once
//!   deliveries or consecutive failures reach `max_deliveries`

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::WorkerConfig;
use crate::consumer::{RawEntry, StreamConsumer};
use crate::dlq::DlqManager;
use crate::error::{ErrorCategory, StreamError};
use crate::metrics::StreamMetrics;
use crate::registry::StreamMessage;

/// Business logic applied to each decoded message.
#[async_trait]
pub trait MessageProcessor<M: StreamMessage>: Send + Sync {
    /// Handle one message. The error category decides what happens next:
    /// transient errors are retried in place, permanent errors park the
    /// message immediately.
    async fn process(&self, message: &M) -> Result<(), StreamError>;

    /// Short name used in logs and metric labels.
    fn name(&self) -> &'static str;
}

/// Runs one sequential processing task per partition stream.
pub struct StreamWorker<M, P>
where
    M: StreamMessage + 'static,
    P: MessageProcessor<M> + 'static,
{
    redis: ConnectionManager,
    processor: Arc<P>,
    config: WorkerConfig,
    _message: PhantomData<fn() -> M>,
}

impl<M, P> StreamWorker<M, P>
where
    M: StreamMessage + 'static,
    P: MessageProcessor<M> + 'static,
{
    pub fn new(redis: ConnectionManager, processor: P, config: WorkerConfig) -> Self {
        Self::with_arc(redis, Arc::new(processor), config)
    }

    pub fn with_arc(redis: ConnectionManager, processor: Arc<P>, config: WorkerConfig) -> Self {
        Self {
            redis,
            processor,
            config,
            _message: PhantomData,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Run until the shutdown signal flips to `true`.
    ///
    /// Consumer groups are created up front so a worker pointed at a fresh
    /// Redis starts cleanly. On shutdown each partition task finishes the
    /// entry it is on; unacknowledged entries are redelivered on the next
    /// start.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<(), StreamError> {
        info!(
            stream = %self.config.stream_base,
            group = %self.config.consumer_group,
            consumer = %self.config.consumer_id,
            partitions = self.config.partitions,
            processor = self.processor.name(),
            "stream worker starting"
        );

        let mut tasks: JoinSet<()> = JoinSet::new();
        for partition in 0..self.config.partitions {
            let stream = format!("{}:{}", self.config.stream_base, partition);
            let consumer = StreamConsumer::new(
                self.redis.clone(),
                stream,
                &self.config.consumer_group,
                &self.config.consumer_id,
            );
            consumer.ensure_group().await?;

            let context = PartitionContext {
                consumer,
                processor: Arc::clone(&self.processor),
                dlq: DlqManager::new(
                    Arc::new(self.redis.clone()),
                    &self.config.dlq_stream,
                )
                .with_max_length(self.config.dlq_max_length),
                metrics: StreamMetrics::new(&self.config.stream_base, self.processor.name()),
                config: self.config.clone(),
                partition,
                _message: PhantomData,
            };
            tasks.spawn(run_partition(context, shutdown.clone()));
        }

        let mut outcome = Ok(());
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "partition task panicked");
                if outcome.is_ok() {
                    outcome = Err(StreamError::Internal(format!(
                        "partition task join error: {e}"
                    )));
                }
            }
        }
        info!(stream = %self.config.stream_base, "stream worker stopped");
        outcome
    }
}

struct PartitionContext<M, P>
where
    M: StreamMessage,
    P: MessageProcessor<M>,
{
    consumer: StreamConsumer,
    processor: Arc<P>,
    dlq: DlqManager,
    metrics: StreamMetrics,
    config: WorkerConfig,
    partition: u32,
    _message: PhantomData<fn() -> M>,
}

/// Tracks consecutive failures of the entry at the head of the partition.
struct HeadRetry {
    entry_id: String,
    failures: u32,
}

enum Drained {
    Processed,
    Idle,
}

enum EntryStep {
    Next,
    Backoff(u64),
}

async fn run_partition<M, P>(ctx: PartitionContext<M, P>, mut shutdown: watch::Receiver<bool>)
where
    M: StreamMessage,
    P: MessageProcessor<M>,
{
    info!(
        stream = %ctx.consumer.stream(),
        partition = ctx.partition,
        "partition task started"
    );

    let claim_interval = Duration::from_secs(ctx.config.claim_interval_secs);
    let poll_interval = Duration::from_millis(ctx.config.poll_interval_ms);
    let mut last_claim = Instant::now();
    let mut head: Option<HeadRetry> = None;
    let mut consecutive_errors: u32 = 0;

    while !*shutdown.borrow() {
        if last_claim.elapsed() >= claim_interval {
            last_claim = Instant::now();
            match ctx
                .consumer
                .claim_abandoned(ctx.config.batch_size, ctx.config.claim_min_idle_ms)
                .await
            {
                Ok(0) => {}
                Ok(claimed) => ctx.metrics.messages_claimed(claimed),
                Err(e) => {
                    warn!(
                        stream = %ctx.consumer.stream(),
                        error = %e,
                        "claiming abandoned entries failed"
                    );
                }
            }
            refresh_gauges(&ctx).await;
        }

        match drain_once(&ctx, &mut head, &mut shutdown).await {
            Ok(Drained::Processed) => {
                consecutive_errors = 0;
            }
            Ok(Drained::Idle) => {
                consecutive_errors = 0;
                idle_wait(poll_interval, &mut shutdown).await;
            }
            Err(e) => {
                consecutive_errors += 1;
                let delay = ErrorCategory::Transient.backoff_delay_ms(consecutive_errors);
                error!(
                    stream = %ctx.consumer.stream(),
                    error = %e,
                    consecutive_errors,
                    delay_ms = delay,
                    "partition poll failed, backing off"
                );
                idle_wait(Duration::from_millis(delay), &mut shutdown).await;
            }
        }
    }

    info!(
        stream = %ctx.consumer.stream(),
        partition = ctx.partition,
        "partition task stopped"
    );
}

/// Read one batch, pending entries first, and process it in order.
async fn drain_once<M, P>(
    ctx: &PartitionContext<M, P>,
    head: &mut Option<HeadRetry>,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<Drained, StreamError>
where
    M: StreamMessage,
    P: MessageProcessor<M>,
{
    let pending = ctx.consumer.read_pending(ctx.config.batch_size).await?;
    let entries = if pending.is_empty() {
        ctx.consumer.read_new(ctx.config.batch_size).await?
    } else {
        pending
    };
    if entries.is_empty() {
        return Ok(Drained::Idle);
    }

    for entry in entries {
        if *shutdown.borrow() {
            break;
        }
        match handle_entry(ctx, entry, head).await? {
            EntryStep::Next => {}
            EntryStep::Backoff(delay_ms) => {
                idle_wait(Duration::from_millis(delay_ms), shutdown).await;
                // Re-read pending so the failed head goes first again.
                break;
            }
        }
    }
    Ok(Drained::Processed)
}

async fn handle_entry<M, P>(
    ctx: &PartitionContext<M, P>,
    entry: RawEntry,
    head: &mut Option<HeadRetry>,
) -> Result<EntryStep, StreamError>
where
    M: StreamMessage,
    P: MessageProcessor<M>,
{
    let message: M = match serde_json::from_str(&entry.payload) {
        Ok(message) => message,
        Err(e) => {
            warn!(
                stream = %ctx.consumer.stream(),
                entry_id = %entry.id,
                age_ms = entry.age_ms().unwrap_or(-1),
                error = %e,
                "undecodable payload, parking"
            );
            ctx.metrics.message_failed(ErrorCategory::Permanent.as_str());
            park_and_ack(ctx, &entry, &entry.id, &format!("undecodable payload: {e}")).await?;
            clear_head(head, &entry.id);
            return Ok(EntryStep::Next);
        }
    };

    ctx.metrics.message_received();
    if entry.is_redelivery() {
        debug!(
            stream = %ctx.consumer.stream(),
            entry_id = %entry.id,
            delivery_count = entry.delivery_count,
            "processing redelivered entry"
        );
    }

    let started = Instant::now();
    match ctx.processor.process(&message).await {
        Ok(()) => {
            ctx.consumer.ack(&entry.id).await?;
            ctx.metrics.message_processed(started.elapsed());
            clear_head(head, &entry.id);
            debug!(
                stream = %ctx.consumer.stream(),
                entry_id = %entry.id,
                message_id = %message.message_id(),
                "message processed"
            );
            Ok(EntryStep::Next)
        }
        Err(e) if e.category() == ErrorCategory::Permanent => {
            ctx.metrics.message_failed(ErrorCategory::Permanent.as_str());
            warn!(
                stream = %ctx.consumer.stream(),
                entry_id = %entry.id,
                message_id = %message.message_id(),
                error = %e,
                "permanent failure, parking"
            );
            park_and_ack(ctx, &entry, &message.message_id(), &e.to_string()).await?;
            clear_head(head, &entry.id);
            Ok(EntryStep::Next)
        }
        Err(e) => {
            ctx.metrics.message_failed(ErrorCategory::Transient.as_str());
            let failures = match head {
                Some(h) if h.entry_id == entry.id => h.failures + 1,
                _ => 1,
            };
            *head = Some(HeadRetry {
                entry_id: entry.id.clone(),
                failures,
            });

            // Delivery count survives restarts and claims; the in-memory
            // streak covers rereads of our own pending list, which do not
            // bump the count. Whichever is higher decides.
            let deliveries = entry.delivery_count.max(failures);
            if deliveries >= ctx.config.max_deliveries {
                warn!(
                    stream = %ctx.consumer.stream(),
                    entry_id = %entry.id,
                    message_id = %message.message_id(),
                    deliveries,
                    error = %e,
                    "retries exhausted, parking"
                );
                park_and_ack(ctx, &entry, &message.message_id(), &format!("retries exhausted: {e}"))
                    .await?;
                clear_head(head, &entry.id);
                Ok(EntryStep::Next)
            } else {
                let delay = e.backoff_delay_ms(failures);
                warn!(
                    stream = %ctx.consumer.stream(),
                    entry_id = %entry.id,
                    message_id = %message.message_id(),
                    failures,
                    delay_ms = delay,
                    error = %e,
                    "transient failure, retrying in place"
                );
                Ok(EntryStep::Backoff(delay))
            }
        }
    }
}

/// Park first, ack second: a crash in between leaves the entry pending,
/// which at worst parks it twice, never loses it.
async fn park_and_ack<M, P>(
    ctx: &PartitionContext<M, P>,
    entry: &RawEntry,
    message_id: &str,
    error: &str,
) -> Result<(), StreamError>
where
    M: StreamMessage,
    P: MessageProcessor<M>,
{
    ctx.dlq
        .park(
            message_id,
            &entry.payload,
            error,
            ctx.consumer.stream(),
            entry.delivery_count,
        )
        .await?;
    ctx.consumer.ack(&entry.id).await?;
    ctx.metrics.message_parked();
    Ok(())
}

fn clear_head(head: &mut Option<HeadRetry>, entry_id: &str) {
    if head.as_ref().is_some_and(|h| h.entry_id == entry_id) {
        *head = None;
    }
}

async fn refresh_gauges<M, P>(ctx: &PartitionContext<M, P>)
where
    M: StreamMessage,
    P: MessageProcessor<M>,
{
    if let Ok(depth) = ctx.consumer.stream_length().await {
        ctx.metrics.stream_depth(ctx.partition, depth);
    }
    if let Ok(pending) = ctx.consumer.pending_count().await {
        ctx.metrics.pending(ctx.partition, pending);
    }
}

async fn idle_wait(duration: Duration, shutdown: &mut watch::Receiver<bool>) {
    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = shutdown.changed() => {}
    }
}
