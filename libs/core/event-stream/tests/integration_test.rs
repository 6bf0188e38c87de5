//! End to end tests against a real Redis container.
//!
//! Covers the delivery guarantees the crate is built around: per-key
//! ordering, pending-first redelivery, parking of poison messages, and the
//! guarded publisher's "exactly one destination" behavior.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use event_stream::{
    AlwaysAvailable, AvailabilityProbe, CircuitBreaker, CircuitBreakerConfig, CircuitState,
    DlqManager, GuardConfig, GuardedPublisher, MessageProcessor, PublishOutcome, StreamConsumer,
    StreamDef, StreamError, StreamMessage, StreamProducer, StreamWorker, WorkerConfig,
};
use http_body_util::BodyExt;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use test_utils::TestRedis;
use tokio::sync::watch;
use tower::ServiceExt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct TestMessage {
    id: String,
    key: String,
    body: String,
}

impl StreamMessage for TestMessage {
    fn message_id(&self) -> String {
        self.id.clone()
    }

    fn routing_key(&self) -> &str {
        &self.key
    }
}

struct TestStream;

impl StreamDef for TestStream {
    const STREAM_BASE: &'static str = "test:events";
    const CONSUMER_GROUP: &'static str = "test-workers";
    const DLQ_STREAM: &'static str = "test:events:dlq";
}

fn message(id: &str, key: &str, body: &str) -> TestMessage {
    TestMessage {
        id: id.to_string(),
        key: key.to_string(),
        body: body.to_string(),
    }
}

fn worker_config() -> WorkerConfig {
    WorkerConfig::from_stream_def::<TestStream>()
        .with_poll_interval_ms(50)
        .with_claim_interval_secs(1)
        .with_claim_min_idle_ms(200)
}

/// Processor that records what it sees and can be told to fail first.
#[derive(Default)]
struct RecordingProcessor {
    seen: Mutex<Vec<TestMessage>>,
    transient_failures: AtomicU32,
}

impl RecordingProcessor {
    fn failing_first(times: u32) -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
            transient_failures: AtomicU32::new(times),
        }
    }

    fn seen(&self) -> Vec<TestMessage> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageProcessor<TestMessage> for RecordingProcessor {
    async fn process(&self, message: &TestMessage) -> Result<(), StreamError> {
        if self.transient_failures.load(Ordering::SeqCst) > 0 {
            self.transient_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(StreamError::transient("induced failure"));
        }
        self.seen.lock().unwrap().push(message.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

struct PermanentFailProcessor;

#[async_trait]
impl MessageProcessor<TestMessage> for PermanentFailProcessor {
    async fn process(&self, _message: &TestMessage) -> Result<(), StreamError> {
        Err(StreamError::permanent("business rule violated"))
    }

    fn name(&self) -> &'static str {
        "permanent_fail"
    }
}

/// Probe that counts calls and always reports the destination down.
#[derive(Default)]
struct NeverAvailable {
    calls: AtomicU32,
}

#[async_trait]
impl AvailabilityProbe for NeverAvailable {
    async fn is_available(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        false
    }
}

fn spawn_worker<P>(
    redis: ConnectionManager,
    processor: Arc<P>,
    config: WorkerConfig,
) -> (watch::Sender<bool>, tokio::task::JoinHandle<()>)
where
    P: MessageProcessor<TestMessage> + 'static,
{
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(async move {
        let worker = StreamWorker::with_arc(redis, processor, config);
        worker.run(rx).await.expect("worker run");
    });
    (tx, handle)
}

async fn stop_worker(tx: watch::Sender<bool>, handle: tokio::task::JoinHandle<()>) {
    tx.send(true).expect("send shutdown");
    handle.await.expect("worker task");
}

async fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let started = std::time::Instant::now();
    while started.elapsed() < timeout {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

async fn wait_for_dlq_length(dlq: &DlqManager, expected: i64, timeout: Duration) -> bool {
    let started = std::time::Instant::now();
    while started.elapsed() < timeout {
        if let Ok(stats) = dlq.stats().await {
            if stats.length == expected {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

async fn wait_for_pending_zero(redis: &ConnectionManager, timeout: Duration) -> bool {
    let started = std::time::Instant::now();
    while started.elapsed() < timeout {
        if total_pending(redis).await == 0 {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

async fn partition_lengths(redis: &ConnectionManager) -> Vec<i64> {
    let mut lengths = Vec::new();
    for stream in TestStream::partition_streams() {
        let consumer = StreamConsumer::new(
            redis.clone(),
            stream,
            TestStream::CONSUMER_GROUP,
            "inspector",
        );
        lengths.push(consumer.stream_length().await.expect("stream length"));
    }
    lengths
}

async fn total_pending(redis: &ConnectionManager) -> i64 {
    let mut total = 0;
    for stream in TestStream::partition_streams() {
        let consumer = StreamConsumer::new(
            redis.clone(),
            stream,
            TestStream::CONSUMER_GROUP,
            "inspector",
        );
        total += consumer.pending_count().await.expect("pending count");
    }
    total
}

#[tokio::test]
async fn test_worker_processes_and_acks_messages() {
    let redis = TestRedis::new().await;
    let mgr = redis.manager().await;

    let producer = StreamProducer::from_stream_def::<TestStream>(mgr.clone());
    producer.send(&message("m1", "key-a", "one")).await.unwrap();
    producer.send(&message("m2", "key-b", "two")).await.unwrap();
    producer.send(&message("m3", "key-c", "three")).await.unwrap();

    let processor = Arc::new(RecordingProcessor::default());
    let (tx, handle) = spawn_worker(mgr.clone(), Arc::clone(&processor), worker_config());

    let processed = {
        let processor = Arc::clone(&processor);
        wait_until(Duration::from_secs(15), move || processor.seen().len() == 3).await
    };
    assert!(processed, "worker did not process all messages in time");
    assert!(
        wait_for_pending_zero(&mgr, Duration::from_secs(5)).await,
        "entries were not acknowledged"
    );

    let dlq = DlqManager::new(Arc::new(mgr.clone()), TestStream::DLQ_STREAM);
    assert_eq!(dlq.stats().await.unwrap().length, 0);

    stop_worker(tx, handle).await;
}

#[tokio::test]
async fn test_worker_preserves_per_key_order() {
    let redis = TestRedis::new().await;
    let mgr = redis.manager().await;

    let producer = StreamProducer::from_stream_def::<TestStream>(mgr.clone());
    producer.send(&message("a1", "key-a", "first")).await.unwrap();
    producer.send(&message("b1", "key-b", "first")).await.unwrap();
    producer.send(&message("a2", "key-a", "second")).await.unwrap();
    producer.send(&message("c1", "key-c", "first")).await.unwrap();
    producer.send(&message("a3", "key-a", "third")).await.unwrap();

    let processor = Arc::new(RecordingProcessor::default());
    let (tx, handle) = spawn_worker(mgr.clone(), Arc::clone(&processor), worker_config());

    let processed = {
        let processor = Arc::clone(&processor);
        wait_until(Duration::from_secs(15), move || processor.seen().len() == 5).await
    };
    assert!(processed, "worker did not process all messages in time");

    let for_key_a: Vec<String> = processor
        .seen()
        .into_iter()
        .filter(|m| m.key == "key-a")
        .map(|m| m.id)
        .collect();
    assert_eq!(for_key_a, vec!["a1", "a2", "a3"]);

    stop_worker(tx, handle).await;
}

#[tokio::test]
async fn test_worker_parks_undecodable_payloads() {
    let redis = TestRedis::new().await;
    let mgr = redis.manager().await;

    // Append garbage directly: one broken payload, one entry without a job
    // field at all.
    let mut conn = mgr.clone();
    let _: String = redis::cmd("XADD")
        .arg("test:events:0")
        .arg("*")
        .arg("job")
        .arg("{definitely broken")
        .query_async(&mut conn)
        .await
        .unwrap();
    let _: String = redis::cmd("XADD")
        .arg("test:events:0")
        .arg("*")
        .arg("note")
        .arg("no job field")
        .query_async(&mut conn)
        .await
        .unwrap();

    let processor = Arc::new(RecordingProcessor::default());
    let (tx, handle) = spawn_worker(mgr.clone(), Arc::clone(&processor), worker_config());

    let dlq = DlqManager::new(Arc::new(mgr.clone()), TestStream::DLQ_STREAM);
    assert!(
        wait_for_dlq_length(&dlq, 2, Duration::from_secs(15)).await,
        "poison entries were not parked"
    );
    assert!(processor.seen().is_empty());
    assert!(wait_for_pending_zero(&mgr, Duration::from_secs(5)).await);

    let records = dlq.list(10).await.unwrap();
    assert!(records.iter().all(|r| r.entry.source_stream == "test:events:0"));

    stop_worker(tx, handle).await;
}

#[tokio::test]
async fn test_worker_parks_permanent_failures() {
    let redis = TestRedis::new().await;
    let mgr = redis.manager().await;

    let producer = StreamProducer::from_stream_def::<TestStream>(mgr.clone());
    producer.send(&message("m1", "key-a", "poison")).await.unwrap();

    let (tx, handle) = spawn_worker(mgr.clone(), Arc::new(PermanentFailProcessor), worker_config());

    let dlq = DlqManager::new(Arc::new(mgr.clone()), TestStream::DLQ_STREAM);
    assert!(
        wait_for_dlq_length(&dlq, 1, Duration::from_secs(15)).await,
        "permanent failure was not parked"
    );
    assert!(wait_for_pending_zero(&mgr, Duration::from_secs(5)).await);

    let records = dlq.list(10).await.unwrap();
    assert_eq!(records[0].entry.message_id, "m1");
    assert!(records[0].entry.error.contains("business rule violated"));

    stop_worker(tx, handle).await;
}

#[tokio::test]
async fn test_worker_retries_transient_then_succeeds() {
    let redis = TestRedis::new().await;
    let mgr = redis.manager().await;

    let producer = StreamProducer::from_stream_def::<TestStream>(mgr.clone());
    producer.send(&message("m1", "key-a", "flaky")).await.unwrap();

    let processor = Arc::new(RecordingProcessor::failing_first(1));
    let (tx, handle) = spawn_worker(mgr.clone(), Arc::clone(&processor), worker_config());

    let processed = {
        let processor = Arc::clone(&processor);
        wait_until(Duration::from_secs(15), move || processor.seen().len() == 1).await
    };
    assert!(processed, "transient failure was not retried");

    let dlq = DlqManager::new(Arc::new(mgr.clone()), TestStream::DLQ_STREAM);
    assert_eq!(dlq.stats().await.unwrap().length, 0);
    assert!(wait_for_pending_zero(&mgr, Duration::from_secs(5)).await);

    stop_worker(tx, handle).await;
}

#[tokio::test]
async fn test_worker_parks_after_transient_retries_exhausted() {
    let redis = TestRedis::new().await;
    let mgr = redis.manager().await;

    let producer = StreamProducer::from_stream_def::<TestStream>(mgr.clone());
    producer.send(&message("m1", "key-a", "always failing")).await.unwrap();

    let processor = Arc::new(RecordingProcessor::failing_first(100));
    let config = worker_config().with_max_deliveries(2);
    let (tx, handle) = spawn_worker(mgr.clone(), Arc::clone(&processor), config);

    let dlq = DlqManager::new(Arc::new(mgr.clone()), TestStream::DLQ_STREAM);
    assert!(
        wait_for_dlq_length(&dlq, 1, Duration::from_secs(20)).await,
        "exhausted message was not parked"
    );
    assert!(processor.seen().is_empty());
    assert!(wait_for_pending_zero(&mgr, Duration::from_secs(5)).await);

    let records = dlq.list(10).await.unwrap();
    assert!(records[0].entry.error.contains("retries exhausted"));

    stop_worker(tx, handle).await;
}

#[tokio::test]
async fn test_worker_claims_abandoned_entries() {
    let redis = TestRedis::new().await;
    let mgr = redis.manager().await;

    let producer = StreamProducer::from_stream_def::<TestStream>(mgr.clone());
    let msg = message("m1", "key-a", "orphaned");
    producer.send(&msg).await.unwrap();

    // A consumer reads the entry and dies without acknowledging.
    let dead = StreamConsumer::new(
        mgr.clone(),
        TestStream::stream_for("key-a"),
        TestStream::CONSUMER_GROUP,
        "dead-consumer",
    );
    dead.ensure_group().await.unwrap();
    let read = dead.read_new(10).await.unwrap();
    assert_eq!(read.len(), 1);

    tokio::time::sleep(Duration::from_millis(300)).await;

    let processor = Arc::new(RecordingProcessor::default());
    let (tx, handle) = spawn_worker(mgr.clone(), Arc::clone(&processor), worker_config());

    let processed = {
        let processor = Arc::clone(&processor);
        wait_until(Duration::from_secs(20), move || {
            processor.seen().iter().any(|m| m.id == "m1")
        })
        .await
    };
    assert!(processed, "abandoned entry was not claimed and processed");
    assert!(wait_for_pending_zero(&mgr, Duration::from_secs(5)).await);

    stop_worker(tx, handle).await;
}

#[tokio::test]
async fn test_guard_delivers_to_exactly_one_partition() {
    let redis = TestRedis::new().await;
    let mgr = redis.manager().await;

    let guard = GuardedPublisher::new(
        StreamProducer::from_stream_def::<TestStream>(mgr.clone()),
        Arc::new(AlwaysAvailable),
        Arc::new(CircuitBreaker::default_config()),
        DlqManager::new(Arc::new(mgr.clone()), TestStream::DLQ_STREAM),
    );

    let msg = message("m1", "key-a", "hello");
    let outcome = guard.publish(&msg).await.unwrap();
    assert!(outcome.is_delivered());

    let lengths = partition_lengths(&mgr).await;
    assert_eq!(lengths.iter().sum::<i64>(), 1);
    let expected_partition = TestStream::partition_for("key-a") as usize;
    assert_eq!(lengths[expected_partition], 1);

    let dlq = DlqManager::new(Arc::new(mgr.clone()), TestStream::DLQ_STREAM);
    assert_eq!(dlq.stats().await.unwrap().length, 0);
}

#[tokio::test]
async fn test_guard_dead_letters_when_destination_down() {
    let redis = TestRedis::new().await;
    let mgr = redis.manager().await;

    let probe = Arc::new(NeverAvailable::default());
    let guard = GuardedPublisher::new(
        StreamProducer::from_stream_def::<TestStream>(mgr.clone()),
        Arc::clone(&probe) as Arc<dyn AvailabilityProbe>,
        Arc::new(CircuitBreaker::default_config()),
        DlqManager::new(Arc::new(mgr.clone()), TestStream::DLQ_STREAM),
    )
    .with_config(
        GuardConfig::new()
            .with_max_attempts(2)
            .with_initial_backoff_ms(10)
            .without_jitter(),
    );

    let msg = message("m1", "key-a", "will not arrive");
    let outcome = guard.publish(&msg).await.unwrap();
    assert!(matches!(outcome, PublishOutcome::DeadLettered { .. }));
    assert_eq!(probe.calls.load(Ordering::SeqCst), 2);

    // Nothing reached any partition stream; the DLQ holds the message with
    // its payload intact.
    assert_eq!(partition_lengths(&mgr).await.iter().sum::<i64>(), 0);

    let dlq = DlqManager::new(Arc::new(mgr.clone()), TestStream::DLQ_STREAM);
    let records = dlq.list(10).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].entry.message_id, "m1");
    assert_eq!(records[0].entry.delivery_count, 2);
    assert_eq!(records[0].entry.source_stream, TestStream::stream_for("key-a"));

    let replayed: TestMessage =
        serde_json::from_value(records[0].entry.payload.clone()).unwrap();
    assert_eq!(replayed, msg);
}

#[tokio::test]
async fn test_guard_diverts_immediately_when_circuit_open() {
    let redis = TestRedis::new().await;
    let mgr = redis.manager().await;

    let breaker = Arc::new(CircuitBreaker::new(
        CircuitBreakerConfig::new().with_failure_threshold(1),
    ));
    breaker.record_failure();
    assert_eq!(breaker.state(), CircuitState::Open);

    let probe = Arc::new(NeverAvailable::default());
    let guard = GuardedPublisher::new(
        StreamProducer::from_stream_def::<TestStream>(mgr.clone()),
        Arc::clone(&probe) as Arc<dyn AvailabilityProbe>,
        Arc::clone(&breaker),
        DlqManager::new(Arc::new(mgr.clone()), TestStream::DLQ_STREAM),
    );

    let outcome = guard.publish(&message("m1", "key-a", "fast fail")).await.unwrap();
    assert!(!outcome.is_delivered());
    // The open circuit short-circuits before the probe runs.
    assert_eq!(probe.calls.load(Ordering::SeqCst), 0);

    let dlq = DlqManager::new(Arc::new(mgr.clone()), TestStream::DLQ_STREAM);
    let records = dlq.list(10).await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].entry.error.contains("circuit breaker open"));
}

#[tokio::test]
async fn test_guard_breaker_opens_after_repeated_failures() {
    let redis = TestRedis::new().await;
    let mgr = redis.manager().await;

    let breaker = Arc::new(CircuitBreaker::new(
        CircuitBreakerConfig::new().with_failure_threshold(3),
    ));
    let probe = Arc::new(NeverAvailable::default());
    let guard = GuardedPublisher::new(
        StreamProducer::from_stream_def::<TestStream>(mgr.clone()),
        Arc::clone(&probe) as Arc<dyn AvailabilityProbe>,
        Arc::clone(&breaker),
        DlqManager::new(Arc::new(mgr.clone()), TestStream::DLQ_STREAM),
    )
    .with_config(
        GuardConfig::new()
            .with_max_attempts(3)
            .with_initial_backoff_ms(10)
            .without_jitter(),
    );

    // An exhausted publish cycle counts as one breaker failure, however
    // many attempts it burned, so a threshold-3 breaker stays closed
    // through two diverted publishes and opens on the third.
    let first = guard.publish(&message("m1", "key-a", "x")).await.unwrap();
    assert!(!first.is_delivered());
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(probe.calls.load(Ordering::SeqCst), 3);

    let second = guard.publish(&message("m2", "key-b", "y")).await.unwrap();
    assert!(!second.is_delivered());
    assert_eq!(breaker.state(), CircuitState::Closed);

    let third = guard.publish(&message("m3", "key-c", "z")).await.unwrap();
    assert!(!third.is_delivered());
    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(probe.calls.load(Ordering::SeqCst), 9);

    // The next publish diverts without probing at all.
    let fourth = guard.publish(&message("m4", "key-d", "w")).await.unwrap();
    assert!(!fourth.is_delivered());
    assert_eq!(probe.calls.load(Ordering::SeqCst), 9);

    let dlq = DlqManager::new(Arc::new(mgr.clone()), TestStream::DLQ_STREAM);
    assert_eq!(dlq.stats().await.unwrap().length, 4);
}

#[tokio::test]
async fn test_dlq_reprocess_requeues_to_source_stream() {
    let redis = TestRedis::new().await;
    let mgr = redis.manager().await;

    let probe = Arc::new(NeverAvailable::default());
    let guard = GuardedPublisher::new(
        StreamProducer::from_stream_def::<TestStream>(mgr.clone()),
        Arc::clone(&probe) as Arc<dyn AvailabilityProbe>,
        Arc::new(CircuitBreaker::default_config()),
        DlqManager::new(Arc::new(mgr.clone()), TestStream::DLQ_STREAM),
    )
    .with_config(
        GuardConfig::new()
            .with_max_attempts(1)
            .without_jitter(),
    );

    let msg = message("m1", "key-a", "second chance");
    guard.publish(&msg).await.unwrap();

    let dlq = DlqManager::new(Arc::new(mgr.clone()), TestStream::DLQ_STREAM);
    let records = dlq.list(10).await.unwrap();
    assert_eq!(records.len(), 1);

    let new_id = dlq.reprocess(&records[0].id).await.unwrap();
    assert!(new_id.is_some());
    assert_eq!(dlq.stats().await.unwrap().length, 0);

    // The replayed entry is a normal stream entry again; a worker drains it.
    let processor = Arc::new(RecordingProcessor::default());
    let (tx, handle) = spawn_worker(mgr.clone(), Arc::clone(&processor), worker_config());

    let processed = {
        let processor = Arc::clone(&processor);
        wait_until(Duration::from_secs(15), move || {
            processor.seen().iter().any(|m| m.id == "m1")
        })
        .await
    };
    assert!(processed, "replayed entry was not processed");

    stop_worker(tx, handle).await;
}

#[tokio::test]
async fn test_admin_endpoints_respond() {
    let redis = TestRedis::new().await;
    let mgr = redis.manager().await;

    let state = event_stream::health::HealthState::new(
        mgr.clone(),
        "audit-worker",
        "0.1.0",
        &worker_config(),
    );
    let app = event_stream::admin_router(state);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["name"], "audit-worker");

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/streams").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["partitions"].as_array().unwrap().len(), 3);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/dlq").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["length"], 0);

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
