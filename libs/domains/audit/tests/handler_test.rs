//! Handler tests for the audit read API.
//!
//! Exercises the three endpoints through real HTTP requests against the
//! router, backed by a real Postgres: status codes, the 204 empty form,
//! and the wire shape of returned entries.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use domain_appointments::{AuditEvent, AuditEventKind};
use domain_audit::{AuditLog, AuditService, PgAuditLogRepository, handlers};
use http_body_util::BodyExt;
use test_utils::TestDatabase;
use tower::ServiceExt; // For oneshot()
use uuid::Uuid;

// Helper to parse JSON response body
async fn json_body<T: serde::de::DeserializeOwned>(body: Body) -> T {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 4, 2).unwrap()
}

fn hour() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap()
}

fn event_at(
    aggregate_id: &str,
    professional_id: &str,
    kind: AuditEventKind,
    occurred_at: DateTime<Utc>,
) -> AuditEvent {
    AuditEvent {
        event_id: Uuid::new_v4(),
        aggregate_id: aggregate_id.to_string(),
        event_type: kind,
        professional_id: professional_id.to_string(),
        patient_id: "pat-1".to_string(),
        date: date(),
        hour: hour(),
        occurred_at,
        changed_by: "reception".to_string(),
        metadata: r#"{"action":"appointment created","date":"2025-04-02","hour":"09:00"}"#
            .to_string(),
    }
}

#[tokio::test]
async fn test_appointment_history_returns_200_with_entries() {
    let db = TestDatabase::new().await;
    let service = AuditService::new(PgAuditLogRepository::new(db.connection()));

    let created = AuditEvent::created("apt-http", "prof-1", "pat-1", date(), hour(), "reception");
    let completed = AuditEvent::completed("apt-http", "prof-1", "pat-1", date(), hour(), "prof-1");
    service.ingest(&created).await.unwrap();
    service.ingest(&completed).await.unwrap();

    let app = handlers::router(service);

    let request = Request::builder()
        .method("GET")
        .uri("/appointment/apt-http")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let logs: Vec<AuditLog> = json_body(response.into_body()).await;
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|log| log.aggregate_id == "apt-http"));
}

#[tokio::test]
async fn test_appointment_history_uses_wire_field_names() {
    let db = TestDatabase::new().await;
    let service = AuditService::new(PgAuditLogRepository::new(db.connection()));

    let event = AuditEvent::created("apt-wire", "prof-1", "pat-1", date(), hour(), "reception");
    service.ingest(&event).await.unwrap();

    let app = handlers::router(service);

    let request = Request::builder()
        .method("GET")
        .uri("/appointment/apt-wire")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = json_body(response.into_body()).await;
    let entry = &body[0];
    assert_eq!(entry["eventId"], event.event_id.to_string());
    assert_eq!(entry["aggregateId"], "apt-wire");
    assert_eq!(entry["eventType"], "CREATED");
    assert_eq!(entry["hour"], "09:00");
    assert_eq!(entry["date"], "2025-04-02");
    assert!(entry.get("event_id").is_none());
}

#[tokio::test]
async fn test_appointment_history_returns_204_when_unknown() {
    let db = TestDatabase::new().await;
    let service = AuditService::new(PgAuditLogRepository::new(db.connection()));
    let app = handlers::router(service);

    let request = Request::builder()
        .method("GET")
        .uri("/appointment/never-seen")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn test_professional_history_returns_most_recent_first() {
    let db = TestDatabase::new().await;
    let service = AuditService::new(PgAuditLogRepository::new(db.connection()));

    let base = Utc.with_ymd_and_hms(2025, 4, 2, 8, 0, 0).unwrap();
    let older = event_at("apt-1", "prof-http", AuditEventKind::Created, base);
    let newer = event_at(
        "apt-2",
        "prof-http",
        AuditEventKind::Created,
        base + Duration::hours(1),
    );
    service.ingest(&older).await.unwrap();
    service.ingest(&newer).await.unwrap();

    let app = handlers::router(service);

    let request = Request::builder()
        .method("GET")
        .uri("/professional/prof-http")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let logs: Vec<AuditLog> = json_body(response.into_body()).await;
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].event_id, newer.event_id);
    assert_eq!(logs[1].event_id, older.event_id);
}

#[tokio::test]
async fn test_professional_history_returns_204_when_unknown() {
    let db = TestDatabase::new().await;
    let service = AuditService::new(PgAuditLogRepository::new(db.connection()));
    let app = handlers::router(service);

    let request = Request::builder()
        .method("GET")
        .uri("/professional/prof-unknown")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_full_history_answers_204_then_200_after_ingest() {
    let db = TestDatabase::new().await;
    let service = AuditService::new(PgAuditLogRepository::new(db.connection()));
    let app = handlers::router(service);

    let request = Request::builder()
        .method("GET")
        .uri("/")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Same database, fresh service handle for the write side.
    let writer = AuditService::new(PgAuditLogRepository::new(db.connection()));
    let event = AuditEvent::created("apt-full", "prof-1", "pat-1", date(), hour(), "reception");
    writer.ingest(&event).await.unwrap();

    let request = Request::builder()
        .method("GET")
        .uri("/")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let logs: Vec<AuditLog> = json_body(response.into_body()).await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].event_id, event.event_id);
}
