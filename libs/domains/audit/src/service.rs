use std::sync::Arc;

use domain_appointments::AuditEvent;
use sea_orm::{DbErr, SqlErr};
use tracing::{info, instrument};

use crate::error::{AuditError, AuditResult};
use crate::models::{AuditLog, IngestOutcome};
use crate::repository::AuditLogRepository;

/// Ingestion and query service over the audit ledger.
#[derive(Clone)]
pub struct AuditService<R: AuditLogRepository> {
    repository: Arc<R>,
}

impl<R: AuditLogRepository> AuditService<R> {
    pub fn new(repository: R) -> Self {
        Self {
            repository: Arc::new(repository),
        }
    }

    /// Persist an event at most once, keyed by its event id.
    ///
    /// A replayed delivery is detected up front and reported as `Duplicate`.
    /// When two deliveries of the same event race past that lookup, one
    /// insert loses to the unique constraint on `event_id`; that violation
    /// is also mapped to `Duplicate` rather than surfaced as a failure.
    #[instrument(skip(self, event), fields(event_id = %event.event_id, aggregate_id = %event.aggregate_id))]
    pub async fn ingest(&self, event: &AuditEvent) -> AuditResult<IngestOutcome> {
        if self
            .repository
            .find_by_event_id(event.event_id)
            .await?
            .is_some()
        {
            info!("event already persisted, skipping");
            return Ok(IngestOutcome::Duplicate);
        }

        match self.repository.save(event).await {
            Ok(log) => {
                info!(event_type = %log.event_type, "audit log persisted");
                Ok(IngestOutcome::Ingested)
            }
            Err(AuditError::Database(err)) if is_unique_violation(&err) => {
                info!("lost the insert race to a concurrent duplicate, skipping");
                Ok(IngestOutcome::Duplicate)
            }
            Err(err) => Err(err),
        }
    }

    /// Every entry of one appointment, oldest first.
    #[instrument(skip(self))]
    pub async fn appointment_history(&self, aggregate_id: &str) -> AuditResult<Vec<AuditLog>> {
        self.repository.find_by_aggregate_id(aggregate_id).await
    }

    /// Every entry touching one professional, most recent first.
    #[instrument(skip(self))]
    pub async fn professional_history(&self, professional_id: &str) -> AuditResult<Vec<AuditLog>> {
        self.repository.find_by_professional_id(professional_id).await
    }

    /// The whole ledger, most recent first.
    #[instrument(skip(self))]
    pub async fn full_history(&self) -> AuditResult<Vec<AuditLog>> {
        self.repository.find_all().await
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MockAuditLogRepository;
    use chrono::{NaiveDate, NaiveTime};
    use mockall::predicate;

    fn event() -> AuditEvent {
        AuditEvent::created(
            "apt-1",
            "prof-1",
            "pat-1",
            NaiveDate::from_ymd_opt(2024, 12, 20).unwrap(),
            NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            "user-1",
        )
    }

    fn log_for(event: &AuditEvent) -> AuditLog {
        AuditLog {
            event_id: event.event_id,
            aggregate_id: event.aggregate_id.clone(),
            event_type: event.event_type,
            professional_id: event.professional_id.clone(),
            patient_id: event.patient_id.clone(),
            date: event.date,
            hour: event.hour,
            occurred_at: event.occurred_at,
            changed_by: event.changed_by.clone(),
            metadata: event.metadata.clone(),
        }
    }

    #[tokio::test]
    async fn test_ingest_persists_unseen_event() {
        let event = event();
        let log = log_for(&event);
        let mut repo = MockAuditLogRepository::new();
        repo.expect_find_by_event_id()
            .with(predicate::eq(event.event_id))
            .returning(|_| Ok(None));
        repo.expect_save().returning(move |_| Ok(log.clone()));

        let service = AuditService::new(repo);
        let outcome = service.ingest(&event).await.unwrap();
        assert_eq!(outcome, IngestOutcome::Ingested);
    }

    #[tokio::test]
    async fn test_ingest_skips_already_persisted_event() {
        let event = event();
        let log = log_for(&event);
        let mut repo = MockAuditLogRepository::new();
        repo.expect_find_by_event_id()
            .returning(move |_| Ok(Some(log.clone())));
        // No save expectation: a write here fails the test.

        let service = AuditService::new(repo);
        let outcome = service.ingest(&event).await.unwrap();
        assert_eq!(outcome, IngestOutcome::Duplicate);
    }

    #[tokio::test]
    async fn test_ingest_propagates_store_failures() {
        let event = event();
        let mut repo = MockAuditLogRepository::new();
        repo.expect_find_by_event_id()
            .returning(|_| Err(AuditError::Database(DbErr::Custom("down".to_string()))));

        let service = AuditService::new(repo);
        let result = service.ingest(&event).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_appointment_history_forwards_repository_rows() {
        let event = event();
        let log = log_for(&event);
        let expected = vec![log.clone()];
        let mut repo = MockAuditLogRepository::new();
        repo.expect_find_by_aggregate_id()
            .with(predicate::eq("apt-1"))
            .returning(move |_| Ok(vec![log.clone()]));

        let service = AuditService::new(repo);
        let logs = service.appointment_history("apt-1").await.unwrap();
        assert_eq!(logs, expected);
    }

    #[tokio::test]
    async fn test_full_history_forwards_repository_rows() {
        let mut repo = MockAuditLogRepository::new();
        repo.expect_find_all().returning(|| Ok(vec![]));

        let service = AuditService::new(repo);
        let logs = service.full_history().await.unwrap();
        assert!(logs.is_empty());
    }
}
