//! Stream processor that feeds the audit ledger.

use async_trait::async_trait;
use domain_appointments::AuditEvent;
use event_stream::{MessageProcessor, StreamError};
use tracing::{error, info};

use crate::models::IngestOutcome;
use crate::repository::AuditLogRepository;
use crate::service::AuditService;

/// Consumes appointment audit events and persists each one at most once.
///
/// Both ingest outcomes acknowledge the entry: a duplicate delivery is the
/// broker doing its job, not a failure. Only store errors surface, which
/// leaves the entry pending for redelivery.
pub struct AuditIngestProcessor<R: AuditLogRepository> {
    service: AuditService<R>,
}

impl<R: AuditLogRepository> AuditIngestProcessor<R> {
    pub fn new(service: AuditService<R>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<R: AuditLogRepository + 'static> MessageProcessor<AuditEvent> for AuditIngestProcessor<R> {
    async fn process(&self, event: &AuditEvent) -> Result<(), StreamError> {
        match self.service.ingest(event).await {
            Ok(IngestOutcome::Ingested) => Ok(()),
            Ok(IngestOutcome::Duplicate) => {
                info!(event_id = %event.event_id, "duplicate delivery acknowledged");
                Ok(())
            }
            Err(err) => {
                error!(
                    event_id = %event.event_id,
                    error = %err,
                    "ingestion failed, leaving entry for redelivery"
                );
                Err(StreamError::transient(err.to_string()))
            }
        }
    }

    fn name(&self) -> &'static str {
        "audit_ingest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuditLog;
    use crate::repository::MockAuditLogRepository;
    use chrono::{NaiveDate, NaiveTime};
    use sea_orm::DbErr;

    fn event() -> AuditEvent {
        AuditEvent::completed(
            "apt-1",
            "prof-1",
            "pat-1",
            NaiveDate::from_ymd_opt(2024, 12, 20).unwrap(),
            NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            "prof-1",
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
    async fn test_fresh_event_is_acknowledged() {
        let event = event();
        let log = log_for(&event);
        let mut repo = MockAuditLogRepository::new();
        repo.expect_find_by_event_id().returning(|_| Ok(None));
        repo.expect_save().returning(move |_| Ok(log.clone()));

        let processor = AuditIngestProcessor::new(AuditService::new(repo));
        assert!(processor.process(&event).await.is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_delivery_is_acknowledged_not_failed() {
        let event = event();
        let log = log_for(&event);
        let mut repo = MockAuditLogRepository::new();
        repo.expect_find_by_event_id()
            .returning(move |_| Ok(Some(log.clone())));

        let processor = AuditIngestProcessor::new(AuditService::new(repo));
        assert!(processor.process(&event).await.is_ok());
    }

    #[tokio::test]
    async fn test_store_failure_surfaces_as_transient() {
        let event = event();
        let mut repo = MockAuditLogRepository::new();
        repo.expect_find_by_event_id().returning(|_| {
            Err(crate::error::AuditError::Database(DbErr::Custom(
                "store down".to_string(),
            )))
        });

        let processor = AuditIngestProcessor::new(AuditService::new(repo));
        let err = processor.process(&event).await.unwrap_err();
        assert!(err.is_transient());
    }
}
