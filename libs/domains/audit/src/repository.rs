use async_trait::async_trait;
use domain_appointments::AuditEvent;
use uuid::Uuid;

use crate::error::AuditResult;
use crate::models::AuditLog;

/// Data access port for the audit ledger.
///
/// The ledger is append-only: there is no update or delete operation, and
/// `save` refuses a second row for an event id it has already written.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    /// Persist one event as a new row. An already persisted event id makes
    /// the unique constraint fire; callers map that to a duplicate outcome.
    async fn save(&self, event: &AuditEvent) -> AuditResult<AuditLog>;

    /// Look up the entry for an event id.
    async fn find_by_event_id(&self, event_id: Uuid) -> AuditResult<Option<AuditLog>>;

    /// Every entry of one appointment, oldest first.
    async fn find_by_aggregate_id(&self, aggregate_id: &str) -> AuditResult<Vec<AuditLog>>;

    /// Every entry touching one professional, most recent first.
    async fn find_by_professional_id(&self, professional_id: &str) -> AuditResult<Vec<AuditLog>>;

    /// The whole ledger, most recent first.
    async fn find_all(&self) -> AuditResult<Vec<AuditLog>>;
}
