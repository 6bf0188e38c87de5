use axum::Router;
use domain_audit::{AuditService, PgAuditLogRepository, handlers};

pub fn router(state: &crate::state::AppState) -> Router {
    let repository = PgAuditLogRepository::new(state.db.clone());
    let service = AuditService::new(repository);
    handlers::router(service)
}
