use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use axum_helpers::errors::responses::{InternalServerErrorResponse, ServiceUnavailableResponse};
use domain_appointments::AuditEventKind;
use utoipa::OpenApi;

use crate::error::AuditResult;
use crate::models::AuditLog;
use crate::repository::AuditLogRepository;
use crate::service::AuditService;

/// OpenAPI documentation for the audit trail API
#[derive(OpenApi)]
#[openapi(
    paths(full_history, appointment_history, professional_history),
    components(
        schemas(AuditLog, AuditEventKind),
        responses(InternalServerErrorResponse, ServiceUnavailableResponse)
    ),
    tags(
        (name = "audit", description = "Appointment audit trail queries")
    )
)]
pub struct ApiDoc;

/// Create the audit router with the three read endpoints
pub fn router<R: AuditLogRepository + 'static>(service: AuditService<R>) -> Router {
    let shared_service = Arc::new(service);

    Router::new()
        .route("/", get(full_history))
        .route("/appointment/{appointmentId}", get(appointment_history))
        .route("/professional/{professionalId}", get(professional_history))
        .with_state(shared_service)
}

/// Full audit trail across all appointments, most recent first
#[utoipa::path(
    get,
    path = "",
    tag = "audit",
    responses(
        (status = 200, description = "Audit trail entries", body = Vec<AuditLog>),
        (status = 204, description = "The ledger is empty"),
        (status = 500, response = InternalServerErrorResponse),
        (status = 503, response = ServiceUnavailableResponse)
    )
)]
async fn full_history<R: AuditLogRepository>(
    State(service): State<Arc<AuditService<R>>>,
) -> AuditResult<Response> {
    let logs = service.full_history().await?;
    Ok(list_or_no_content(logs))
}

/// Audit trail of one appointment, in chronological order
#[utoipa::path(
    get,
    path = "/appointment/{appointmentId}",
    tag = "audit",
    params(
        ("appointmentId" = String, Path, description = "Appointment identifier")
    ),
    responses(
        (status = 200, description = "Audit trail entries", body = Vec<AuditLog>),
        (status = 204, description = "No entries for this appointment"),
        (status = 500, response = InternalServerErrorResponse),
        (status = 503, response = ServiceUnavailableResponse)
    )
)]
async fn appointment_history<R: AuditLogRepository>(
    State(service): State<Arc<AuditService<R>>>,
    Path(appointment_id): Path<String>,
) -> AuditResult<Response> {
    let logs = service.appointment_history(&appointment_id).await?;
    Ok(list_or_no_content(logs))
}

/// Everything recorded for one professional, most recent first
#[utoipa::path(
    get,
    path = "/professional/{professionalId}",
    tag = "audit",
    params(
        ("professionalId" = String, Path, description = "Professional identifier")
    ),
    responses(
        (status = 200, description = "Audit trail entries", body = Vec<AuditLog>),
        (status = 204, description = "No entries for this professional"),
        (status = 500, response = InternalServerErrorResponse),
        (status = 503, response = ServiceUnavailableResponse)
    )
)]
async fn professional_history<R: AuditLogRepository>(
    State(service): State<Arc<AuditService<R>>>,
    Path(professional_id): Path<String>,
) -> AuditResult<Response> {
    let logs = service.professional_history(&professional_id).await?;
    Ok(list_or_no_content(logs))
}

// An empty history answers 204 with no body, never an empty JSON array.
fn list_or_no_content(logs: Vec<AuditLog>) -> Response {
    if logs.is_empty() {
        StatusCode::NO_CONTENT.into_response()
    } else {
        Json(logs).into_response()
    }
}
