pub mod codes;
pub mod handlers;
pub mod responses;

pub use codes::ErrorCode;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// JSON body returned for every error, regardless of where it originated.
///
/// Clients branch on `error` (a stable SCREAMING_SNAKE_CASE tag), dashboards
/// aggregate on `code`, and `message` is safe to show to a person. `details`
/// is reserved for structured extras and is omitted when empty.
///
/// ```json
/// {
///   "code": 1011,
///   "error": "SERVICE_UNAVAILABLE",
///   "message": "Service is temporarily unavailable",
///   "details": null
/// }
/// ```
#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Integer code for logs and monitoring
    pub code: i32,
    /// Stable tag for programmatic handling
    pub error: String,
    /// Human-readable description
    pub message: String,
    /// Optional structured context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Error type handlers return when they cannot answer a request.
///
/// Converting into a [`Response`] picks the HTTP status, logs the failure
/// with its [`ErrorCode`], and builds an [`ErrorResponse`] body. Database
/// errors are the only variant that wraps a source error; their raw text is
/// logged but never sent to clients.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal server error: {0}")]
    InternalServerError(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AppError {
    /// HTTP status and error code for this failure.
    fn status_and_code(&self) -> (StatusCode, ErrorCode) {
        match self {
            AppError::Database(err) => map_db_err(err),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, ErrorCode::BadRequest),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NotFound),
            AppError::InternalServerError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::InternalError)
            }
            AppError::ServiceUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, ErrorCode::ServiceUnavailable)
            }
        }
    }

    /// Message placed in the response body.
    ///
    /// Handler-written messages pass through as-is. Database errors fall
    /// back to the code's default so internals stay out of the body.
    fn client_message(self, code: ErrorCode) -> String {
        match self {
            AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::InternalServerError(msg)
            | AppError::ServiceUnavailable(msg) => msg,
            AppError::Database(_) => code.default_message().to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Client mistakes are routine; dependency outages are expected under
        // load; everything else is a bug worth paging on.
        if status.is_client_error() {
            tracing::info!(error_code = code.code(), "{}", self);
        } else if status == StatusCode::SERVICE_UNAVAILABLE {
            tracing::warn!(error_code = code.code(), "{}", self);
        } else {
            tracing::error!(error_code = code.code(), "{}", self);
        }

        let body = ErrorResponse {
            code: code.code(),
            error: code.as_str().to_string(),
            message: self.client_message(code),
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

/// Chooses the HTTP status for a `sea_orm::DbErr`.
///
/// Connection problems surface as 503 so load balancers and probes back off;
/// query and execution failures surface as 502 (the database misbehaved, not
/// the client); everything else is a 500.
fn map_db_err(error: &DbErr) -> (StatusCode, ErrorCode) {
    match error {
        DbErr::RecordNotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::DatabaseNotFound),
        DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, ErrorCode::DatabaseConnection)
        }
        DbErr::Query(_) => (StatusCode::BAD_GATEWAY, ErrorCode::DatabaseQuery),
        DbErr::Exec(_) => (StatusCode::BAD_GATEWAY, ErrorCode::DatabaseExecution),
        DbErr::Type(_) | DbErr::Json(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DatabaseConversion)
        }
        DbErr::Migration(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::MigrationError),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DatabaseUnhandled),
    }
}
