use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use sea_orm::DbErr;
use thiserror::Error;

/// Errors of the audit domain.
///
/// The read API never turns an empty result into an error (empty histories
/// answer 204), so everything that can go wrong here comes from the store.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error(transparent)]
    Database(#[from] DbErr),
}

pub type AuditResult<T> = Result<T, AuditError>;

impl From<AuditError> for AppError {
    fn from(err: AuditError) -> Self {
        match err {
            AuditError::Database(err) => AppError::Database(err),
        }
    }
}

impl IntoResponse for AuditError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}
