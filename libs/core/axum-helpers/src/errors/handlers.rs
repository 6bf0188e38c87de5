//! Router fallbacks that keep unmatched requests on the JSON error shape.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::{ErrorCode, ErrorResponse};

fn fallback_body(code: ErrorCode, message: &str) -> Json<ErrorResponse> {
    Json(ErrorResponse {
        code: code.code(),
        error: code.as_str().to_string(),
        message: message.to_string(),
        details: None,
    })
}

/// Fallback for paths no route matches.
pub async fn not_found() -> Response {
    let body = fallback_body(ErrorCode::NotFound, "The requested resource was not found");
    (StatusCode::NOT_FOUND, body).into_response()
}

/// Fallback for known paths hit with the wrong HTTP method.
pub async fn method_not_allowed() -> Response {
    let body = fallback_body(
        ErrorCode::BadRequest,
        "The HTTP method is not allowed for this resource",
    );
    (StatusCode::METHOD_NOT_ALLOWED, body).into_response()
}
