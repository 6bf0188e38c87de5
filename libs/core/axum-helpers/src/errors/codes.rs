//! Stable error codes shared by every JSON error body.
//!
//! Each code carries three representations kept in one table: the
//! SCREAMING_SNAKE_CASE tag clients branch on, the integer used in
//! structured logs and alerts, and the message returned when a handler
//! has nothing more specific to say.
//!
//! Integer ranges group codes by origin: 1000s are client-facing HTTP
//! outcomes, 2000s are database failures, 3000s are migrations.
//!
//! ```rust
//! use axum_helpers::errors::ErrorCode;
//!
//! assert_eq!(ErrorCode::NotFound.as_str(), "NOT_FOUND");
//! assert_eq!(ErrorCode::DatabaseQuery.code(), 2003);
//! ```

use serde::{Deserialize, Serialize};

/// Error identifiers used across the audit services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Request is malformed or uses an unsupported method
    BadRequest,
    /// No resource at the requested path
    NotFound,
    /// Unexpected failure inside the service
    InternalError,
    /// A dependency the request needs is down
    ServiceUnavailable,
    /// Query matched no rows where one was required
    DatabaseNotFound,
    /// Pool exhausted or the database is unreachable
    DatabaseConnection,
    /// Query was rejected by the database
    DatabaseQuery,
    /// Statement execution failed
    DatabaseExecution,
    /// Row could not be converted into its domain type
    DatabaseConversion,
    /// Database error with no dedicated mapping
    DatabaseUnhandled,
    /// Schema migration failed
    MigrationError,
}

impl ErrorCode {
    /// The full (tag, integer, default message) row for this code.
    const fn spec(self) -> (&'static str, i32, &'static str) {
        match self {
            Self::BadRequest => ("BAD_REQUEST", 1001, "Request is invalid"),
            Self::NotFound => ("NOT_FOUND", 1004, "Resource not found"),
            Self::InternalError => (
                "INTERNAL_ERROR",
                1005,
                "An internal server error occurred",
            ),
            Self::ServiceUnavailable => (
                "SERVICE_UNAVAILABLE",
                1011,
                "Service is temporarily unavailable",
            ),
            Self::DatabaseNotFound => ("DATABASE_NOT_FOUND", 2001, "Database record not found"),
            Self::DatabaseConnection => (
                "DATABASE_CONNECTION",
                2002,
                "Database connection unavailable",
            ),
            Self::DatabaseQuery => ("DATABASE_QUERY", 2003, "Database query failed"),
            Self::DatabaseExecution => ("DATABASE_EXECUTION", 2004, "Database statement failed"),
            Self::DatabaseConversion => (
                "DATABASE_CONVERSION",
                2005,
                "Failed to convert database value",
            ),
            Self::DatabaseUnhandled => ("DATABASE_UNHANDLED", 2099, "Unhandled database error"),
            Self::MigrationError => ("MIGRATION_ERROR", 3001, "Database migration failed"),
        }
    }

    /// Machine-readable tag clients can match on.
    pub fn as_str(&self) -> &'static str {
        self.spec().0
    }

    /// Integer code for logs and monitoring queries.
    pub fn code(&self) -> i32 {
        self.spec().1
    }

    /// Fallback message when the handler supplies none.
    pub fn default_message(&self) -> &'static str {
        self.spec().2
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
