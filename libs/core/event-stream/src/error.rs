//! Error types and failure categories for stream processing.

use thiserror::Error;

/// How a failure should be treated by workers and publishers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Worth retrying: timeouts, dropped connections, overloaded downstreams.
    Transient,
    /// Retrying cannot help: malformed payloads, violated invariants.
    Permanent,
}

impl ErrorCategory {
    /// First retry delay.
    pub const BASE_DELAY_MS: u64 = 1000;
    /// Ceiling for the exponential backoff.
    pub const MAX_DELAY_MS: u64 = 30_000;

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Permanent => "permanent",
        }
    }

    /// Backoff delay before the next retry, `attempt` counted from 1.
    ///
    /// Permanent failures are never retried, so their delay is zero.
    pub fn backoff_delay_ms(&self, attempt: u32) -> u64 {
        match self {
            Self::Permanent => 0,
            Self::Transient => {
                let exp = attempt.saturating_sub(1).min(16);
                Self::BASE_DELAY_MS
                    .saturating_mul(1u64 << exp)
                    .min(Self::MAX_DELAY_MS)
            }
        }
    }
}

/// Errors produced by the stream pipeline.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Processing failed: {message}")]
    Processing {
        message: String,
        category: ErrorCategory,
    },

    #[error("Circuit breaker is open for {0}")]
    CircuitOpen(String),

    #[error("Destination unavailable: {0}")]
    Unavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StreamError {
    /// A processing failure that should be retried.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Processing {
            message: message.into(),
            category: ErrorCategory::Transient,
        }
    }

    /// A processing failure that should park the message immediately.
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Processing {
            message: message.into(),
            category: ErrorCategory::Permanent,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Redis(_) => ErrorCategory::Transient,
            Self::Malformed(_) => ErrorCategory::Permanent,
            Self::Processing { category, .. } => *category,
            Self::CircuitOpen(_) => ErrorCategory::Transient,
            Self::Unavailable(_) => ErrorCategory::Transient,
            Self::Config(_) => ErrorCategory::Permanent,
            Self::Internal(_) => ErrorCategory::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }

    /// Backoff delay for this error, `attempt` counted from 1.
    pub fn backoff_delay_ms(&self, attempt: u32) -> u64 {
        self.category().backoff_delay_ms(attempt)
    }
}

impl From<serde_json::Error> for StreamError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}
