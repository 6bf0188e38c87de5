//! Error types for the notifications domain.

use thiserror::Error;

/// Result type for notification operations.
pub type NotificationResult<T> = Result<T, NotificationError>;

/// Errors a delivery channel can report.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The channel accepted the request but could not deliver.
    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    /// The channel itself is unreachable or misconfigured.
    #[error("Channel unavailable: {0}")]
    ChannelUnavailable(String),
}
