//! Errors for the producer side of the appointment pipeline.

use event_stream::StreamError;
use thiserror::Error;

/// Failure surfaced by [`AppointmentEvents`](crate::publisher::AppointmentEvents)
/// when the event kind's policy propagates publish failures.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The event could not be written anywhere, including the dead letter
    /// stream.
    #[error("{kind} event publish failed: {source}")]
    Failed {
        kind: &'static str,
        #[source]
        source: StreamError,
    },

    /// The event was preserved on the dead letter stream instead of
    /// reaching its primary stream.
    #[error("{kind} event diverted to dead letter stream as {dlq_id}")]
    Diverted { kind: &'static str, dlq_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_the_kind() {
        let failed = PublishError::Failed {
            kind: "scheduled",
            source: StreamError::transient("broker unreachable"),
        };
        assert!(failed.to_string().starts_with("scheduled event publish failed"));

        let diverted = PublishError::Diverted {
            kind: "audit",
            dlq_id: "3-0".to_string(),
        };
        assert_eq!(
            diverted.to_string(),
            "audit event diverted to dead letter stream as 3-0"
        );
    }
}
