//! Stream definitions for appointment events.
//!
//! Producer and workers both build their topology from these definitions,
//! so stream names, consumer groups, and partition counts agree through the
//! type system instead of configuration.

use event_stream::StreamDef;

/// Audit trail stream.
///
/// Every appointment change event flows through here to the audit worker,
/// partitioned by appointment id so one appointment's history stays in
/// publish order.
pub struct AuditStream;

impl StreamDef for AuditStream {
    /// Partition streams are `clinicboard:appointments:audit:{0,1,2}`.
    const STREAM_BASE: &'static str = "clinicboard:appointments:audit";

    /// Consumer group of the audit worker.
    const CONSUMER_GROUP: &'static str = "audit-consumer-group";

    /// Audit events that could not be delivered or processed.
    const DLQ_STREAM: &'static str = "clinicboard:appointments:audit:dlq";
}

/// Scheduled and reminder notification stream.
///
/// Carries the patient facing events consumed by the notification worker;
/// losing one of these never affects the audit trail.
pub struct NotificationStream;

impl StreamDef for NotificationStream {
    /// Partition streams are `clinicboard:appointments:events:{0,1,2}`.
    const STREAM_BASE: &'static str = "clinicboard:appointments:events";

    /// Consumer group of the notification worker.
    const CONSUMER_GROUP: &'static str = "notification-consumer-group";

    /// Notification events that could not be delivered or processed.
    const DLQ_STREAM: &'static str = "clinicboard:appointments:events:dlq";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_stream_def() {
        assert_eq!(AuditStream::STREAM_BASE, "clinicboard:appointments:audit");
        assert_eq!(AuditStream::CONSUMER_GROUP, "audit-consumer-group");
        assert_eq!(AuditStream::DLQ_STREAM, "clinicboard:appointments:audit:dlq");
        assert_eq!(AuditStream::PARTITIONS, 3);
    }

    #[test]
    fn test_notification_stream_def() {
        assert_eq!(
            NotificationStream::STREAM_BASE,
            "clinicboard:appointments:events"
        );
        assert_eq!(
            NotificationStream::CONSUMER_GROUP,
            "notification-consumer-group"
        );
        assert_eq!(
            NotificationStream::DLQ_STREAM,
            "clinicboard:appointments:events:dlq"
        );
        assert_eq!(NotificationStream::PARTITIONS, 3);
    }

    #[test]
    fn test_one_appointment_maps_to_one_partition_stream() {
        let partition = AuditStream::partition_for("appointment-123");
        assert!(partition < AuditStream::PARTITIONS);
        assert_eq!(
            AuditStream::stream_for("appointment-123"),
            format!("clinicboard:appointments:audit:{partition}")
        );
        assert_eq!(AuditStream::partition_for("appointment-123"), partition);
    }
}
