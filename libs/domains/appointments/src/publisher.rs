//! Producer side publishing for appointment events.
//!
//! [`AppointmentEvents`] is the single entry point business code uses to
//! emit audit and notification events. Each event kind carries its own
//! failure policy: audit publishing must never abort the operation that
//! triggered it, while a scheduled notification that cannot be published
//! fails the scheduling operation by default.

use chrono::{NaiveDate, NaiveTime};
use event_stream::{GuardedPublisher, PublishOutcome, StreamError, StreamMessage};
use tracing::{error, instrument, warn};

use crate::error::PublishError;
use crate::events::{AuditEvent, NotificationEvent};

/// Failure handling for one event kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventPolicy {
    /// Surface publish failures to the caller instead of logging them.
    pub propagate_failure: bool,
}

/// Per kind failure policies for the publishing service.
#[derive(Debug, Clone, Copy)]
pub struct PublishPolicy {
    pub audit: EventPolicy,
    pub scheduled: EventPolicy,
    pub reminder: EventPolicy,
}

impl Default for PublishPolicy {
    /// Audit and reminder events are best effort; a scheduled notification
    /// that cannot be published fails the scheduling operation.
    fn default() -> Self {
        Self {
            audit: EventPolicy {
                propagate_failure: false,
            },
            scheduled: EventPolicy {
                propagate_failure: true,
            },
            reminder: EventPolicy {
                propagate_failure: false,
            },
        }
    }
}

/// Publishing service for every appointment event kind.
///
/// Owns one guarded publisher per stream: `audit` must target
/// [`AuditStream`](crate::streams::AuditStream) and `notifications`
/// [`NotificationStream`](crate::streams::NotificationStream).
pub struct AppointmentEvents {
    audit: GuardedPublisher,
    notifications: GuardedPublisher,
    policy: PublishPolicy,
}

impl AppointmentEvents {
    pub fn new(
        audit: GuardedPublisher,
        notifications: GuardedPublisher,
        policy: PublishPolicy,
    ) -> Self {
        Self {
            audit,
            notifications,
            policy,
        }
    }

    /// Record an appointment creation in the audit trail.
    #[instrument(skip(self))]
    pub async fn record_created(
        &self,
        appointment_id: &str,
        professional_id: &str,
        patient_id: &str,
        date: NaiveDate,
        hour: NaiveTime,
        changed_by: &str,
    ) -> Result<Option<PublishOutcome>, PublishError> {
        let event = AuditEvent::created(
            appointment_id,
            professional_id,
            patient_id,
            date,
            hour,
            changed_by,
        );
        self.dispatch(&self.audit, self.policy.audit, "audit", &event)
            .await
    }

    /// Record a reschedule in the audit trail.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip(self))]
    pub async fn record_rescheduled(
        &self,
        appointment_id: &str,
        professional_id: &str,
        patient_id: &str,
        old_date: NaiveDate,
        old_hour: NaiveTime,
        new_date: NaiveDate,
        new_hour: NaiveTime,
        changed_by: &str,
    ) -> Result<Option<PublishOutcome>, PublishError> {
        let event = AuditEvent::rescheduled(
            appointment_id,
            professional_id,
            patient_id,
            old_date,
            old_hour,
            new_date,
            new_hour,
            changed_by,
        );
        self.dispatch(&self.audit, self.policy.audit, "audit", &event)
            .await
    }

    /// Record a cancellation in the audit trail.
    #[instrument(skip(self))]
    pub async fn record_cancelled(
        &self,
        appointment_id: &str,
        professional_id: &str,
        patient_id: &str,
        date: NaiveDate,
        hour: NaiveTime,
        changed_by: &str,
        reason: &str,
    ) -> Result<Option<PublishOutcome>, PublishError> {
        let event = AuditEvent::cancelled(
            appointment_id,
            professional_id,
            patient_id,
            date,
            hour,
            changed_by,
            reason,
        );
        self.dispatch(&self.audit, self.policy.audit, "audit", &event)
            .await
    }

    /// Record a completed appointment in the audit trail.
    #[instrument(skip(self))]
    pub async fn record_completed(
        &self,
        appointment_id: &str,
        professional_id: &str,
        patient_id: &str,
        date: NaiveDate,
        hour: NaiveTime,
        changed_by: &str,
    ) -> Result<Option<PublishOutcome>, PublishError> {
        let event = AuditEvent::completed(
            appointment_id,
            professional_id,
            patient_id,
            date,
            hour,
            changed_by,
        );
        self.dispatch(&self.audit, self.policy.audit, "audit", &event)
            .await
    }

    /// Announce a newly booked appointment to the notification pipeline.
    #[instrument(skip(self))]
    pub async fn announce_scheduled(
        &self,
        appointment_id: &str,
        patient_id: &str,
        professional_id: &str,
        date: NaiveDate,
        hour: NaiveTime,
    ) -> Result<Option<PublishOutcome>, PublishError> {
        let event =
            NotificationEvent::scheduled(appointment_id, patient_id, professional_id, date, hour);
        self.dispatch(&self.notifications, self.policy.scheduled, "scheduled", &event)
            .await
    }

    /// Announce a next day reminder to the notification pipeline.
    #[instrument(skip(self))]
    pub async fn announce_reminder(
        &self,
        appointment_id: &str,
        patient_id: &str,
        professional_id: &str,
        date: NaiveDate,
        hour: NaiveTime,
    ) -> Result<Option<PublishOutcome>, PublishError> {
        let event =
            NotificationEvent::reminder(appointment_id, patient_id, professional_id, date, hour);
        self.dispatch(&self.notifications, self.policy.reminder, "reminder", &event)
            .await
    }

    async fn dispatch<M: StreamMessage>(
        &self,
        publisher: &GuardedPublisher,
        policy: EventPolicy,
        kind: &'static str,
        event: &M,
    ) -> Result<Option<PublishOutcome>, PublishError> {
        apply_policy(kind, policy, publisher.publish(event).await)
    }
}

/// Translate a raw publish result according to the kind's failure policy.
///
/// A suppressed failure returns `Ok(None)`: the event is already parked or
/// lost, and the caller is expected to carry on.
fn apply_policy(
    kind: &'static str,
    policy: EventPolicy,
    result: Result<PublishOutcome, StreamError>,
) -> Result<Option<PublishOutcome>, PublishError> {
    match result {
        Ok(outcome @ PublishOutcome::Delivered { .. }) => Ok(Some(outcome)),
        Ok(PublishOutcome::DeadLettered { dlq_id }) => {
            if policy.propagate_failure {
                Err(PublishError::Diverted { kind, dlq_id })
            } else {
                warn!(kind, dlq_id = %dlq_id, "event diverted to dead letter stream");
                Ok(Some(PublishOutcome::DeadLettered { dlq_id }))
            }
        }
        Err(source) => {
            if policy.propagate_failure {
                Err(PublishError::Failed { kind, source })
            } else {
                error!(kind, error = %source, "event publish failed, continuing");
                Ok(None)
            }
        }
    }
}
