//! Stream processor that fans notification events out to a sink.

use std::sync::Arc;

use async_trait::async_trait;
use domain_appointments::NotificationEvent;
use event_stream::{MessageProcessor, StreamError};
use tracing::{error, info};

use crate::sink::NotificationSink;

/// Delivers notification events through the configured sink.
///
/// Sink failures are logged and swallowed: a notification the channel
/// could not carry is gone, it does not come back through redelivery.
pub struct NotificationProcessor<S: NotificationSink> {
    sink: Arc<S>,
}

impl<S: NotificationSink + 'static> NotificationProcessor<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink: Arc::new(sink),
        }
    }

    /// Get a reference to the sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }
}

#[async_trait]
impl<S: NotificationSink + 'static> MessageProcessor<NotificationEvent>
    for NotificationProcessor<S>
{
    async fn process(&self, event: &NotificationEvent) -> Result<(), StreamError> {
        let payload = event.payload();
        let result = match event {
            NotificationEvent::Scheduled(_) => {
                self.sink
                    .send_scheduled_notification(
                        &payload.aggregate_id,
                        &payload.professional_id,
                        &payload.patient_id,
                        &payload.message,
                    )
                    .await
            }
            NotificationEvent::Reminder(_) => {
                self.sink
                    .send_reminder_notification(
                        &payload.aggregate_id,
                        &payload.professional_id,
                        &payload.patient_id,
                        &payload.message,
                    )
                    .await
            }
        };

        match result {
            Ok(()) => info!(
                sink = self.sink.name(),
                aggregate_id = %payload.aggregate_id,
                patient_id = %payload.patient_id,
                "notification delivered"
            ),
            Err(err) => error!(
                sink = self.sink.name(),
                aggregate_id = %payload.aggregate_id,
                patient_id = %payload.patient_id,
                error = %err,
                "notification delivery failed, dropping"
            ),
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "notification_dispatch"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotificationError;
    use crate::sink::MockNotificationSink;
    use chrono::{NaiveDate, NaiveTime};

    fn scheduled() -> NotificationEvent {
        NotificationEvent::scheduled(
            "apt-1",
            "pat-1",
            "prof-1",
            NaiveDate::from_ymd_opt(2024, 12, 20).unwrap(),
            NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
        )
    }

    fn reminder() -> NotificationEvent {
        NotificationEvent::reminder(
            "apt-1",
            "pat-1",
            "prof-1",
            NaiveDate::from_ymd_opt(2024, 12, 20).unwrap(),
            NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_scheduled_event_goes_to_the_scheduled_channel() {
        let mut sink = MockNotificationSink::new();
        sink.expect_send_scheduled_notification()
            .withf(|aggregate_id, _prof, patient_id, message| {
                aggregate_id == "apt-1"
                    && patient_id == "pat-1"
                    && message.contains("has been scheduled")
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        sink.expect_name().return_const("mock");

        let processor = NotificationProcessor::new(sink);
        assert!(processor.process(&scheduled()).await.is_ok());
    }

    #[tokio::test]
    async fn test_reminder_event_goes_to_the_reminder_channel() {
        let mut sink = MockNotificationSink::new();
        sink.expect_send_reminder_notification()
            .withf(|_agg, _prof, _pat, message| message.starts_with("Reminder:"))
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        sink.expect_name().return_const("mock");

        let processor = NotificationProcessor::new(sink);
        assert!(processor.process(&reminder()).await.is_ok());
    }

    #[tokio::test]
    async fn test_sink_failure_is_swallowed_not_redelivered() {
        let mut sink = MockNotificationSink::new();
        sink.expect_send_scheduled_notification()
            .times(1)
            .returning(|_, _, _, _| {
                Err(NotificationError::DeliveryFailed("gateway 500".to_string()))
            });
        sink.expect_name().return_const("mock");

        let processor = NotificationProcessor::new(sink);
        // An Ok result acks the entry; the failure never surfaces.
        assert!(processor.process(&scheduled()).await.is_ok());
    }
}
