//! Delivery channels for patient notifications.

use async_trait::async_trait;
use tracing::info;

use crate::error::NotificationResult;

/// Port for the channel notifications leave through.
///
/// The processor hands over fully formatted message text; implementations
/// only carry it. Implementations include push, SMS, email gateways.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver a booking confirmation to the patient.
    async fn send_scheduled_notification(
        &self,
        aggregate_id: &str,
        professional_id: &str,
        patient_id: &str,
        message: &str,
    ) -> NotificationResult<()>;

    /// Deliver a day-before reminder to the patient.
    async fn send_reminder_notification(
        &self,
        aggregate_id: &str,
        professional_id: &str,
        patient_id: &str,
        message: &str,
    ) -> NotificationResult<()>;

    /// Sink name for logging.
    fn name(&self) -> &'static str;
}

/// Sink that writes notifications to the log.
///
/// Stands in for a real channel until one is wired up; the port above is
/// where that implementation plugs in.
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn send_scheduled_notification(
        &self,
        aggregate_id: &str,
        professional_id: &str,
        patient_id: &str,
        message: &str,
    ) -> NotificationResult<()> {
        info!(
            aggregate_id = %aggregate_id,
            professional_id = %professional_id,
            patient_id = %patient_id,
            message = %message,
            "scheduled notification"
        );
        Ok(())
    }

    async fn send_reminder_notification(
        &self,
        aggregate_id: &str,
        professional_id: &str,
        patient_id: &str,
        message: &str,
    ) -> NotificationResult<()> {
        info!(
            aggregate_id = %aggregate_id,
            professional_id = %professional_id,
            patient_id = %patient_id,
            message = %message,
            "reminder notification"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
