//! Appointment event models.
//!
//! The two event families leaving the appointment domain: audit trail
//! events describing every change to an appointment, and patient facing
//! notification events. The JSON field names are the wire contract shared
//! with the workers, so they stay camelCase on the wire regardless of the
//! Rust field names.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use event_stream::StreamMessage;
use sea_orm::sea_query::StringLen;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use serde_json::json;
use strum::{Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

/// Serde adapter keeping hour fields on the wire as `HH:mm`.
pub mod hour_format {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Wire format for appointment hours.
    pub const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(hour: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hour.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}

fn hour_string(hour: NaiveTime) -> String {
    hour.format(hour_format::FORMAT).to_string()
}

/// What happened to an appointment.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    DeriveActiveEnum,
    EnumIter,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(50))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventKind {
    #[sea_orm(string_value = "CREATED")]
    Created,
    #[sea_orm(string_value = "RESCHEDULED")]
    Rescheduled,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
}

/// Immutable audit fact about one appointment change.
///
/// Built exactly once by a factory, published as a single JSON document,
/// and persisted verbatim by the audit worker. `event_id` is the sole
/// idempotency key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    /// Unique event id, assigned at construction and never reused.
    pub event_id: Uuid,
    /// Appointment this event belongs to. Also the partition routing key.
    pub aggregate_id: String,
    pub event_type: AuditEventKind,
    pub professional_id: String,
    pub patient_id: String,
    /// Appointment date after the change.
    pub date: NaiveDate,
    /// Appointment hour after the change, `HH:mm` on the wire.
    #[serde(with = "hour_format")]
    #[schema(value_type = String, example = "14:00")]
    pub hour: NaiveTime,
    /// When the business fact happened, not when it was transmitted.
    pub occurred_at: DateTime<Utc>,
    /// Actor that made the change.
    pub changed_by: String,
    /// Kind specific details as a JSON encoded string; readers re-parse.
    pub metadata: String,
}

impl AuditEvent {
    /// Audit fact for a newly created appointment.
    pub fn created(
        appointment_id: impl Into<String>,
        professional_id: impl Into<String>,
        patient_id: impl Into<String>,
        date: NaiveDate,
        hour: NaiveTime,
        changed_by: impl Into<String>,
    ) -> Self {
        let metadata = json!({
            "action": "appointment created",
            "date": date,
            "hour": hour_string(hour),
        });
        Self::build(
            appointment_id,
            AuditEventKind::Created,
            professional_id,
            patient_id,
            date,
            hour,
            changed_by,
            metadata,
        )
    }

    /// Audit fact for a rescheduled appointment.
    ///
    /// The event carries the new slot; the metadata records both sides of
    /// the move.
    #[allow(clippy::too_many_arguments)]
    pub fn rescheduled(
        appointment_id: impl Into<String>,
        professional_id: impl Into<String>,
        patient_id: impl Into<String>,
        old_date: NaiveDate,
        old_hour: NaiveTime,
        new_date: NaiveDate,
        new_hour: NaiveTime,
        changed_by: impl Into<String>,
    ) -> Self {
        let metadata = json!({
            "action": "appointment rescheduled",
            "from": { "date": old_date, "hour": hour_string(old_hour) },
            "to": { "date": new_date, "hour": hour_string(new_hour) },
        });
        Self::build(
            appointment_id,
            AuditEventKind::Rescheduled,
            professional_id,
            patient_id,
            new_date,
            new_hour,
            changed_by,
            metadata,
        )
    }

    /// Audit fact for a cancelled appointment. The reason only appears in
    /// the metadata.
    pub fn cancelled(
        appointment_id: impl Into<String>,
        professional_id: impl Into<String>,
        patient_id: impl Into<String>,
        date: NaiveDate,
        hour: NaiveTime,
        changed_by: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        let metadata = json!({
            "action": "appointment cancelled",
            "reason": reason.into(),
        });
        Self::build(
            appointment_id,
            AuditEventKind::Cancelled,
            professional_id,
            patient_id,
            date,
            hour,
            changed_by,
            metadata,
        )
    }

    /// Audit fact for a completed appointment.
    pub fn completed(
        appointment_id: impl Into<String>,
        professional_id: impl Into<String>,
        patient_id: impl Into<String>,
        date: NaiveDate,
        hour: NaiveTime,
        changed_by: impl Into<String>,
    ) -> Self {
        let metadata = json!({
            "action": "appointment completed",
            "date": date,
            "hour": hour_string(hour),
        });
        Self::build(
            appointment_id,
            AuditEventKind::Completed,
            professional_id,
            patient_id,
            date,
            hour,
            changed_by,
            metadata,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        appointment_id: impl Into<String>,
        event_type: AuditEventKind,
        professional_id: impl Into<String>,
        patient_id: impl Into<String>,
        date: NaiveDate,
        hour: NaiveTime,
        changed_by: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            aggregate_id: appointment_id.into(),
            event_type,
            professional_id: professional_id.into(),
            patient_id: patient_id.into(),
            date,
            hour,
            occurred_at: Utc::now(),
            changed_by: changed_by.into(),
            metadata: metadata.to_string(),
        }
    }
}

impl StreamMessage for AuditEvent {
    fn message_id(&self) -> String {
        self.event_id.to_string()
    }

    fn routing_key(&self) -> &str {
        &self.aggregate_id
    }
}

/// Patient facing notification event.
///
/// Internally tagged by `eventType`, so consumers key on the wire field
/// rather than on producer type names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "eventType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationEvent {
    /// An appointment was just booked.
    Scheduled(NotificationPayload),
    /// The appointment happens tomorrow.
    Reminder(NotificationPayload),
}

/// Fields shared by both notification kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    /// Appointment id. Also the partition routing key.
    pub aggregate_id: String,
    pub patient_id: String,
    pub professional_id: String,
    pub date: NaiveDate,
    #[serde(with = "hour_format")]
    pub hour: NaiveTime,
    /// Ready to send text, built by the producer.
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl NotificationEvent {
    /// Notification that an appointment was booked.
    pub fn scheduled(
        appointment_id: impl Into<String>,
        patient_id: impl Into<String>,
        professional_id: impl Into<String>,
        date: NaiveDate,
        hour: NaiveTime,
    ) -> Self {
        let message = format!(
            "Your appointment has been scheduled for {} at {}",
            date.format("%d/%m/%Y"),
            hour_string(hour),
        );
        Self::Scheduled(NotificationPayload::new(
            appointment_id,
            patient_id,
            professional_id,
            date,
            hour,
            message,
        ))
    }

    /// Reminder for an appointment happening tomorrow.
    pub fn reminder(
        appointment_id: impl Into<String>,
        patient_id: impl Into<String>,
        professional_id: impl Into<String>,
        date: NaiveDate,
        hour: NaiveTime,
    ) -> Self {
        let message = format!(
            "Reminder: your appointment is tomorrow at {}",
            hour_string(hour),
        );
        Self::Reminder(NotificationPayload::new(
            appointment_id,
            patient_id,
            professional_id,
            date,
            hour,
            message,
        ))
    }

    /// The shared payload, whatever the kind.
    pub fn payload(&self) -> &NotificationPayload {
        match self {
            Self::Scheduled(payload) | Self::Reminder(payload) => payload,
        }
    }
}

impl NotificationPayload {
    fn new(
        appointment_id: impl Into<String>,
        patient_id: impl Into<String>,
        professional_id: impl Into<String>,
        date: NaiveDate,
        hour: NaiveTime,
        message: String,
    ) -> Self {
        Self {
            aggregate_id: appointment_id.into(),
            patient_id: patient_id.into(),
            professional_id: professional_id.into(),
            date,
            hour,
            message,
            created_at: Utc::now(),
        }
    }
}

impl StreamMessage for NotificationEvent {
    /// Notifications carry no event id of their own; the id is derived for
    /// logging and dead letter bookkeeping.
    fn message_id(&self) -> String {
        let payload = self.payload();
        format!(
            "{}:{}",
            payload.aggregate_id,
            payload.created_at.timestamp_millis()
        )
    }

    fn routing_key(&self) -> &str {
        &self.payload().aggregate_id
    }
}
