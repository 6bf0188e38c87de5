use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use domain_appointments::AuditEventKind;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// One persisted entry of the appointment audit trail.
///
/// Field names on the wire match the event contract, so an entry read back
/// over the API looks like the event that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    /// Identifier of the event this entry was ingested from.
    pub event_id: Uuid,
    /// Appointment the entry belongs to.
    pub aggregate_id: String,
    pub event_type: AuditEventKind,
    pub professional_id: String,
    pub patient_id: String,
    /// Appointment date the event referred to.
    pub date: NaiveDate,
    /// Appointment hour in 24h `HH:mm`.
    #[serde(with = "domain_appointments::events::hour_format")]
    #[schema(value_type = String, example = "14:00")]
    pub hour: NaiveTime,
    /// When the change happened in the scheduling system.
    pub occurred_at: DateTime<Utc>,
    pub changed_by: String,
    /// Event-specific context, kept as the JSON document string it arrived as.
    pub metadata: String,
}

/// What ingesting one event did to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The event was new and a row was written.
    Ingested,
    /// The event id was already persisted; nothing was written.
    Duplicate,
}
