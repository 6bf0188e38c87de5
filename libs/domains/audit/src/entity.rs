//! Sea-ORM entity for the `audit_logs` table.

use domain_appointments::{AuditEvent, AuditEventKind};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::models::AuditLog;

/// A row of the append-only ledger. The event id doubles as the primary
/// key, which is what makes duplicate deliveries collide on insert.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "audit_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub event_id: Uuid,
    pub aggregate_id: String,
    pub event_type: AuditEventKind,
    pub professional_id: String,
    pub patient_id: String,
    pub appointment_date: Date,
    pub appointment_hour: Time,
    pub occurred_at: DateTimeWithTimeZone,
    pub changed_by: String,
    #[sea_orm(column_type = "Text")]
    pub metadata: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for AuditLog {
    fn from(model: Model) -> Self {
        Self {
            event_id: model.event_id,
            aggregate_id: model.aggregate_id,
            event_type: model.event_type,
            professional_id: model.professional_id,
            patient_id: model.patient_id,
            date: model.appointment_date,
            hour: model.appointment_hour,
            occurred_at: model.occurred_at.into(),
            changed_by: model.changed_by,
            metadata: model.metadata,
        }
    }
}

// Ingestion is a pure field mapping; nothing is derived or rewritten.
impl From<&AuditEvent> for ActiveModel {
    fn from(event: &AuditEvent) -> Self {
        Self {
            event_id: Set(event.event_id),
            aggregate_id: Set(event.aggregate_id.clone()),
            event_type: Set(event.event_type),
            professional_id: Set(event.professional_id.clone()),
            patient_id: Set(event.patient_id.clone()),
            appointment_date: Set(event.date),
            appointment_hour: Set(event.hour),
            occurred_at: Set(event.occurred_at.into()),
            changed_by: Set(event.changed_by.clone()),
            metadata: Set(event.metadata.clone()),
        }
    }
}
