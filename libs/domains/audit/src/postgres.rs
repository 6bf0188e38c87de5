//! Postgres implementation of the audit ledger.

use async_trait::async_trait;
use domain_appointments::AuditEvent;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};
use tracing::debug;
use uuid::Uuid;

use crate::entity;
use crate::error::AuditResult;
use crate::models::AuditLog;
use crate::repository::AuditLogRepository;

pub struct PgAuditLogRepository {
    db: DatabaseConnection,
}

impl PgAuditLogRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuditLogRepository for PgAuditLogRepository {
    async fn save(&self, event: &AuditEvent) -> AuditResult<AuditLog> {
        let active_model: entity::ActiveModel = event.into();
        let model = active_model.insert(&self.db).await?;
        debug!(event_id = %model.event_id, "audit log row written");
        Ok(model.into())
    }

    async fn find_by_event_id(&self, event_id: Uuid) -> AuditResult<Option<AuditLog>> {
        let model = entity::Entity::find_by_id(event_id).one(&self.db).await?;
        Ok(model.map(Into::into))
    }

    async fn find_by_aggregate_id(&self, aggregate_id: &str) -> AuditResult<Vec<AuditLog>> {
        let models = entity::Entity::find()
            .filter(entity::Column::AggregateId.eq(aggregate_id))
            .order_by_asc(entity::Column::OccurredAt)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn find_by_professional_id(&self, professional_id: &str) -> AuditResult<Vec<AuditLog>> {
        let models = entity::Entity::find()
            .filter(entity::Column::ProfessionalId.eq(professional_id))
            .order_by_desc(entity::Column::OccurredAt)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn find_all(&self) -> AuditResult<Vec<AuditLog>> {
        let models = entity::Entity::find()
            .order_by_desc(entity::Column::OccurredAt)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }
}
