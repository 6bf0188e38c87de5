use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Append-only ledger of appointment lifecycle events. The event id
        // is the primary key, so a replayed event cannot produce a second row.
        manager
            .create_table(
                Table::create()
                    .table(AuditLogs::Table)
                    .if_not_exists()
                    .col(pk_uuid(AuditLogs::EventId))
                    .col(string(AuditLogs::AggregateId))
                    .col(string_len(AuditLogs::EventType, 50))
                    .col(string(AuditLogs::ProfessionalId))
                    .col(string(AuditLogs::PatientId))
                    .col(date(AuditLogs::AppointmentDate))
                    .col(time(AuditLogs::AppointmentHour))
                    .col(timestamp_with_time_zone(AuditLogs::OccurredAt))
                    .col(string(AuditLogs::ChangedBy))
                    .col(text(AuditLogs::Metadata))
                    .to_owned(),
            )
            .await?;

        // Both history queries order by occurred_at within their filter,
        // and the full scan orders by occurred_at alone.
        manager
            .create_index(
                Index::create()
                    .name("idx_audit_logs_aggregate_occurred")
                    .table(AuditLogs::Table)
                    .col(AuditLogs::AggregateId)
                    .col(AuditLogs::OccurredAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_audit_logs_professional_occurred")
                    .table(AuditLogs::Table)
                    .col(AuditLogs::ProfessionalId)
                    .col(AuditLogs::OccurredAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_audit_logs_occurred_at")
                    .table(AuditLogs::Table)
                    .col(AuditLogs::OccurredAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AuditLogs::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum AuditLogs {
    Table,
    EventId,
    AggregateId,
    EventType,
    ProfessionalId,
    PatientId,
    AppointmentDate,
    AppointmentHour,
    OccurredAt,
    ChangedBy,
    Metadata,
}
