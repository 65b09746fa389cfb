//! Migration to create the scheduled_calls table.
//!
//! Scheduled calls are owned by the coaching workflow; the intake pipeline only
//! writes the transcript-derived columns and, on the manual path, creates rows.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ScheduledCalls::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ScheduledCalls::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ScheduledCalls::TenantId).uuid().not_null())
                    .col(ColumnDef::new(ScheduledCalls::ChurchId).text().not_null())
                    .col(ColumnDef::new(ScheduledCalls::CallType).text().not_null())
                    .col(
                        ColumnDef::new(ScheduledCalls::ScheduledAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScheduledCalls::Completed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ScheduledCalls::CompletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ScheduledCalls::CalendarEventId)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ScheduledCalls::ExternalMeetingId)
                            .text()
                            .null(),
                    )
                    .col(ColumnDef::new(ScheduledCalls::TranscriptUrl).text().null())
                    .col(ColumnDef::new(ScheduledCalls::AiSummary).text().null())
                    .col(
                        ColumnDef::new(ScheduledCalls::ActionItems)
                            .json_binary()
                            .null(),
                    )
                    .col(ColumnDef::new(ScheduledCalls::Keywords).json_binary().null())
                    .col(
                        ColumnDef::new(ScheduledCalls::TranscriptLinkedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ScheduledCalls::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ScheduledCalls::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_scheduled_calls_church_id")
                            .from(ScheduledCalls::Table, ScheduledCalls::ChurchId)
                            .to(Churches::Table, Churches::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Temporal tier scans one church's calls ordered by time
        manager
            .create_index(
                Index::create()
                    .name("idx_scheduled_calls_church_scheduled_at")
                    .table(ScheduledCalls::Table)
                    .col(ScheduledCalls::ChurchId)
                    .col(ScheduledCalls::ScheduledAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_scheduled_calls_church_scheduled_at")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(ScheduledCalls::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ScheduledCalls {
    Table,
    Id,
    TenantId,
    ChurchId,
    CallType,
    ScheduledAt,
    Completed,
    CompletedAt,
    CalendarEventId,
    ExternalMeetingId,
    TranscriptUrl,
    AiSummary,
    ActionItems,
    Keywords,
    TranscriptLinkedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Churches {
    Table,
    Id,
}
