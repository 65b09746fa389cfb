//! Migration to create the transcripts table.
//!
//! The unique `(tenant_id, external_meeting_id)` index is the serialization point
//! for concurrent deliveries of the same meeting.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Transcripts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Transcripts::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Transcripts::TenantId).uuid().not_null())
                    .col(
                        ColumnDef::new(Transcripts::ExternalMeetingId)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transcripts::Title).text().not_null())
                    .col(
                        ColumnDef::new(Transcripts::Participants)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transcripts::MeetingDate)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Transcripts::DurationSeconds).double().null())
                    .col(ColumnDef::new(Transcripts::TranscriptUrl).text().null())
                    .col(
                        ColumnDef::new(Transcripts::Sentences)
                            .json_binary()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transcripts::Summary).text().null())
                    .col(
                        ColumnDef::new(Transcripts::ActionItems)
                            .json_binary()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transcripts::Keywords).json_binary().not_null())
                    .col(ColumnDef::new(Transcripts::ChurchId).text().null())
                    .col(ColumnDef::new(Transcripts::ScheduledCallId).uuid().null())
                    .col(
                        ColumnDef::new(Transcripts::VisibleToChurch)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Transcripts::Approved)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Transcripts::FetchedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transcripts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Transcripts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_transcripts_scheduled_call_id")
                            .from(Transcripts::Table, Transcripts::ScheduledCallId)
                            .to(ScheduledCalls::Table, ScheduledCalls::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_transcripts_tenant_meeting")
                    .table(Transcripts::Table)
                    .col(Transcripts::TenantId)
                    .col(Transcripts::ExternalMeetingId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_transcripts_scheduled_call_id")
                    .table(Transcripts::Table)
                    .col(Transcripts::ScheduledCallId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_transcripts_tenant_meeting")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_transcripts_scheduled_call_id")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(Transcripts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Transcripts {
    Table,
    Id,
    TenantId,
    ExternalMeetingId,
    Title,
    Participants,
    MeetingDate,
    DurationSeconds,
    TranscriptUrl,
    Sentences,
    Summary,
    ActionItems,
    Keywords,
    ChurchId,
    ScheduledCallId,
    VisibleToChurch,
    Approved,
    FetchedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ScheduledCalls {
    Table,
    Id,
}
