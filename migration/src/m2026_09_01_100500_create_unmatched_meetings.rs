//! Migration to create the unmatched_meetings review queue.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UnmatchedMeetings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UnmatchedMeetings::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UnmatchedMeetings::TenantId).uuid().not_null())
                    .col(
                        ColumnDef::new(UnmatchedMeetings::ExternalMeetingId)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(UnmatchedMeetings::TranscriptId).uuid().null())
                    .col(ColumnDef::new(UnmatchedMeetings::Title).text().not_null())
                    .col(
                        ColumnDef::new(UnmatchedMeetings::Participants)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UnmatchedMeetings::MeetingDate)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(UnmatchedMeetings::TranscriptUrl)
                            .text()
                            .null(),
                    )
                    .col(ColumnDef::new(UnmatchedMeetings::Reason).text().not_null())
                    .col(
                        ColumnDef::new(UnmatchedMeetings::MatchedChurchId)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(UnmatchedMeetings::MatchedCallId)
                            .uuid()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(UnmatchedMeetings::MatchedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(UnmatchedMeetings::MatchedBy).text().null())
                    .col(
                        ColumnDef::new(UnmatchedMeetings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(UnmatchedMeetings::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_unmatched_meetings_tenant_meeting")
                    .table(UnmatchedMeetings::Table)
                    .col(UnmatchedMeetings::TenantId)
                    .col(UnmatchedMeetings::ExternalMeetingId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_unmatched_meetings_tenant_meeting")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(UnmatchedMeetings::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UnmatchedMeetings {
    Table,
    Id,
    TenantId,
    ExternalMeetingId,
    TranscriptId,
    Title,
    Participants,
    MeetingDate,
    TranscriptUrl,
    Reason,
    MatchedChurchId,
    MatchedCallId,
    MatchedAt,
    MatchedBy,
    CreatedAt,
    UpdatedAt,
}
