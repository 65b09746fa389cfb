//! Migration to create the webhook_events table.
//!
//! Append-only ledger of every authenticated webhook delivery. Rows are inserted
//! before processing starts and updated once when processing ends.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WebhookEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WebhookEvents::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(WebhookEvents::TenantId).uuid().not_null())
                    .col(
                        ColumnDef::new(WebhookEvents::ExternalMeetingId)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(WebhookEvents::EventType).text().not_null())
                    .col(
                        ColumnDef::new(WebhookEvents::ClientReferenceId)
                            .text()
                            .null(),
                    )
                    .col(ColumnDef::new(WebhookEvents::Payload).json_binary().null())
                    .col(
                        ColumnDef::new(WebhookEvents::Processed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(WebhookEvents::Outcome).text().null())
                    .col(ColumnDef::new(WebhookEvents::Error).text().null())
                    .col(ColumnDef::new(WebhookEvents::ChurchId).text().null())
                    .col(
                        ColumnDef::new(WebhookEvents::ScheduledCallId)
                            .uuid()
                            .null(),
                    )
                    .col(ColumnDef::new(WebhookEvents::TranscriptId).uuid().null())
                    .col(
                        ColumnDef::new(WebhookEvents::ReceivedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(WebhookEvents::ProcessedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Redelivery lookups and the operator event log both filter on this pair
        manager
            .create_index(
                Index::create()
                    .name("idx_webhook_events_tenant_meeting")
                    .table(WebhookEvents::Table)
                    .col(WebhookEvents::TenantId)
                    .col(WebhookEvents::ExternalMeetingId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_webhook_events_tenant_received_at")
                    .table(WebhookEvents::Table)
                    .col(WebhookEvents::TenantId)
                    .col(WebhookEvents::ReceivedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_webhook_events_tenant_meeting")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_webhook_events_tenant_received_at")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(WebhookEvents::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum WebhookEvents {
    Table,
    Id,
    TenantId,
    ExternalMeetingId,
    EventType,
    ClientReferenceId,
    Payload,
    Processed,
    Outcome,
    Error,
    ChurchId,
    ScheduledCallId,
    TranscriptId,
    ReceivedAt,
    ProcessedAt,
}
