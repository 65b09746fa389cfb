//! Migration to create the integration_settings table (one row per tenant).

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(IntegrationSettings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(IntegrationSettings::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(IntegrationSettings::TenantId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(IntegrationSettings::ApiKeyCiphertext)
                            .binary()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(IntegrationSettings::WebhookSecretCiphertext)
                            .binary()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(IntegrationSettings::AutoProcessEnabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(IntegrationSettings::AutoMatchEnabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(IntegrationSettings::ConnectedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(IntegrationSettings::LastWebhookReceivedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(IntegrationSettings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(IntegrationSettings::UpdatedAt)
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
                    .name("idx_integration_settings_tenant_id")
                    .table(IntegrationSettings::Table)
                    .col(IntegrationSettings::TenantId)
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
                    .name("idx_integration_settings_tenant_id")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(IntegrationSettings::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum IntegrationSettings {
    Table,
    Id,
    TenantId,
    ApiKeyCiphertext,
    WebhookSecretCiphertext,
    AutoProcessEnabled,
    AutoMatchEnabled,
    ConnectedAt,
    LastWebhookReceivedAt,
    CreatedAt,
    UpdatedAt,
}
