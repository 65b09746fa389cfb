//! Migration to create the church directory tables.
//!
//! `churches` holds the names the title tier matches against and
//! `church_contacts` the leader/coach addresses used by the participant tier.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Churches::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Churches::Id).text().not_null().primary_key())
                    .col(ColumnDef::new(Churches::TenantId).uuid().not_null())
                    .col(ColumnDef::new(Churches::Name).text().not_null())
                    .col(
                        ColumnDef::new(Churches::CreatedAt)
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
                    .name("idx_churches_tenant_id")
                    .table(Churches::Table)
                    .col(Churches::TenantId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ChurchContacts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ChurchContacts::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ChurchContacts::TenantId).uuid().not_null())
                    .col(ColumnDef::new(ChurchContacts::ChurchId).text().not_null())
                    .col(ColumnDef::new(ChurchContacts::Email).text().not_null())
                    .col(
                        ColumnDef::new(ChurchContacts::Role)
                            .text()
                            .not_null()
                            .default("leader"),
                    )
                    .col(
                        ColumnDef::new(ChurchContacts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_church_contacts_church_id")
                            .from(ChurchContacts::Table, ChurchContacts::ChurchId)
                            .to(Churches::Table, Churches::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One row per (church, address); the same address may belong to several churches.
        manager
            .create_index(
                Index::create()
                    .name("idx_church_contacts_church_email")
                    .table(ChurchContacts::Table)
                    .col(ChurchContacts::ChurchId)
                    .col(ChurchContacts::Email)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_church_contacts_tenant_email")
                    .table(ChurchContacts::Table)
                    .col(ChurchContacts::TenantId)
                    .col(ChurchContacts::Email)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ChurchContacts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Churches::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Churches {
    Table,
    Id,
    TenantId,
    Name,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ChurchContacts {
    Table,
    Id,
    TenantId,
    ChurchId,
    Email,
    Role,
    CreatedAt,
}
