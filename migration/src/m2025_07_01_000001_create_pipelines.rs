//! Migration to create the pipelines table.
//!
//! The pipelines table is the local cache of last-known pipeline state as
//! observed from each configured provider, keyed by the provider-scoped
//! pipeline id.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Pipelines::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Pipelines::Id)
                            .text()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Pipelines::Name).text().not_null())
                    .col(ColumnDef::new(Pipelines::Status).text().not_null())
                    .col(ColumnDef::new(Pipelines::Repository).text().not_null())
                    .col(ColumnDef::new(Pipelines::Branch).text().not_null())
                    .col(ColumnDef::new(Pipelines::Commit).text().not_null())
                    .col(ColumnDef::new(Pipelines::CommitMessage).text().null())
                    .col(ColumnDef::new(Pipelines::Author).text().null())
                    .col(ColumnDef::new(Pipelines::Provider).text().not_null())
                    .col(ColumnDef::new(Pipelines::Url).text().null())
                    .col(
                        ColumnDef::new(Pipelines::StartedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Pipelines::FinishedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Pipelines::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Pipelines::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Index for per-provider listing
        manager
            .create_index(
                Index::create()
                    .name("idx_pipelines_provider")
                    .table(Pipelines::Table)
                    .col(Pipelines::Provider)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_pipelines_provider").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Pipelines::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Pipelines {
    Table,
    Id,
    Name,
    Status,
    Repository,
    Branch,
    Commit,
    CommitMessage,
    Author,
    Provider,
    Url,
    StartedAt,
    FinishedAt,
    CreatedAt,
    UpdatedAt,
}
