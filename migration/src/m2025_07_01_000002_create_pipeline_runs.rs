//! Migration to create the pipeline_runs table.
//!
//! Stores run history for cached pipelines, keyed by the provider-scoped run
//! id with the dispatch parameters recorded as JSON.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PipelineRuns::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PipelineRuns::Id)
                            .text()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PipelineRuns::PipelineId).text().not_null())
                    .col(ColumnDef::new(PipelineRuns::Status).text().not_null())
                    .col(
                        ColumnDef::new(PipelineRuns::StartedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PipelineRuns::FinishedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(PipelineRuns::Duration).double().null())
                    .col(ColumnDef::new(PipelineRuns::Parameters).json_binary().null())
                    .col(
                        ColumnDef::new(PipelineRuns::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(PipelineRuns::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Index for run-history queries, newest first
        manager
            .get_connection()
            .execute(sea_orm_migration::sea_orm::Statement::from_string(
                manager.get_database_backend(),
                "CREATE INDEX IF NOT EXISTS idx_pipeline_runs_pipeline_started ON pipeline_runs (pipeline_id, started_at DESC)".to_string(),
            ))
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_pipeline_runs_pipeline_started")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(PipelineRuns::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum PipelineRuns {
    Table,
    Id,
    PipelineId,
    Status,
    StartedAt,
    FinishedAt,
    Duration,
    Parameters,
    CreatedAt,
    UpdatedAt,
}
