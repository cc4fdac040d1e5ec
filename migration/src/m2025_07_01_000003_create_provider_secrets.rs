//! Migration to create the provider_secrets table.
//!
//! Holds AES-256-GCM ciphertexts of provider API tokens, keyed by provider
//! type rather than instance name so multiple instances of the same provider
//! type share one credential.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProviderSecrets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProviderSecrets::ProviderType)
                            .text()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ProviderSecrets::Ciphertext)
                            .binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProviderSecrets::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ProviderSecrets::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProviderSecrets::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ProviderSecrets {
    Table,
    ProviderType,
    Ciphertext,
    CreatedAt,
    UpdatedAt,
}
