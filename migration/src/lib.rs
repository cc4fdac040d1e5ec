//! Database migrations for pipedeck.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2025_07_01_000001_create_pipelines;
mod m2025_07_01_000002_create_pipeline_runs;
mod m2025_07_01_000003_create_provider_secrets;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_07_01_000001_create_pipelines::Migration),
            Box::new(m2025_07_01_000002_create_pipeline_runs::Migration),
            Box::new(m2025_07_01_000003_create_provider_secrets::Migration),
        ]
    }
}
