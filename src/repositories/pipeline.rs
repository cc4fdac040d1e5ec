//! Pipeline cache repository
//!
//! Upsert-by-id reconciliation of fetched pipeline snapshots into the
//! pipelines table, plus the read side consumed by the HTTP layer.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::{debug, error};

use crate::models::pipeline::{self, Column as PipelineColumn, Entity as PipelineEntity};
use crate::providers::Pipeline;
use crate::repositories::to_db_time;

/// Outcome of one provider batch reconciliation.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReconcileStats {
    pub upserted: usize,
    pub failed: usize,
}

/// Repository for the pipelines cache table.
#[derive(Clone)]
pub struct PipelineCache {
    db: Arc<DatabaseConnection>,
}

impl PipelineCache {
    /// Creates a new cache over the given pool.
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Reconcile one provider's fetched snapshot into the cache.
    ///
    /// Runs inside a single transaction: the batch commits or rolls back as
    /// a whole. Each record save is guarded individually so one bad record
    /// cannot keep the rest of the batch from being attempted; failures are
    /// logged with the record id, never silently dropped.
    pub async fn reconcile_batch(
        &self,
        provider_name: &str,
        pipelines: &[Pipeline],
    ) -> Result<ReconcileStats, DbErr> {
        let txn = self.db.begin().await?;
        let mut stats = ReconcileStats::default();

        for pipeline in pipelines {
            match upsert_pipeline(&txn, pipeline).await {
                Ok(()) => stats.upserted += 1,
                Err(err) => {
                    stats.failed += 1;
                    error!(
                        provider = %provider_name,
                        pipeline_id = %pipeline.id,
                        error = %err,
                        "failed to save pipeline record"
                    );
                }
            }
        }

        txn.commit().await?;

        debug!(
            provider = %provider_name,
            upserted = stats.upserted,
            failed = stats.failed,
            "reconciled provider batch"
        );

        Ok(stats)
    }

    /// Upsert a single pipeline record outside a batch.
    pub async fn upsert(&self, pipeline: &Pipeline) -> Result<(), DbErr> {
        upsert_pipeline(self.db.as_ref(), pipeline).await
    }

    /// Fetch a cached pipeline by id.
    pub async fn get(&self, id: &str) -> Result<Option<pipeline::Model>, DbErr> {
        PipelineEntity::find_by_id(id.to_string())
            .one(self.db.as_ref())
            .await
    }

    /// All cached pipelines, ordered by id for stable listings.
    pub async fn list(&self) -> Result<Vec<pipeline::Model>, DbErr> {
        PipelineEntity::find()
            .order_by_asc(PipelineColumn::Id)
            .all(self.db.as_ref())
            .await
    }

    /// Cached pipelines owned by one provider instance.
    pub async fn list_by_provider(&self, provider: &str) -> Result<Vec<pipeline::Model>, DbErr> {
        PipelineEntity::find()
            .filter(PipelineColumn::Provider.eq(provider))
            .order_by_asc(PipelineColumn::Id)
            .all(self.db.as_ref())
            .await
    }

    /// Number of cached pipeline records.
    pub async fn count(&self) -> Result<u64, DbErr> {
        PipelineEntity::find().count(self.db.as_ref()).await
    }
}

/// Upsert one pipeline record on any connection-like executor.
///
/// Updates touch only the volatile fields (status, branch, commit, commit
/// message, author, timestamps); identity fields written at insert stay as
/// first observed.
async fn upsert_pipeline<C>(conn: &C, pipeline: &Pipeline) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    let now = to_db_time(Utc::now());

    let existing = PipelineEntity::find_by_id(pipeline.id.clone())
        .one(conn)
        .await?;

    match existing {
        Some(_) => {
            let active = pipeline::ActiveModel {
                id: Set(pipeline.id.clone()),
                status: Set(pipeline.status.as_str().to_string()),
                branch: Set(pipeline.branch.clone()),
                commit: Set(pipeline.commit.clone()),
                commit_message: Set(pipeline.commit_message.clone()),
                author: Set(pipeline.author.clone()),
                started_at: Set(pipeline.started_at.map(to_db_time)),
                finished_at: Set(pipeline.finished_at.map(to_db_time)),
                updated_at: Set(now),
                ..Default::default()
            };
            active.update(conn).await?;
        }
        None => {
            let active = pipeline::ActiveModel {
                id: Set(pipeline.id.clone()),
                name: Set(pipeline.name.clone()),
                status: Set(pipeline.status.as_str().to_string()),
                repository: Set(pipeline.repository.clone()),
                branch: Set(pipeline.branch.clone()),
                commit: Set(pipeline.commit.clone()),
                commit_message: Set(pipeline.commit_message.clone()),
                author: Set(pipeline.author.clone()),
                provider: Set(pipeline.provider.clone()),
                url: Set(pipeline.url.clone()),
                started_at: Set(pipeline.started_at.map(to_db_time)),
                finished_at: Set(pipeline.finished_at.map(to_db_time)),
                created_at: Set(now),
                updated_at: Set(now),
            };
            active.insert(conn).await?;
        }
    }

    Ok(())
}
