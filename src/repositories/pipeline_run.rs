//! Pipeline run cache repository

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde_json::Value as JsonValue;

use crate::models::pipeline_run::{self, Column as RunColumn, Entity as RunEntity};
use crate::providers::PipelineRun;
use crate::repositories::to_db_time;

/// Repository for the pipeline_runs cache table.
#[derive(Clone)]
pub struct PipelineRunCache {
    db: Arc<DatabaseConnection>,
}

impl PipelineRunCache {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Upsert a run record keyed by run id.
    pub async fn upsert_run(&self, run: &PipelineRun) -> Result<(), DbErr> {
        let now = to_db_time(Utc::now());
        let parameters = if run.parameters.is_empty() {
            None
        } else {
            Some(JsonValue::Object(run.parameters.clone()))
        };

        let existing = RunEntity::find_by_id(run.id.clone())
            .one(self.db.as_ref())
            .await?;

        match existing {
            Some(_) => {
                let active = pipeline_run::ActiveModel {
                    id: Set(run.id.clone()),
                    status: Set(run.status.as_str().to_string()),
                    started_at: Set(run.started_at.map(to_db_time)),
                    finished_at: Set(run.finished_at.map(to_db_time)),
                    duration: Set(run.duration),
                    parameters: Set(parameters),
                    updated_at: Set(now),
                    ..Default::default()
                };
                active.update(self.db.as_ref()).await?;
            }
            None => {
                let active = pipeline_run::ActiveModel {
                    id: Set(run.id.clone()),
                    pipeline_id: Set(run.pipeline_id.clone()),
                    status: Set(run.status.as_str().to_string()),
                    started_at: Set(run.started_at.map(to_db_time)),
                    finished_at: Set(run.finished_at.map(to_db_time)),
                    duration: Set(run.duration),
                    parameters: Set(parameters),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                active.insert(self.db.as_ref()).await?;
            }
        }

        Ok(())
    }

    /// Cached run history for a pipeline, newest first.
    pub async fn list_for_pipeline(
        &self,
        pipeline_id: &str,
        limit: u64,
    ) -> Result<Vec<pipeline_run::Model>, DbErr> {
        RunEntity::find()
            .filter(RunColumn::PipelineId.eq(pipeline_id))
            .order_by_desc(RunColumn::StartedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
    }
}
