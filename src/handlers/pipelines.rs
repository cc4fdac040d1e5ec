//! # Pipeline API Handlers
//!
//! Endpoints for reading cached and live pipeline state and for the
//! on-demand provider operations (trigger, re-run, cancel, run history).

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue, json};
use tracing::warn;

use crate::error::ApiError;
use crate::providers::{Pipeline, PipelineRun, Provider};
use crate::server::AppState;

/// Query parameters for run-history listing
#[derive(Debug, Deserialize)]
pub struct RunsQuery {
    /// Maximum number of runs to return (default: 10, max: 100)
    pub limit: Option<usize>,
}

/// List cached pipelines across all providers
pub async fn list_pipelines(
    State(state): State<AppState>,
) -> Result<Json<JsonValue>, ApiError> {
    let pipelines = state.pipelines.list().await?;
    Ok(Json(json!({
        "pipelines": pipelines,
        "count": pipelines.len(),
    })))
}

/// Fetch pipelines live from every enabled provider (fan-out, isolated)
pub async fn list_live_pipelines(State(state): State<AppState>) -> Json<JsonValue> {
    let pipelines: Vec<Pipeline> = state.registry.fetch_all_pipelines().await;
    let count = pipelines.len();
    Json(json!({
        "pipelines": pipelines,
        "count": count,
    }))
}

/// Fetch pipelines live from one provider
pub async fn list_provider_pipelines(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<JsonValue>, ApiError> {
    let provider = lookup_provider(&state, &name)?;
    let pipelines = provider.fetch_pipelines().await?;
    let count = pipelines.len();
    Ok(Json(json!({
        "pipelines": pipelines,
        "provider": name,
        "count": count,
    })))
}

/// Run history for one pipeline, newest first
pub async fn list_pipeline_runs(
    State(state): State<AppState>,
    Path((name, pipeline_id)): Path<(String, String)>,
    Query(query): Query<RunsQuery>,
) -> Result<Json<JsonValue>, ApiError> {
    let limit = query.limit.unwrap_or(10);
    if !(1..=100).contains(&limit) {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_FAILED",
            "limit must be between 1 and 100",
        ));
    }

    let provider = lookup_provider(&state, &name)?;
    let runs = provider.fetch_pipeline_runs(&pipeline_id, limit).await?;
    let count = runs.len();
    Ok(Json(json!({
        "runs": runs,
        "pipeline_id": pipeline_id,
        "count": count,
    })))
}

/// Best-effort parameter schema for a pipeline
pub async fn get_pipeline_parameters(
    State(state): State<AppState>,
    Path((name, pipeline_id)): Path<(String, String)>,
) -> Result<Json<JsonValue>, ApiError> {
    let provider = lookup_provider(&state, &name)?;
    let parameters = provider.get_available_parameters(&pipeline_id).await?;
    Ok(Json(JsonValue::Object(parameters)))
}

/// Trigger a pipeline execution
pub async fn trigger_pipeline(
    State(state): State<AppState>,
    Path((name, pipeline_id)): Path<(String, String)>,
    payload: Option<Json<Map<String, JsonValue>>>,
) -> Result<(StatusCode, Json<JsonValue>), ApiError> {
    let parameters = payload.map(|Json(map)| map).unwrap_or_default();

    let provider = lookup_provider(&state, &name)?;
    let run = provider.trigger_pipeline(&pipeline_id, parameters).await?;

    persist_run(&state, &run).await;

    Ok((StatusCode::CREATED, Json(json!({ "run": run }))))
}

/// Re-run a previous pipeline execution
pub async fn re_run_pipeline(
    State(state): State<AppState>,
    Path((name, run_id)): Path<(String, String)>,
) -> Result<(StatusCode, Json<JsonValue>), ApiError> {
    let provider = lookup_provider(&state, &name)?;
    let run = provider.re_run_pipeline(&run_id).await?;

    persist_run(&state, &run).await;

    Ok((StatusCode::CREATED, Json(json!({ "run": run }))))
}

/// Cancel a running pipeline execution (best-effort)
pub async fn cancel_pipeline(
    State(state): State<AppState>,
    Path((name, run_id)): Path<(String, String)>,
) -> Result<Json<JsonValue>, ApiError> {
    let provider = lookup_provider(&state, &name)?;
    let success = provider.cancel_pipeline(&run_id).await?;

    Ok(Json(json!({
        "success": success,
        "run_id": run_id,
    })))
}

fn lookup_provider(state: &AppState, name: &str) -> Result<Arc<dyn Provider>, ApiError> {
    state.registry.get(name).ok_or_else(|| {
        ApiError::new(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            &format!("provider '{name}' not found"),
        )
    })
}

/// Record a freshly started run in the cache. Best-effort: the run was
/// started remotely either way, so a cache failure must not fail the call.
async fn persist_run(state: &AppState, run: &PipelineRun) {
    if let Err(err) = state.runs.upsert_run(run).await {
        warn!(run_id = %run.id, error = %err, "failed to cache triggered run");
    }
}
