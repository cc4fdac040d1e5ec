//! # API Handlers
//!
//! HTTP endpoint handlers for the pipedeck API. Thin adapters: all
//! nontrivial behavior lives in the registry, providers, cache and vault.

pub mod pipelines;
pub mod providers;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde_json::{Value as JsonValue, json};

use crate::db;
use crate::error::ApiError;
use crate::models::ServiceInfo;
use crate::server::AppState;

/// Root handler that returns basic service information
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service information", body = ServiceInfo)
    ),
    tag = "root"
)]
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::default())
}

/// Health check endpoint verifying database connectivity
pub async fn health(State(state): State<AppState>) -> Result<Json<JsonValue>, ApiError> {
    db::health_check(&state.db).await.map_err(|err| {
        tracing::error!(error = %err, "health check failed");
        ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            "database unreachable",
        )
    })?;

    Ok(Json(json!({ "status": "healthy" })))
}
