//! # Provider API Handlers
//!
//! Endpoints for registering, listing and removing provider instances, and
//! for rotating their stored credentials.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::providers::{GITHUB_PROVIDER_TYPE, GitHubProvider, Provider, ProviderConfig};
use crate::server::AppState;

/// Provider information for public listing
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ProviderInfo {
    /// Unique instance name
    pub name: String,
    /// Implementation type (e.g. "github")
    pub provider_type: String,
    /// Whether this instance participates in polling
    pub enabled: bool,
    /// Polling interval in seconds
    pub refresh_interval: u64,
    /// Whether a credential is stored for the provider type
    pub has_secret: bool,
}

/// Response containing the list of registered providers
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProvidersResponse {
    pub providers: Vec<ProviderInfo>,
    pub count: usize,
}

/// Request body for registering a provider
#[derive(Debug, Deserialize, ToSchema)]
pub struct AddProviderRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub provider_type: String,
    pub token: Option<String>,
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub base_url: Option<String>,
    pub enabled: Option<bool>,
    pub refresh_interval: Option<u64>,
}

/// Request body for rotating a provider credential
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateTokenRequest {
    pub token: String,
}

/// List all registered providers
pub async fn list_providers(
    State(state): State<AppState>,
) -> Result<Json<ProvidersResponse>, ApiError> {
    let mut providers = Vec::new();
    for provider in state.registry.get_all() {
        let has_secret = state
            .vault
            .has_secret(provider.provider_type())
            .await
            .unwrap_or(false);
        providers.push(ProviderInfo {
            name: provider.name().to_string(),
            provider_type: provider.provider_type().to_string(),
            enabled: provider.config().enabled,
            refresh_interval: provider.config().refresh_interval,
            has_secret,
        });
    }

    let count = providers.len();
    Ok(Json(ProvidersResponse { providers, count }))
}

/// Register a new provider instance
pub async fn add_provider(
    State(state): State<AppState>,
    Json(request): Json<AddProviderRequest>,
) -> Result<(StatusCode, Json<JsonValue>), ApiError> {
    if request.name.trim().is_empty() || request.provider_type.trim().is_empty() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_FAILED",
            "name and type are required",
        ));
    }

    if state.registry.get(&request.name).is_some() {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            "CONFLICT",
            &format!("provider '{}' already exists", request.name),
        ));
    }

    // Store the credential first so the provider type keeps it even if
    // validation below rejects this particular instance.
    if let Some(ref token) = request.token {
        state.vault.set_secret(&request.provider_type, token).await?;
    }

    let token = match request.token {
        Some(token) => Some(token),
        None => state.vault.get_secret(&request.provider_type).await?,
    };

    let mut config = ProviderConfig::new(request.name.clone(), request.provider_type.clone())
        .with_enabled(request.enabled.unwrap_or(true))
        .with_refresh_interval(request.refresh_interval.unwrap_or(30));
    if let Some(owner) = request.owner {
        config = config.with_setting("owner", owner);
    }
    if let Some(repo) = request.repo {
        config = config.with_setting("repo", repo);
    }
    if let Some(base_url) = request.base_url {
        config = config.with_setting("base_url", base_url);
    }

    let provider = build_provider(config, token)?;

    if !provider.validate_credentials().await {
        return Err(ApiError::new(
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            "provider credentials were rejected",
        ));
    }

    let name = provider.name().to_string();
    let provider_type = provider.provider_type().to_string();
    state.registry.register(provider)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "provider registered",
            "provider": { "name": name, "type": provider_type },
        })),
    ))
}

/// Remove a provider instance
pub async fn remove_provider(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<JsonValue>, ApiError> {
    if state.registry.get(&name).is_none() {
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            &format!("provider '{name}' not found"),
        ));
    }

    state.registry.unregister(&name);

    Ok(Json(json!({ "message": format!("provider '{name}' removed") })))
}

/// Rotate the credential for a provider's type and re-validate it
pub async fn update_token(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<UpdateTokenRequest>,
) -> Result<Json<JsonValue>, ApiError> {
    let Some(existing) = state.registry.get(&name) else {
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            &format!("provider '{name}' not found"),
        ));
    };

    state
        .vault
        .set_secret(existing.provider_type(), &request.token)
        .await?;

    // Provider instances are immutable; rebuild with the new token and swap
    // the registration.
    let replacement = build_provider(existing.config().clone(), Some(request.token))?;

    if !replacement.validate_credentials().await {
        return Err(ApiError::new(
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            "new token was rejected by the provider",
        ));
    }

    state.registry.unregister(&name);
    state.registry.register(replacement)?;

    Ok(Json(json!({ "message": "token updated" })))
}

/// Construct a provider instance for a supported type.
pub(crate) fn build_provider(
    config: ProviderConfig,
    token: Option<String>,
) -> Result<Arc<dyn Provider>, ApiError> {
    match config.provider_type.as_str() {
        GITHUB_PROVIDER_TYPE => Ok(Arc::new(GitHubProvider::new(config, token)?)),
        other => Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_FAILED",
            &format!("unsupported provider type: {other}"),
        )),
    }
}
