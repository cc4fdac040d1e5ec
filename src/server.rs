//! # Server Configuration
//!
//! Server setup for the pipedeck API: shared application state, the router,
//! and the serve loop with graceful shutdown.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};
use sea_orm::DatabaseConnection;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::handlers;
use crate::providers::ProviderRegistry;
use crate::repositories::{PipelineCache, PipelineRunCache};
use crate::vault::SecretVault;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub registry: Arc<ProviderRegistry>,
    pub vault: SecretVault,
    pub pipelines: PipelineCache,
    pub runs: PipelineRunCache,
    pub config: Arc<AppConfig>,
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let api = Router::new()
        .route("/pipelines", get(handlers::pipelines::list_pipelines))
        .route(
            "/pipelines/live",
            get(handlers::pipelines::list_live_pipelines),
        )
        .route(
            "/providers",
            get(handlers::providers::list_providers).post(handlers::providers::add_provider),
        )
        .route(
            "/providers/{name}",
            axum::routing::delete(handlers::providers::remove_provider),
        )
        .route(
            "/providers/{name}/token",
            put(handlers::providers::update_token),
        )
        .route(
            "/providers/{name}/pipelines",
            get(handlers::pipelines::list_provider_pipelines),
        )
        .route(
            "/providers/{name}/pipelines/{pipeline_id}/runs",
            get(handlers::pipelines::list_pipeline_runs),
        )
        .route(
            "/providers/{name}/pipelines/{pipeline_id}/parameters",
            get(handlers::pipelines::get_pipeline_parameters),
        )
        .route(
            "/providers/{name}/pipelines/{pipeline_id}/trigger",
            post(handlers::pipelines::trigger_pipeline),
        )
        .route(
            "/providers/{name}/runs/{run_id}/rerun",
            post(handlers::pipelines::re_run_pipeline),
        )
        .route(
            "/providers/{name}/runs/{run_id}/cancel",
            post(handlers::pipelines::cancel_pipeline),
        );

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
}

/// Starts the server with the given configuration and state
pub async fn run_server(
    config: &AppConfig,
    state: AppState,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_app(state);

    let addr = config
        .bind_addr()
        .map_err(|e| format!("Invalid server address: {}", e))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, profile = %config.profile, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install shutdown signal handler");
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
        )
    ),
    info(
        title = "pipedeck API",
        description = "Unified CI/CD pipeline status aggregation",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
