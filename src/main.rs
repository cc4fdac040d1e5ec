//! # pipedeck Main Entry Point
//!
//! CLI front end: `serve` (default) runs migrations, starts the poller and
//! serves the API; `migrate` applies migrations and exits; `poll` runs a
//! single reconciliation cycle and exits.

use std::sync::Arc;

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use migration::{Migrator, MigratorTrait};

use pipedeck::config::{AppConfig, ConfigLoader};
use pipedeck::crypto::CryptoKey;
use pipedeck::db;
use pipedeck::logging;
use pipedeck::poller::PipelinePoller;
use pipedeck::providers::{
    GITHUB_PROVIDER_TYPE, GitHubProvider, ProviderConfig, ProviderRegistry,
};
use pipedeck::repositories::{PipelineCache, PipelineRunCache};
use pipedeck::server::{AppState, run_server};
use pipedeck::vault::SecretVault;

#[derive(Parser)]
#[command(
    name = "pipedeck",
    version,
    about = "Unified CI/CD pipeline status aggregation"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run migrations, start the poller and serve the API (default)
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
    /// Run a single fetch-and-reconcile cycle and exit
    Poll,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::new().load()?;
    logging::init_subscriber(&config);

    if let Ok(redacted_json) = config.redacted_json() {
        tracing::debug!(profile = %config.profile, config = %redacted_json, "configuration loaded");
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Migrate => migrate(config).await,
        Command::Poll => poll(config).await,
    }
}

async fn migrate(config: AppConfig) -> anyhow::Result<()> {
    let db = db::init_pool(&config).await?;
    Migrator::up(&db, None).await?;
    tracing::info!("migrations applied");
    Ok(())
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    config.validate()?;

    let db = Arc::new(db::init_pool(&config).await?);
    Migrator::up(db.as_ref(), None).await?;

    let key_bytes = config
        .crypto_key
        .clone()
        .ok_or_else(|| anyhow!("crypto key missing after validation"))?;
    let vault = SecretVault::new(db.clone(), CryptoKey::new(key_bytes)?);

    let registry = Arc::new(ProviderRegistry::new());
    bootstrap_registry(&config, &vault, &registry).await?;

    let pipelines = PipelineCache::new(db.clone());
    let runs = PipelineRunCache::new(db.clone());
    let config = Arc::new(config);

    let poller = PipelinePoller::new(registry.clone(), pipelines.clone(), &config.poller);
    poller.start().await;

    let state = AppState {
        db,
        registry,
        vault,
        pipelines,
        runs,
        config: config.clone(),
    };

    let served = run_server(&config, state).await;

    // The poller outlives request handling; join it before exiting.
    poller.stop().await;

    served.map_err(|err| anyhow!("server error: {err}"))
}

async fn poll(config: AppConfig) -> anyhow::Result<()> {
    config.validate()?;

    let db = Arc::new(db::init_pool(&config).await?);
    Migrator::up(db.as_ref(), None).await?;

    let key_bytes = config
        .crypto_key
        .clone()
        .ok_or_else(|| anyhow!("crypto key missing after validation"))?;
    let vault = SecretVault::new(db.clone(), CryptoKey::new(key_bytes)?);

    let registry = Arc::new(ProviderRegistry::new());
    bootstrap_registry(&config, &vault, &registry).await?;

    let poller = PipelinePoller::new(registry, PipelineCache::new(db), &config.poller);
    poller.poll_once().await?;
    tracing::info!("reconciliation cycle complete");

    Ok(())
}

/// Register the config-declared GitHub provider, if repository coordinates
/// are present. The registry is constructed here and handed to whoever
/// needs it; there is no process-wide instance.
async fn bootstrap_registry(
    config: &AppConfig,
    vault: &SecretVault,
    registry: &ProviderRegistry,
) -> anyhow::Result<()> {
    let (Some(owner), Some(repo)) = (config.github_owner.clone(), config.github_repo.clone())
    else {
        tracing::info!("no GitHub repository configured; registry starts empty");
        return Ok(());
    };

    let token = vault.get_secret(GITHUB_PROVIDER_TYPE).await?;
    if token.is_none() {
        tracing::warn!("no GitHub credential stored; provider will fetch unauthenticated");
    }

    let mut provider_config = ProviderConfig::new("github-main", GITHUB_PROVIDER_TYPE)
        .with_refresh_interval(config.github_refresh_interval_seconds)
        .with_setting("owner", owner)
        .with_setting("repo", repo);
    if let Some(base_url) = config.github_api_base.clone() {
        provider_config = provider_config.with_setting("base_url", base_url);
    }

    let provider = GitHubProvider::new(provider_config, token)?;
    registry
        .register(Arc::new(provider))
        .map_err(|err| anyhow!(err))?;
    tracing::info!(provider = "github-main", "provider registered from configuration");

    Ok(())
}
