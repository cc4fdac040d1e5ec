//! Provider registry
//!
//! In-memory registry owning the configured provider instances, with
//! point-in-time snapshots for concurrent readers and failure-isolated
//! fan-out fetching.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::warn;

use crate::providers::trait_::Provider;
use crate::providers::types::Pipeline;

/// Error type for registry operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    #[error("provider '{name}' is already registered")]
    DuplicateName { name: String },
    #[error("provider '{name}' not found")]
    ProviderNotFound { name: String },
}

/// Registry of provider instances, keyed by unique instance name.
///
/// Constructed explicitly and shared as an `Arc` by whoever needs it (the
/// HTTP layer, the poller); there is no process-wide instance. The registry
/// is the sole long-lived owner of registered providers.
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Arc<dyn Provider>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            providers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a provider instance. Fails when the name is already taken;
    /// the original registration is retained.
    pub fn register(&self, provider: Arc<dyn Provider>) -> Result<(), RegistryError> {
        let name = provider.name().to_string();
        let mut providers = self.providers.write().unwrap();
        if providers.contains_key(&name) {
            warn!(provider = %name, "registration conflict: name already in use");
            return Err(RegistryError::DuplicateName { name });
        }
        providers.insert(name, provider);
        Ok(())
    }

    /// Unregister a provider by name. No-op when absent.
    pub fn unregister(&self, name: &str) {
        self.providers.write().unwrap().remove(name);
    }

    /// Get a provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.read().unwrap().get(name).cloned()
    }

    /// Snapshot of all registered providers, sorted by name for stable
    /// ordering.
    pub fn get_all(&self) -> Vec<Arc<dyn Provider>> {
        let mut providers: Vec<_> = self.providers.read().unwrap().values().cloned().collect();
        providers.sort_by(|a, b| a.name().cmp(b.name()));
        providers
    }

    /// Snapshot of enabled providers. A point-in-time copy: mutations after
    /// the call do not affect the returned list.
    pub fn get_enabled(&self) -> Vec<Arc<dyn Provider>> {
        let mut providers: Vec<_> = self
            .providers
            .read()
            .unwrap()
            .values()
            .filter(|provider| provider.config().enabled)
            .cloned()
            .collect();
        providers.sort_by(|a, b| a.name().cmp(b.name()));
        providers
    }

    /// Snapshot of providers of the given implementation type.
    pub fn get_by_type(&self, provider_type: &str) -> Vec<Arc<dyn Provider>> {
        let mut providers: Vec<_> = self
            .providers
            .read()
            .unwrap()
            .values()
            .filter(|provider| provider.provider_type() == provider_type)
            .cloned()
            .collect();
        providers.sort_by(|a, b| a.name().cmp(b.name()));
        providers
    }

    /// Number of registered providers.
    pub fn count(&self) -> usize {
        self.providers.read().unwrap().len()
    }

    /// Fetch pipelines from every enabled provider and concatenate the
    /// results. A failing provider contributes nothing; its cause is logged,
    /// never propagated, so the other providers' data still reaches the
    /// caller.
    pub async fn fetch_all_pipelines(&self) -> Vec<Pipeline> {
        let mut all_pipelines = Vec::new();

        for provider in self.get_enabled() {
            match provider.fetch_pipelines().await {
                Ok(pipelines) => all_pipelines.extend(pipelines),
                Err(err) => {
                    warn!(
                        provider = %provider.name(),
                        error = %err,
                        "fetch failed; skipping provider in fan-out"
                    );
                }
            }
        }

        all_pipelines
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::trait_::ProviderError;
    use crate::providers::types::{PipelineRun, PipelineStatus, ProviderConfig};
    use async_trait::async_trait;
    use serde_json::{Map, Value as JsonValue};

    struct StubProvider {
        config: ProviderConfig,
        pipelines: Vec<Pipeline>,
        fail_fetch: bool,
    }

    impl StubProvider {
        fn new(name: &str) -> Self {
            Self {
                config: ProviderConfig::new(name.to_string(), "stub".to_string()),
                pipelines: vec![],
                fail_fetch: false,
            }
        }

        fn with_config(config: ProviderConfig) -> Self {
            Self {
                config,
                pipelines: vec![],
                fail_fetch: false,
            }
        }

        fn with_pipelines(mut self, ids: &[&str]) -> Self {
            self.pipelines = ids
                .iter()
                .map(|id| Pipeline {
                    id: id.to_string(),
                    name: format!("pipeline-{id}"),
                    status: PipelineStatus::Success,
                    repository: "acme/widgets".to_string(),
                    branch: "main".to_string(),
                    commit: "abc123".to_string(),
                    commit_message: None,
                    author: None,
                    started_at: None,
                    finished_at: None,
                    url: None,
                    provider: self.config.name.clone(),
                })
                .collect();
            self
        }

        fn failing(mut self) -> Self {
            self.fail_fetch = true;
            self
        }
    }

    #[async_trait]
    impl Provider for StubProvider {
        fn config(&self) -> &ProviderConfig {
            &self.config
        }

        async fn validate_credentials(&self) -> bool {
            true
        }

        async fn fetch_pipelines(&self) -> Result<Vec<Pipeline>, ProviderError> {
            if self.fail_fetch {
                return Err(ProviderError::remote(self.config.name.clone(), "down"));
            }
            Ok(self.pipelines.clone())
        }

        async fn fetch_pipeline_runs(
            &self,
            _pipeline_id: &str,
            _limit: usize,
        ) -> Result<Vec<PipelineRun>, ProviderError> {
            Ok(vec![])
        }

        async fn trigger_pipeline(
            &self,
            _pipeline_id: &str,
            _parameters: Map<String, JsonValue>,
        ) -> Result<PipelineRun, ProviderError> {
            Err(ProviderError::not_supported("stub", "trigger_pipeline"))
        }

        async fn re_run_pipeline(&self, _run_id: &str) -> Result<PipelineRun, ProviderError> {
            Err(ProviderError::not_supported("stub", "re_run_pipeline"))
        }

        async fn cancel_pipeline(&self, _run_id: &str) -> Result<bool, ProviderError> {
            Err(ProviderError::not_supported("stub", "cancel_pipeline"))
        }
    }

    #[test]
    fn duplicate_registration_fails_and_keeps_original() {
        let registry = ProviderRegistry::new();
        let first = StubProvider::with_config(
            ProviderConfig::new("ci-main", "stub").with_refresh_interval(111),
        );
        let second = StubProvider::with_config(
            ProviderConfig::new("ci-main", "stub").with_refresh_interval(222),
        );

        registry.register(Arc::new(first)).expect("first registers");
        let result = registry.register(Arc::new(second));
        assert!(matches!(
            result,
            Err(RegistryError::DuplicateName { ref name }) if name == "ci-main"
        ));

        // Original instance survives the failed second registration.
        let stored = registry.get("ci-main").expect("still registered");
        assert_eq!(stored.config().refresh_interval, 111);
    }

    #[test]
    fn unregister_is_idempotent() {
        let registry = ProviderRegistry::new();
        registry
            .register(Arc::new(StubProvider::new("ci-main")))
            .expect("registers");

        registry.unregister("ci-main");
        assert!(registry.get("ci-main").is_none());

        // Second call is a no-op, not an error.
        registry.unregister("ci-main");
        assert!(registry.get("ci-main").is_none());
    }

    #[test]
    fn enabled_filter_and_type_filter() {
        let registry = ProviderRegistry::new();
        registry
            .register(Arc::new(StubProvider::with_config(
                ProviderConfig::new("a", "stub").with_enabled(true),
            )))
            .unwrap();
        registry
            .register(Arc::new(StubProvider::with_config(
                ProviderConfig::new("b", "stub").with_enabled(false),
            )))
            .unwrap();
        registry
            .register(Arc::new(StubProvider::with_config(
                ProviderConfig::new("c", "other").with_enabled(true),
            )))
            .unwrap();

        let enabled: Vec<_> = registry
            .get_enabled()
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(enabled, vec!["a", "c"]);

        let stubs: Vec<_> = registry
            .get_by_type("stub")
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(stubs, vec!["a", "b"]);

        assert_eq!(registry.count(), 3);
    }

    #[tokio::test]
    async fn fan_out_isolates_failing_provider() {
        let registry = ProviderRegistry::new();
        registry
            .register(Arc::new(
                StubProvider::new("first").with_pipelines(&["1", "2"]),
            ))
            .unwrap();
        registry
            .register(Arc::new(StubProvider::new("second").failing()))
            .unwrap();
        registry
            .register(Arc::new(StubProvider::new("third").with_pipelines(&["3"])))
            .unwrap();

        let pipelines = registry.fetch_all_pipelines().await;
        let mut ids: Vec<_> = pipelines.iter().map(|p| p.id.clone()).collect();
        ids.sort();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }
}
