//! Provider trait definition
//!
//! Defines the capability contract every CI/CD provider implementation must
//! satisfy: credential validation, pipeline and run fetching, and the
//! mutating operations (trigger, re-run, cancel).

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use crate::providers::types::{Pipeline, PipelineRun, PipelineStatus, ProviderConfig};

/// Provider-level error types for structured error handling.
///
/// Variants are distinguishable so callers can react correctly:
/// `Validation` and `NotFound` are caller mistakes, `NotSupported` means the
/// operation is categorically unavailable for the provider type (stop
/// retrying), everything else is environmental.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The remote side rejected or failed the call.
    #[error("provider '{provider}' request failed: {message}")]
    Remote { provider: String, message: String },
    /// The referenced pipeline or run does not exist on the remote side.
    #[error("'{resource}' not found on provider '{provider}'")]
    NotFound { provider: String, resource: String },
    /// Malformed input to a provider operation.
    #[error("invalid input: {0}")]
    Validation(String),
    /// Credentials were rejected by the remote side.
    #[error("authentication rejected by provider '{provider}': {message}")]
    Authentication { provider: String, message: String },
    /// The operation is not implemented for this provider type.
    #[error("operation '{operation}' is not supported by provider type '{provider_type}'")]
    NotSupported {
        provider_type: String,
        operation: String,
    },
    /// Transport-level failure before a remote verdict was reached.
    #[error("network error talking to provider '{provider}': {source}")]
    Network {
        provider: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ProviderError {
    pub fn remote<P: Into<String>, M: Into<String>>(provider: P, message: M) -> Self {
        Self::Remote {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn not_found<P: Into<String>, R: Into<String>>(provider: P, resource: R) -> Self {
        Self::NotFound {
            provider: provider.into(),
            resource: resource.into(),
        }
    }

    pub fn validation<M: Into<String>>(message: M) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_supported<T: Into<String>, O: Into<String>>(provider_type: T, operation: O) -> Self {
        Self::NotSupported {
            provider_type: provider_type.into(),
            operation: operation.into(),
        }
    }
}

/// The capability contract over one external CI/CD system.
///
/// Implementations own their remote client state; the registry owns the
/// instances. Fetching operations perform network I/O and may block for the
/// duration of a remote call; they are invoked from the poller's background
/// task or explicitly by a request handler, never implicitly.
#[async_trait]
pub trait Provider: Send + Sync {
    /// The configuration this instance was registered with.
    fn config(&self) -> &ProviderConfig;

    /// Unique instance name within a registry.
    fn name(&self) -> &str {
        &self.config().name
    }

    /// Implementation tag (e.g. "github").
    fn provider_type(&self) -> &str {
        &self.config().provider_type
    }

    /// Check whether the configured credentials are accepted by the remote
    /// side. Never mutates state; absent credentials, rejection and network
    /// failure all yield `false`.
    async fn validate_credentials(&self) -> bool;

    /// Current snapshot of all pipelines visible to the credential.
    ///
    /// Callers fanning out over several providers must isolate an `Err` from
    /// one provider (log it, contribute nothing) so a down provider never
    /// blocks the others.
    async fn fetch_pipelines(&self) -> Result<Vec<Pipeline>, ProviderError>;

    /// Run history for one pipeline, newest first, truncated to `limit`.
    async fn fetch_pipeline_runs(
        &self,
        pipeline_id: &str,
        limit: usize,
    ) -> Result<Vec<PipelineRun>, ProviderError>;

    /// Start an execution with the supplied parameters. The target ref
    /// defaults to the provider's main branch when absent. May return a
    /// placeholder pending run when the remote system does not surface the
    /// new run synchronously.
    async fn trigger_pipeline(
        &self,
        pipeline_id: &str,
        parameters: Map<String, JsonValue>,
    ) -> Result<PipelineRun, ProviderError>;

    /// Re-execute a previous run. Same placeholder rule as
    /// [`trigger_pipeline`](Provider::trigger_pipeline).
    async fn re_run_pipeline(&self, run_id: &str) -> Result<PipelineRun, ProviderError>;

    /// Best-effort cancellation. `Ok(false)` on transient failure;
    /// `Err(ProviderError::NotSupported)` only when the provider type
    /// categorically lacks the operation.
    async fn cancel_pipeline(&self, run_id: &str) -> Result<bool, ProviderError>;

    /// Convenience status read: re-fetch all pipelines and find a match.
    /// Callers needing efficiency should prefer the cache.
    async fn get_pipeline_status(&self, pipeline_id: &str) -> PipelineStatus {
        match self.fetch_pipelines().await {
            Ok(pipelines) => pipelines
                .into_iter()
                .find(|pipeline| pipeline.id == pipeline_id)
                .map(|pipeline| pipeline.status)
                .unwrap_or(PipelineStatus::Error),
            Err(_) => PipelineStatus::Error,
        }
    }

    /// Best-effort parameter schema for a pipeline. Providers without a
    /// discoverable schema return an empty mapping.
    async fn get_available_parameters(
        &self,
        _pipeline_id: &str,
    ) -> Result<Map<String, JsonValue>, ProviderError> {
        Ok(Map::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::types::ProviderConfig;

    struct FixedProvider {
        config: ProviderConfig,
        pipelines: Vec<Pipeline>,
        fail: bool,
    }

    impl FixedProvider {
        fn with_pipeline(id: &str, status: PipelineStatus) -> Self {
            Self {
                config: ProviderConfig::new("fixed", "stub"),
                pipelines: vec![Pipeline {
                    id: id.to_string(),
                    name: "build".to_string(),
                    status,
                    repository: "acme/widgets".to_string(),
                    branch: "main".to_string(),
                    commit: "abc123".to_string(),
                    commit_message: None,
                    author: None,
                    started_at: None,
                    finished_at: None,
                    url: None,
                    provider: "fixed".to_string(),
                }],
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                config: ProviderConfig::new("fixed", "stub"),
                pipelines: vec![],
                fail: true,
            }
        }
    }

    #[async_trait]
    impl Provider for FixedProvider {
        fn config(&self) -> &ProviderConfig {
            &self.config
        }

        async fn validate_credentials(&self) -> bool {
            true
        }

        async fn fetch_pipelines(&self) -> Result<Vec<Pipeline>, ProviderError> {
            if self.fail {
                return Err(ProviderError::remote("fixed", "boom"));
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

    #[tokio::test]
    async fn status_read_matches_fetched_pipeline() {
        let provider = FixedProvider::with_pipeline("42", PipelineStatus::Running);
        assert_eq!(
            provider.get_pipeline_status("42").await,
            PipelineStatus::Running
        );
    }

    #[tokio::test]
    async fn status_read_for_unknown_pipeline_is_error() {
        let provider = FixedProvider::with_pipeline("42", PipelineStatus::Running);
        assert_eq!(
            provider.get_pipeline_status("nope").await,
            PipelineStatus::Error
        );
    }

    #[tokio::test]
    async fn status_read_on_fetch_failure_is_error() {
        let provider = FixedProvider::failing();
        assert_eq!(
            provider.get_pipeline_status("42").await,
            PipelineStatus::Error
        );
    }

    #[tokio::test]
    async fn default_parameters_are_empty() {
        let provider = FixedProvider::with_pipeline("42", PipelineStatus::Pending);
        let params = provider
            .get_available_parameters("42")
            .await
            .expect("default impl succeeds");
        assert!(params.is_empty());
    }
}
