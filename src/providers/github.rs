//! GitHub Actions provider implementation
//!
//! Maps GitHub workflow and workflow-run resources into the unified pipeline
//! model. Supports listing workflows with their latest run status, run
//! history, `workflow_dispatch` triggering, re-running and cancelling runs.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue, json};
use tracing::{debug, warn};
use url::Url;

use crate::providers::trait_::{Provider, ProviderError};
use crate::providers::types::{Pipeline, PipelineRun, PipelineStatus, ProviderConfig};

/// Provider type tag for GitHub Actions instances.
pub const GITHUB_PROVIDER_TYPE: &str = "github";

const DEFAULT_API_BASE: &str = "https://api.github.com";
const DEFAULT_BRANCH: &str = "main";
const ACCEPT_HEADER: &str = "application/vnd.github.v3+json";
const BODY_SNIPPET_LIMIT: usize = 200;

/// Delay before looking up a freshly dispatched run. GitHub does not return
/// the new run synchronously, so trigger/re-run wait once and then fall back
/// to a placeholder.
const DEFAULT_RUN_LOOKUP_DELAY: Duration = Duration::from_secs(2);

/// GitHub Actions provider.
///
/// Repository coordinates come from the instance settings (`owner`, `repo`,
/// optional `base_url` for GitHub Enterprise or a mock server); the API
/// token is supplied separately so settings stay secret-free.
pub struct GitHubProvider {
    config: ProviderConfig,
    api_base: String,
    has_token: bool,
    client: reqwest::Client,
    run_lookup_delay: Duration,
}

impl GitHubProvider {
    /// Create a new GitHub provider from instance configuration and an
    /// optional API token.
    pub fn new(config: ProviderConfig, token: Option<String>) -> Result<Self, ProviderError> {
        let base_url = config.setting_str("base_url").unwrap_or(DEFAULT_API_BASE);
        let api_base = Url::parse(base_url)
            .map_err(|err| {
                ProviderError::validation(format!("invalid base_url '{base_url}': {err}"))
            })?
            .as_str()
            .trim_end_matches('/')
            .to_string();

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HEADER));
        headers.insert(USER_AGENT, HeaderValue::from_static("pipedeck"));
        let has_token = token.is_some();
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("token {token}"))
                .map_err(|_| ProviderError::validation("token contains invalid characters"))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|err| ProviderError::validation(format!("http client setup failed: {err}")))?;

        Ok(Self {
            config,
            api_base,
            has_token,
            client,
            run_lookup_delay: DEFAULT_RUN_LOOKUP_DELAY,
        })
    }

    /// Override the post-dispatch run lookup delay (primarily for tests).
    pub fn with_run_lookup_delay(mut self, delay: Duration) -> Self {
        self.run_lookup_delay = delay;
        self
    }

    fn coordinates(&self) -> Option<(&str, &str)> {
        match (
            self.config.setting_str("owner"),
            self.config.setting_str("repo"),
        ) {
            (Some(owner), Some(repo)) if !owner.is_empty() && !repo.is_empty() => {
                Some((owner, repo))
            }
            _ => None,
        }
    }

    fn network_error(&self, source: reqwest::Error) -> ProviderError {
        ProviderError::Network {
            provider: self.config.name.clone(),
            source,
        }
    }

    /// Map a non-success response into the error taxonomy, consuming the
    /// body for diagnostics (truncated like any upstream snippet).
    async fn remote_error(&self, context: &str, response: reqwest::Response) -> ProviderError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(BODY_SNIPPET_LIMIT).collect();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return ProviderError::Authentication {
                provider: self.config.name.clone(),
                message: format!("{context}: HTTP {status}"),
            };
        }

        ProviderError::remote(
            self.config.name.clone(),
            format!("{context}: HTTP {status}: {snippet}"),
        )
    }

    /// Latest run for a workflow, used to derive the pipeline status. Any
    /// failure degrades to "no run history" rather than failing the whole
    /// snapshot.
    async fn latest_run(&self, owner: &str, repo: &str, workflow_id: i64) -> Option<WorkflowRun> {
        let url = format!(
            "{}/repos/{owner}/{repo}/actions/workflows/{workflow_id}/runs",
            self.api_base
        );
        let response = match self.client.get(&url).query(&[("per_page", "1")]).send().await {
            Ok(response) => response,
            Err(err) => {
                debug!(workflow_id, error = %err, "latest run lookup failed");
                return None;
            }
        };
        if !response.status().is_success() {
            debug!(workflow_id, status = %response.status(), "latest run lookup rejected");
            return None;
        }
        match response.json::<WorkflowRunsResponse>().await {
            Ok(data) => data.workflow_runs.into_iter().next(),
            Err(err) => {
                debug!(workflow_id, error = %err, "latest run payload malformed");
                None
            }
        }
    }

    fn to_pipeline(
        &self,
        owner: &str,
        repo: &str,
        workflow: Workflow,
        latest_run: Option<WorkflowRun>,
    ) -> Pipeline {
        let status = latest_run
            .as_ref()
            .map(|run| map_run_status(run.status.as_deref(), run.conclusion.as_deref()))
            .unwrap_or(PipelineStatus::Pending);

        let finished_at = latest_run.as_ref().and_then(|run| {
            if run.status.as_deref() == Some("completed") {
                run.updated_at
            } else {
                None
            }
        });

        Pipeline {
            id: workflow.id.to_string(),
            name: workflow.name,
            status,
            repository: format!("{owner}/{repo}"),
            branch: latest_run
                .as_ref()
                .and_then(|run| run.head_branch.clone())
                .unwrap_or_else(|| "unknown".to_string()),
            commit: latest_run
                .as_ref()
                .and_then(|run| run.head_sha.clone())
                .unwrap_or_default(),
            commit_message: latest_run
                .as_ref()
                .and_then(|run| run.head_commit.as_ref())
                .and_then(|commit| commit.message.clone()),
            author: latest_run
                .as_ref()
                .and_then(|run| run.head_commit.as_ref())
                .and_then(|commit| commit.author.as_ref())
                .and_then(|author| author.name.clone()),
            started_at: latest_run.as_ref().and_then(|run| run.created_at),
            finished_at,
            url: workflow.html_url,
            provider: self.config.name.clone(),
        }
    }

    fn to_run(&self, pipeline_id: &str, run: WorkflowRun) -> PipelineRun {
        let status = map_run_status(run.status.as_deref(), run.conclusion.as_deref());
        let finished_at = if run.status.as_deref() == Some("completed") {
            run.updated_at
        } else {
            None
        };

        PipelineRun {
            id: run.id.to_string(),
            pipeline_id: pipeline_id.to_string(),
            status,
            started_at: run.created_at,
            finished_at,
            duration: PipelineRun::duration_between(run.created_at, finished_at, status),
            parameters: Map::new(),
        }
    }

    /// Resolve a workflow by id, distinguishing "does not exist" from other
    /// remote failures.
    async fn resolve_workflow(
        &self,
        owner: &str,
        repo: &str,
        pipeline_id: &str,
    ) -> Result<Workflow, ProviderError> {
        let url = format!(
            "{}/repos/{owner}/{repo}/actions/workflows/{pipeline_id}",
            self.api_base
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| self.network_error(err))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ProviderError::not_found(
                self.config.name.clone(),
                format!("pipeline {pipeline_id}"),
            ));
        }
        if !response.status().is_success() {
            return Err(self.remote_error("resolve workflow", response).await);
        }

        response
            .json::<Workflow>()
            .await
            .map_err(|err| self.network_error(err))
    }
}

/// Map GitHub's run vocabulary into the unified status enum.
///
/// Total over the remote vocabulary: queued and in-progress runs are
/// running, completed runs follow their conclusion, and anything
/// unrecognized (including absent run history) degrades to pending.
pub(crate) fn map_run_status(status: Option<&str>, conclusion: Option<&str>) -> PipelineStatus {
    match status {
        Some("in_progress") | Some("queued") => PipelineStatus::Running,
        _ => match conclusion {
            Some("success") => PipelineStatus::Success,
            Some("failure") => PipelineStatus::Failure,
            Some("cancelled") => PipelineStatus::Cancelled,
            _ => PipelineStatus::Pending,
        },
    }
}

#[async_trait]
impl Provider for GitHubProvider {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn validate_credentials(&self) -> bool {
        if !self.has_token {
            return false;
        }

        let url = format!("{}/user", self.api_base);
        match self.client.get(&url).send().await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(err) => {
                debug!(provider = %self.config.name, error = %err, "credential validation failed");
                false
            }
        }
    }

    async fn fetch_pipelines(&self) -> Result<Vec<Pipeline>, ProviderError> {
        let Some((owner, repo)) = self.coordinates() else {
            warn!(
                provider = %self.config.name,
                "repository coordinates not configured; nothing to fetch"
            );
            return Ok(vec![]);
        };

        let url = format!("{}/repos/{owner}/{repo}/actions/workflows", self.api_base);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| self.network_error(err))?;
        if !response.status().is_success() {
            return Err(self.remote_error("list workflows", response).await);
        }

        let data: WorkflowsResponse = response
            .json()
            .await
            .map_err(|err| self.network_error(err))?;

        let mut pipelines = Vec::with_capacity(data.workflows.len());
        for workflow in data.workflows {
            let latest_run = self.latest_run(owner, repo, workflow.id).await;
            pipelines.push(self.to_pipeline(owner, repo, workflow, latest_run));
        }

        Ok(pipelines)
    }

    async fn fetch_pipeline_runs(
        &self,
        pipeline_id: &str,
        limit: usize,
    ) -> Result<Vec<PipelineRun>, ProviderError> {
        let Some((owner, repo)) = self.coordinates() else {
            warn!(
                provider = %self.config.name,
                "repository coordinates not configured; nothing to fetch"
            );
            return Ok(vec![]);
        };

        let url = format!(
            "{}/repos/{owner}/{repo}/actions/workflows/{pipeline_id}/runs",
            self.api_base
        );
        let response = self
            .client
            .get(&url)
            .query(&[("per_page", limit.to_string())])
            .send()
            .await
            .map_err(|err| self.network_error(err))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ProviderError::not_found(
                self.config.name.clone(),
                format!("pipeline {pipeline_id}"),
            ));
        }
        if !response.status().is_success() {
            return Err(self.remote_error("list workflow runs", response).await);
        }

        let data: WorkflowRunsResponse = response
            .json()
            .await
            .map_err(|err| self.network_error(err))?;

        Ok(data
            .workflow_runs
            .into_iter()
            .take(limit)
            .map(|run| self.to_run(pipeline_id, run))
            .collect())
    }

    async fn trigger_pipeline(
        &self,
        pipeline_id: &str,
        parameters: Map<String, JsonValue>,
    ) -> Result<PipelineRun, ProviderError> {
        let Some((owner, repo)) = self.coordinates() else {
            return Err(ProviderError::validation(
                "owner and repo must be configured to trigger a pipeline",
            ));
        };
        let (owner, repo) = (owner.to_string(), repo.to_string());

        // The dispatch endpoint wants the workflow file path, not the id.
        let workflow = self.resolve_workflow(&owner, &repo, pipeline_id).await?;
        let dispatch_target = workflow.path.unwrap_or_else(|| workflow.id.to_string());

        let git_ref = parameters
            .get("ref")
            .and_then(|value| value.as_str())
            .unwrap_or(DEFAULT_BRANCH);
        let mut payload = json!({ "ref": git_ref });
        if let Some(inputs) = parameters.get("inputs") {
            payload["inputs"] = inputs.clone();
        }

        let url = format!(
            "{}/repos/{owner}/{repo}/actions/workflows/{dispatch_target}/dispatches",
            self.api_base
        );
        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|err| self.network_error(err))?;

        if response.status() != StatusCode::NO_CONTENT {
            return Err(self.remote_error("dispatch workflow", response).await);
        }

        // Bounded poll-back: one short delay, one lookup, then a placeholder.
        tokio::time::sleep(self.run_lookup_delay).await;
        if let Ok(mut runs) = self.fetch_pipeline_runs(pipeline_id, 1).await {
            if !runs.is_empty() {
                return Ok(runs.remove(0));
            }
        }

        Ok(PipelineRun {
            id: format!("pending_{pipeline_id}"),
            pipeline_id: pipeline_id.to_string(),
            status: PipelineStatus::Pending,
            started_at: None,
            finished_at: None,
            duration: None,
            parameters,
        })
    }

    async fn re_run_pipeline(&self, run_id: &str) -> Result<PipelineRun, ProviderError> {
        let Some((owner, repo)) = self.coordinates() else {
            return Err(ProviderError::validation(
                "owner and repo must be configured to re-run a pipeline",
            ));
        };
        let (owner, repo) = (owner.to_string(), repo.to_string());

        let url = format!(
            "{}/repos/{owner}/{repo}/actions/runs/{run_id}/rerun",
            self.api_base
        );
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|err| self.network_error(err))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ProviderError::not_found(
                self.config.name.clone(),
                format!("run {run_id}"),
            ));
        }
        if response.status() != StatusCode::CREATED {
            return Err(self.remote_error("re-run workflow", response).await);
        }

        // Locate the new run via the owning workflow; any miss falls back to
        // a placeholder rather than waiting.
        let run_url = format!(
            "{}/repos/{owner}/{repo}/actions/runs/{run_id}",
            self.api_base
        );
        let workflow_id = match self.client.get(&run_url).send().await {
            Ok(response) if response.status().is_success() => response
                .json::<WorkflowRun>()
                .await
                .ok()
                .and_then(|run| run.workflow_id),
            _ => None,
        };

        if let Some(workflow_id) = workflow_id {
            tokio::time::sleep(self.run_lookup_delay).await;
            if let Ok(mut runs) = self
                .fetch_pipeline_runs(&workflow_id.to_string(), 10)
                .await
            {
                if !runs.is_empty() {
                    return Ok(runs.remove(0));
                }
            }
        }

        Ok(PipelineRun {
            id: format!("rerun_{run_id}"),
            pipeline_id: workflow_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            status: PipelineStatus::Pending,
            started_at: None,
            finished_at: None,
            duration: None,
            parameters: Map::new(),
        })
    }

    async fn cancel_pipeline(&self, run_id: &str) -> Result<bool, ProviderError> {
        let Some((owner, repo)) = self.coordinates() else {
            return Ok(false);
        };

        let url = format!(
            "{}/repos/{owner}/{repo}/actions/runs/{run_id}/cancel",
            self.api_base
        );
        match self.client.post(&url).send().await {
            Ok(response) => Ok(response.status() == StatusCode::ACCEPTED),
            Err(err) => {
                warn!(provider = %self.config.name, run_id, error = %err, "cancel request failed");
                Ok(false)
            }
        }
    }

    async fn get_available_parameters(
        &self,
        pipeline_id: &str,
    ) -> Result<Map<String, JsonValue>, ProviderError> {
        let Some((owner, repo)) = self.coordinates() else {
            return Ok(Map::new());
        };
        let (owner, repo) = (owner.to_string(), repo.to_string());

        if self.resolve_workflow(&owner, &repo, pipeline_id).await.is_err() {
            return Ok(Map::new());
        }

        // Full input discovery would require parsing the workflow file; the
        // dispatch envelope is stable, so expose that.
        let mut parameters = Map::new();
        parameters.insert(
            "ref".to_string(),
            json!({
                "type": "string",
                "description": "Branch or tag to run the workflow on",
                "default": DEFAULT_BRANCH,
            }),
        );
        parameters.insert(
            "inputs".to_string(),
            json!({
                "type": "object",
                "description": "Workflow dispatch inputs",
            }),
        );
        Ok(parameters)
    }
}

#[derive(Debug, Deserialize)]
struct WorkflowsResponse {
    #[serde(default)]
    workflows: Vec<Workflow>,
}

#[derive(Debug, Deserialize)]
struct Workflow {
    id: i64,
    name: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WorkflowRunsResponse {
    #[serde(default)]
    workflow_runs: Vec<WorkflowRun>,
}

#[derive(Debug, Deserialize)]
struct WorkflowRun {
    id: i64,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    conclusion: Option<String>,
    #[serde(default)]
    head_branch: Option<String>,
    #[serde(default)]
    head_sha: Option<String>,
    #[serde(default)]
    head_commit: Option<HeadCommit>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    workflow_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct HeadCommit {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    author: Option<CommitAuthor>,
}

#[derive(Debug, Deserialize)]
struct CommitAuthor {
    #[serde(default)]
    name: Option<String>,
}
