//! Integration tests for the GitHub Actions provider against a mock API.

use std::time::Duration;

use serde_json::{Map, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pipedeck::providers::{
    GITHUB_PROVIDER_TYPE, GitHubProvider, PipelineStatus, Provider, ProviderConfig, ProviderError,
};

fn provider_for(server: &MockServer) -> GitHubProvider {
    let config = ProviderConfig::new("gh-test", GITHUB_PROVIDER_TYPE)
        .with_setting("owner", "acme")
        .with_setting("repo", "widgets")
        .with_setting("base_url", server.uri());

    GitHubProvider::new(config, Some("test-token".to_string()))
        .expect("provider builds")
        .with_run_lookup_delay(Duration::ZERO)
}

fn workflow_json() -> serde_json::Value {
    json!({
        "workflows": [{
            "id": 101,
            "name": "CI",
            "path": ".github/workflows/ci.yml",
            "html_url": "https://github.com/acme/widgets/actions/workflows/ci.yml"
        }]
    })
}

fn completed_run_json(id: i64) -> serde_json::Value {
    json!({
        "id": id,
        "status": "completed",
        "conclusion": "success",
        "head_branch": "main",
        "head_sha": "abc123def456",
        "head_commit": {
            "message": "fix the build",
            "author": { "name": "Dev One" }
        },
        "created_at": "2025-07-01T12:00:00Z",
        "updated_at": "2025-07-01T12:10:00Z",
        "workflow_id": 101
    })
}

#[tokio::test]
async fn fetch_pipelines_maps_workflows_and_latest_run() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/actions/workflows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(workflow_json()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/actions/workflows/101/runs"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "workflow_runs": [completed_run_json(7001)] })),
        )
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let pipelines = provider.fetch_pipelines().await.expect("fetch succeeds");

    assert_eq!(pipelines.len(), 1);
    let pipeline = &pipelines[0];
    assert_eq!(pipeline.id, "101");
    assert_eq!(pipeline.name, "CI");
    assert_eq!(pipeline.status, PipelineStatus::Success);
    assert_eq!(pipeline.repository, "acme/widgets");
    assert_eq!(pipeline.branch, "main");
    assert_eq!(pipeline.commit, "abc123def456");
    assert_eq!(pipeline.commit_message.as_deref(), Some("fix the build"));
    assert_eq!(pipeline.author.as_deref(), Some("Dev One"));
    assert!(pipeline.started_at.is_some());
    assert!(pipeline.finished_at.is_some(), "completed run has finished_at");
    assert_eq!(pipeline.provider, "gh-test");
}

#[tokio::test]
async fn pipeline_without_run_history_is_pending() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/actions/workflows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(workflow_json()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/actions/workflows/101/runs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "workflow_runs": [] })))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let pipelines = provider.fetch_pipelines().await.expect("fetch succeeds");

    assert_eq!(pipelines[0].status, PipelineStatus::Pending);
    assert_eq!(pipelines[0].branch, "unknown");
    assert!(pipelines[0].finished_at.is_none());
}

#[tokio::test]
async fn fetch_pipelines_without_coordinates_is_empty() {
    let config = ProviderConfig::new("gh-test", GITHUB_PROVIDER_TYPE);
    let provider = GitHubProvider::new(config, None).expect("builds");

    let pipelines = provider.fetch_pipelines().await.expect("no error");
    assert!(pipelines.is_empty(), "empty means nothing fetched");
}

#[tokio::test]
async fn fetch_pipelines_surfaces_remote_failures() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/actions/workflows"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let result = provider.fetch_pipelines().await;
    assert!(matches!(result, Err(ProviderError::Remote { .. })));
}

#[tokio::test]
async fn rejected_credentials_map_to_authentication_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/actions/workflows"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let result = provider.fetch_pipelines().await;
    assert!(matches!(result, Err(ProviderError::Authentication { .. })));
}

#[tokio::test]
async fn validate_credentials_checks_the_user_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "login": "dev" })))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    assert!(provider.validate_credentials().await);
}

#[tokio::test]
async fn validate_credentials_is_false_on_rejection_or_missing_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    assert!(!provider.validate_credentials().await);

    // No token: false without even calling the API.
    let config = ProviderConfig::new("gh-test", GITHUB_PROVIDER_TYPE)
        .with_setting("base_url", server.uri());
    let tokenless = GitHubProvider::new(config, None).expect("builds");
    assert!(!tokenless.validate_credentials().await);
}

#[tokio::test]
async fn run_history_computes_duration_only_for_terminal_runs() {
    let server = MockServer::start().await;

    let running_run = json!({
        "id": 7002,
        "status": "in_progress",
        "conclusion": null,
        "created_at": "2025-07-01T13:00:00Z",
        "updated_at": "2025-07-01T13:01:00Z",
        "workflow_id": 101
    });

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/actions/workflows/101/runs"))
        .and(query_param("per_page", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "workflow_runs": [running_run, completed_run_json(7001)]
        })))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let runs = provider
        .fetch_pipeline_runs("101", 10)
        .await
        .expect("fetch succeeds");

    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].id, "7002");
    assert_eq!(runs[0].status, PipelineStatus::Running);
    assert_eq!(runs[0].duration, None, "in-flight run has no duration");
    assert!(runs[0].finished_at.is_none());

    assert_eq!(runs[1].id, "7001");
    assert_eq!(runs[1].status, PipelineStatus::Success);
    assert_eq!(runs[1].duration, Some(600.0));
}

#[tokio::test]
async fn run_history_for_unknown_pipeline_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/actions/workflows/999/runs"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let result = provider.fetch_pipeline_runs("999", 10).await;
    assert!(matches!(result, Err(ProviderError::NotFound { .. })));
}

#[tokio::test]
async fn trigger_dispatches_and_returns_the_new_run() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/actions/workflows/101"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 101,
            "name": "CI",
            "path": ".github/workflows/ci.yml"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(
            "/repos/acme/widgets/actions/workflows/.github/workflows/ci.yml/dispatches",
        ))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/actions/workflows/101/runs"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "workflow_runs": [completed_run_json(7003)] })),
        )
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let mut parameters = Map::new();
    parameters.insert("ref".to_string(), json!("release"));

    let run = provider
        .trigger_pipeline("101", parameters)
        .await
        .expect("trigger succeeds");
    assert_eq!(run.id, "7003");
    assert_eq!(run.pipeline_id, "101");
}

#[tokio::test]
async fn trigger_returns_placeholder_when_run_not_yet_visible() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/actions/workflows/101"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 101,
            "name": "CI",
            "path": ".github/workflows/ci.yml"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(
            "/repos/acme/widgets/actions/workflows/.github/workflows/ci.yml/dispatches",
        ))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/actions/workflows/101/runs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "workflow_runs": [] })))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let mut parameters = Map::new();
    parameters.insert("ref".to_string(), json!("main"));

    let run = provider
        .trigger_pipeline("101", parameters.clone())
        .await
        .expect("trigger succeeds");
    assert_eq!(run.id, "pending_101");
    assert_eq!(run.status, PipelineStatus::Pending);
    assert_eq!(run.parameters, parameters, "dispatch inputs preserved");
}

#[tokio::test]
async fn trigger_on_missing_pipeline_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/actions/workflows/404"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let result = provider.trigger_pipeline("404", Map::new()).await;
    assert!(matches!(result, Err(ProviderError::NotFound { .. })));
}

#[tokio::test]
async fn trigger_without_coordinates_is_a_validation_error() {
    let config = ProviderConfig::new("gh-test", GITHUB_PROVIDER_TYPE);
    let provider = GitHubProvider::new(config, Some("t".to_string())).expect("builds");

    let result = provider.trigger_pipeline("101", Map::new()).await;
    assert!(matches!(result, Err(ProviderError::Validation(_))));
}

#[tokio::test]
async fn cancel_is_best_effort() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/repos/acme/widgets/actions/runs/7001/cancel"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/widgets/actions/runs/7002/cancel"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    assert!(provider.cancel_pipeline("7001").await.expect("no error"));
    assert!(!provider.cancel_pipeline("7002").await.expect("no error"));
}

#[tokio::test]
async fn status_read_reflects_fetched_snapshot() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/actions/workflows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(workflow_json()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/actions/workflows/101/runs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "workflow_runs": [{
                "id": 7004,
                "status": "in_progress",
                "conclusion": null,
                "workflow_id": 101
            }]
        })))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    assert_eq!(
        provider.get_pipeline_status("101").await,
        PipelineStatus::Running
    );
    assert_eq!(
        provider.get_pipeline_status("nonexistent").await,
        PipelineStatus::Error
    );
}
