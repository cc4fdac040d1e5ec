//! Provider domain types
//!
//! The unified model every provider maps its remote vocabulary into:
//! pipeline snapshots, run history, and per-instance configuration.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Execution status of a pipeline or a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Pending,
    Running,
    Success,
    Failure,
    Cancelled,
    Error,
}

impl PipelineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStatus::Pending => "pending",
            PipelineStatus::Running => "running",
            PipelineStatus::Success => "success",
            PipelineStatus::Failure => "failure",
            PipelineStatus::Cancelled => "cancelled",
            PipelineStatus::Error => "error",
        }
    }

    /// Parse a stored status string. Unknown values degrade to `Error` so a
    /// corrupt cache row never panics a read path.
    pub fn parse(value: &str) -> Self {
        match value {
            "pending" => PipelineStatus::Pending,
            "running" => PipelineStatus::Running,
            "success" => PipelineStatus::Success,
            "failure" => PipelineStatus::Failure,
            "cancelled" => PipelineStatus::Cancelled,
            _ => PipelineStatus::Error,
        }
    }

    /// Whether this status marks the end of an execution.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineStatus::Success
                | PipelineStatus::Failure
                | PipelineStatus::Cancelled
                | PipelineStatus::Error
        )
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for one provider instance.
///
/// `name` is unique within a registry and immutable after registration.
/// `settings` carries provider-specific values (repository coordinates, base
/// URL) and never secrets; credentials live in the vault, keyed by
/// `provider_type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub provider_type: String,
    pub enabled: bool,
    pub refresh_interval: u64,
    #[serde(default)]
    pub settings: Map<String, JsonValue>,
}

impl ProviderConfig {
    pub fn new<S: Into<String>>(name: S, provider_type: S) -> Self {
        Self {
            name: name.into(),
            provider_type: provider_type.into(),
            enabled: true,
            refresh_interval: 30,
            settings: Map::new(),
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_refresh_interval(mut self, seconds: u64) -> Self {
        self.refresh_interval = seconds;
        self
    }

    pub fn with_setting<S: Into<String>, V: Into<JsonValue>>(mut self, key: S, value: V) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Borrow a string-valued setting.
    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(|v| v.as_str())
    }
}

/// A named, repeatable workflow as observed from a provider at fetch time.
///
/// Recreated on every poll cycle; the cache store is the only long-lived
/// owner of pipeline state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: String,
    pub name: String,
    pub status: PipelineStatus,
    pub repository: String,
    pub branch: String,
    pub commit: String,
    pub commit_message: Option<String>,
    pub author: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub url: Option<String>,
    pub provider: String,
}

/// One execution of a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: String,
    pub pipeline_id: String,
    pub status: PipelineStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration: Option<f64>,
    #[serde(default)]
    pub parameters: Map<String, JsonValue>,
}

impl PipelineRun {
    /// Duration in seconds, computed only when both timestamps are present
    /// and the run has reached a terminal state.
    pub fn duration_between(
        started_at: Option<DateTime<Utc>>,
        finished_at: Option<DateTime<Utc>>,
        status: PipelineStatus,
    ) -> Option<f64> {
        if !status.is_terminal() {
            return None;
        }
        match (started_at, finished_at) {
            (Some(started), Some(finished)) => {
                Some((finished - started).num_milliseconds() as f64 / 1000.0)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn status_string_round_trip() {
        for status in [
            PipelineStatus::Pending,
            PipelineStatus::Running,
            PipelineStatus::Success,
            PipelineStatus::Failure,
            PipelineStatus::Cancelled,
            PipelineStatus::Error,
        ] {
            assert_eq!(PipelineStatus::parse(status.as_str()), status);
        }
    }

    #[test]
    fn unknown_status_parses_to_error() {
        assert_eq!(PipelineStatus::parse("exploded"), PipelineStatus::Error);
        assert_eq!(PipelineStatus::parse(""), PipelineStatus::Error);
    }

    #[test]
    fn duration_requires_terminal_status_and_both_timestamps() {
        let started = Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap();
        let finished = Utc.with_ymd_and_hms(2025, 7, 1, 12, 5, 30).unwrap();

        let duration = PipelineRun::duration_between(
            Some(started),
            Some(finished),
            PipelineStatus::Success,
        );
        assert_eq!(duration, Some(330.0));

        assert_eq!(
            PipelineRun::duration_between(Some(started), Some(finished), PipelineStatus::Running),
            None
        );
        assert_eq!(
            PipelineRun::duration_between(Some(started), None, PipelineStatus::Success),
            None
        );
    }

    #[test]
    fn provider_config_settings_access() {
        let config = ProviderConfig::new("ci-main", "github")
            .with_refresh_interval(10)
            .with_setting("owner", "acme")
            .with_setting("repo", "widgets");

        assert!(config.enabled);
        assert_eq!(config.refresh_interval, 10);
        assert_eq!(config.setting_str("owner"), Some("acme"));
        assert_eq!(config.setting_str("missing"), None);
    }
}
