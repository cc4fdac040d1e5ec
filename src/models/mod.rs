//! Entity models for the pipedeck cache schema.

pub mod pipeline;
pub mod pipeline_run;
pub mod provider_secret;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Basic service information returned by the root endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// Service name
    pub name: String,
    /// Service version
    pub version: String,
    /// Operational status
    pub status: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            status: "operational".to_string(),
        }
    }
}
