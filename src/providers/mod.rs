//! Providers module
//!
//! The provider SDK:
//! - The `Provider` trait defining the capability contract all CI/CD
//!   provider implementations satisfy
//! - The registry owning configured provider instances
//! - Individual provider implementations

pub mod github;
pub mod registry;
pub mod trait_;
pub mod types;

pub use github::{GITHUB_PROVIDER_TYPE, GitHubProvider};
pub use registry::{ProviderRegistry, RegistryError};
pub use trait_::{Provider, ProviderError};
pub use types::{Pipeline, PipelineRun, PipelineStatus, ProviderConfig};
