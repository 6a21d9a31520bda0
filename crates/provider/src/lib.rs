//! External configuration providers.
//!
//! A provider fetches per-service configuration overrides (env values, a
//! branch hint, arbitrary k8s keys) from outside the cluster definitions:
//! either a directory of JSON files or the remote env-api service. Providers
//! are compiled in and selected by identifier at startup; the
//! [`ProviderAdapter`] is the only surface the rest of the pipeline sees and
//! it never lets a provider failure escape.

#![forbid(unsafe_code)]

mod adapter;
mod env_api;
mod file;
mod registry;
mod result;

pub use adapter::ProviderAdapter;
pub use env_api::{EnvApiOptions, EnvApiProvider, ANNOTATION_BRANCH, ANNOTATION_SERVICE};
pub use file::FileProvider;
pub use registry::{build_provider, ProviderOptions};
pub use result::{normalize_env, ProviderConfig};

use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("service name is required for config lookup")]
    MissingServiceName,
    #[error("cluster name is required for config lookup")]
    MissingCluster,
    #[error("configPath is a required configuration value")]
    MissingConfigPath,
    #[error("reading {}: {}", .path.display(), .source)]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config payload: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// A pluggable external configuration source.
///
/// Implementations normalize their own response shape into the canonical
/// [`ProviderConfig`] before returning. A returned error means the fetch
/// failed outright; downgrading that to "no overrides" is the adapter's job,
/// not the provider's.
#[async_trait::async_trait]
pub trait ConfigProvider: Send + Sync {
    async fn fetch(&self, service: &Value, cluster: &str) -> anyhow::Result<ProviderConfig>;
}
