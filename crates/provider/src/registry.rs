//! Compiled-in provider registry, keyed by identifier.

use crate::{ConfigProvider, EnvApiOptions, EnvApiProvider, FileProvider, ProviderError};
use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Options shared by all provider kinds; each provider picks what it needs.
#[derive(Debug, Clone)]
pub struct ProviderOptions {
    /// Base directory for the `file` provider.
    pub config_path: Option<PathBuf>,
    /// Base URL for the `env-api` provider.
    pub api_url: Option<String>,
    pub api_token: Option<String>,
    pub timeout: Duration,
    pub alt_branch: bool,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            config_path: None,
            api_url: None,
            api_token: None,
            timeout: DEFAULT_TIMEOUT,
            alt_branch: false,
        }
    }
}

/// Build a provider by identifier. Providers are compiled in; an unknown
/// identifier is a startup error, not a runtime fallback.
pub fn build_provider(id: &str, options: &ProviderOptions) -> Result<Arc<dyn ConfigProvider>> {
    match id {
        "file" => {
            let config_path = options
                .config_path
                .clone()
                .ok_or(ProviderError::MissingConfigPath)?;
            Ok(Arc::new(FileProvider::new(config_path)))
        }
        "env-api" => {
            let api_url = options
                .api_url
                .clone()
                .context("api-url is required for the env-api provider")?;
            let api_token = options
                .api_token
                .clone()
                .context("api-token is required for the env-api provider")?;
            let provider = EnvApiProvider::new(EnvApiOptions {
                api_url,
                api_token,
                timeout: options.timeout,
                alt_branch: options.alt_branch,
            })?;
            Ok(Arc::new(provider))
        }
        other => bail!("unknown config provider: {other}"),
    }
}
