//! File-backed provider: reads `<config_path>/<service>/<cluster>-env.json`.

use crate::{normalize_env, ConfigProvider, ProviderConfig, ProviderError};
use serde_json::Value;
use std::path::PathBuf;
use tracing::debug;

pub struct FileProvider {
    config_path: PathBuf,
}

impl FileProvider {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }
}

#[async_trait::async_trait]
impl ConfigProvider for FileProvider {
    async fn fetch(&self, service: &Value, cluster: &str) -> anyhow::Result<ProviderConfig> {
        let name = service
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .ok_or(ProviderError::MissingServiceName)?;
        if cluster.is_empty() {
            return Err(ProviderError::MissingCluster.into());
        }
        let path = self
            .config_path
            .join(name)
            .join(format!("{cluster}-env.json"));
        debug!(path = %path.display(), "loading env config file");
        let data = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| ProviderError::Io {
                path: path.clone(),
                source,
            })?;
        let value: Value = serde_json::from_str(&data).map_err(ProviderError::Parse)?;
        Ok(ProviderConfig {
            env: normalize_env(&value),
            ..Default::default()
        })
    }
}
