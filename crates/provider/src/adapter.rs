//! Failure-absorbing façade over the active provider.

use crate::{ConfigProvider, ProviderConfig};
use deploymentizer_core::Notifier;
use metrics::counter;
use serde_json::Value;
use std::sync::Arc;

/// Wraps the configured [`ConfigProvider`]. A broken or unreachable external
/// configuration source degrades to "no overrides" for the one resource being
/// built; it never aborts the run.
#[derive(Clone)]
pub struct ProviderAdapter {
    provider: Arc<dyn ConfigProvider>,
    notifier: Arc<dyn Notifier>,
}

impl ProviderAdapter {
    pub fn new(provider: Arc<dyn ConfigProvider>, notifier: Arc<dyn Notifier>) -> Self {
        Self { provider, notifier }
    }

    /// Fetch overrides for one service. Infallible by contract: provider
    /// errors are reported and replaced with the empty config.
    pub async fn fetch(
        &self,
        service: &Value,
        env_type: Option<&str>,
        cluster: &str,
    ) -> ProviderConfig {
        let service_name = service
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("<unnamed>");
        counter!("provider_fetch_attempts", 1u64);
        self.notifier.debug(&format!(
            "fetching external config for {service_name} ({} on {cluster})",
            env_type.unwrap_or("untyped")
        ));
        match self.provider.fetch(service, cluster).await {
            Ok(config) => config,
            Err(e) => {
                counter!("provider_fetch_failures", 1u64);
                self.notifier.warn(&format!(
                    "external config fetch failed for {service_name} on {cluster}: {e:#}; continuing without overrides"
                ));
                ProviderConfig::default()
            }
        }
    }
}
