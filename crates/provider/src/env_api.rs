//! Remote env-api client with two-phase branch negotiation.
//!
//! The first request goes out with the branch named by the service's branch
//! annotation (if any). The response reports the branch the api actually
//! served under `k8s.branch`; when alternate-branch negotiation is enabled
//! and that differs from what was requested, the same request is reissued
//! with the reported branch. The final `branch` field keeps the value from
//! the first response even when the env values come from the second; that
//! asymmetry is part of the protocol contract.

use crate::{normalize_env, ConfigProvider, ProviderConfig, ProviderError};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Annotation naming the env-api service to query for a resource. Absent
/// annotation means "no external config for this resource".
pub const ANNOTATION_SERVICE: &str = "kit-deploymentizer/env-api-service";
/// Annotation overriding the branch sent on the first request.
pub const ANNOTATION_BRANCH: &str = "kit-deploymentizer/env-api-branch";

#[derive(Debug, Clone)]
pub struct EnvApiOptions {
    pub api_url: String,
    pub api_token: String,
    pub timeout: Duration,
    /// Enable the second, renegotiated request when the reported branch
    /// differs from the requested one.
    pub alt_branch: bool,
}

pub struct EnvApiProvider {
    api_url: String,
    api_token: String,
    alt_branch: bool,
    client: reqwest::Client,
}

impl EnvApiProvider {
    pub fn new(options: EnvApiOptions) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()?;
        Ok(Self {
            api_url: options.api_url.trim_end_matches('/').to_string(),
            api_token: options.api_token,
            alt_branch: options.alt_branch,
            client,
        })
    }

    async fn request(
        &self,
        service: &str,
        cluster: &str,
        branch: Option<&str>,
    ) -> Result<Value, ProviderError> {
        let url = format!("{}/{service}", self.api_url);
        let mut query: Vec<(&str, &str)> = vec![("env", cluster)];
        if let Some(branch) = branch {
            query.push(("branch", branch));
        }
        let response = self
            .client
            .get(&url)
            .header("X-Auth-Token", &self.api_token)
            .query(&query)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn negotiate(
        &self,
        service: &str,
        cluster: &str,
        requested: Option<&str>,
    ) -> Result<ProviderConfig, ProviderError> {
        let first = self.request(service, cluster, requested).await?;

        let mut config = ProviderConfig::default();
        if let Some(k8s) = first.get("k8s").and_then(Value::as_object) {
            for (key, value) in k8s {
                if key == "branch" {
                    config.branch = value.as_str().map(str::to_owned);
                } else {
                    config.extra.insert(key.clone(), value.clone());
                }
            }
        }
        if let Some(env) = first.get("env") {
            config.env = normalize_env(env);
        }

        if self.alt_branch {
            if let Some(reported) = config.branch.clone() {
                if requested != Some(reported.as_str()) {
                    debug!(
                        service,
                        cluster,
                        requested = requested.unwrap_or(""),
                        reported = %reported,
                        "env-api reported a different branch, refetching"
                    );
                    let second = self.request(service, cluster, Some(&reported)).await?;
                    if let Some(env) = second.get("env") {
                        config.env = normalize_env(env);
                    }
                    // config.branch keeps the first response's value
                }
            }
        }
        Ok(config)
    }
}

#[async_trait::async_trait]
impl ConfigProvider for EnvApiProvider {
    async fn fetch(&self, service: &Value, cluster: &str) -> anyhow::Result<ProviderConfig> {
        let Some(api_service) = annotation(service, ANNOTATION_SERVICE) else {
            warn!(
                cluster,
                "service carries no {ANNOTATION_SERVICE} annotation, skipping env-api fetch"
            );
            return Ok(ProviderConfig::default());
        };
        let requested = annotation(service, ANNOTATION_BRANCH);
        match self.negotiate(api_service, cluster, requested).await {
            Ok(config) => Ok(config),
            Err(e) => {
                error!(service = api_service, cluster, error = %e, "env-api fetch failed");
                Err(e.into())
            }
        }
    }
}

fn annotation<'a>(service: &'a Value, key: &str) -> Option<&'a str> {
    service
        .get("annotations")
        .and_then(|a| a.get(key))
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
}
