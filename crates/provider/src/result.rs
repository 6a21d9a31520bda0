//! Canonical provider result shape.

use deploymentizer_core::EnvEntry;
use serde_json::{Map, Value};
use tracing::warn;

/// Canonical result of a provider fetch: `{env: EnvEntry[], branch?, ...}`.
///
/// Every provider response is normalized into this shape before it gets
/// anywhere near a merge, so the rest of the pipeline never branches on
/// response shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderConfig {
    pub env: Vec<EnvEntry>,
    pub branch: Option<String>,
    /// Remaining top-level keys (the `k8s.*` extras of the env-api).
    pub extra: Map<String, Value>,
}

impl ProviderConfig {
    pub fn is_empty(&self) -> bool {
        self.env.is_empty() && self.branch.is_none() && self.extra.is_empty()
    }

    /// Serialize into a plain object suitable for the merge engine. Absent
    /// `branch` and empty `env` are omitted so they cannot clobber values
    /// already present in the target.
    pub fn into_value(self) -> Value {
        let mut obj = self.extra;
        if let Some(branch) = self.branch {
            obj.insert("branch".into(), Value::String(branch));
        }
        if !self.env.is_empty() {
            let env: Vec<Value> = self
                .env
                .iter()
                .filter_map(|e| serde_json::to_value(e).ok())
                .collect();
            obj.insert("env".into(), Value::Array(env));
        }
        Value::Object(obj)
    }
}

/// Normalize the two env shapes providers are allowed to return: an object
/// map of `name -> value`, or an array of `{name, value}` entries. Anything
/// else yields no entries.
pub fn normalize_env(value: &Value) -> Vec<EnvEntry> {
    match value {
        Value::Array(list) => list
            .iter()
            .filter_map(|entry| match serde_json::from_value(entry.clone()) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "dropping malformed env entry from provider response");
                    None
                }
            })
            .collect(),
        Value::Object(map) => map
            .iter()
            .map(|(name, value)| EnvEntry::new(name.clone(), value.clone()))
            .collect(),
        _ => Vec::new(),
    }
}
