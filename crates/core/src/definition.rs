//! Cluster definition documents and their layered merge operation.

use deploymentizer_merge::{merge, NamedArrayFields};
use serde_json::{json, Value};

#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("invalid document kind: expected {expected}, found {found}")]
    InvalidDocumentKind {
        expected: &'static str,
        found: String,
    },
    #[error("unknown document kind: {0}")]
    UnknownKind(String),
}

/// Declared kind of a configuration document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocKind {
    ClusterNamespace,
    ResourceConfig,
    ClusterDefinition,
}

impl DocKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            DocKind::ClusterNamespace => "ClusterNamespace",
            DocKind::ResourceConfig => "ResourceConfig",
            DocKind::ClusterDefinition => "ClusterDefinition",
        }
    }

    /// Read the declared kind of a document, if it is a recognized one.
    pub fn of(doc: &Value) -> Option<DocKind> {
        match doc.get("kind").and_then(Value::as_str) {
            Some("ClusterNamespace") => Some(DocKind::ClusterNamespace),
            Some("ResourceConfig") => Some(DocKind::ResourceConfig),
            Some("ClusterDefinition") => Some(DocKind::ClusterDefinition),
            _ => None,
        }
    }
}

fn found_kind(doc: &Value) -> String {
    doc.get("kind")
        .and_then(Value::as_str)
        .unwrap_or("null")
        .to_string()
}

/// One cluster's desired resources plus its default resource configuration.
///
/// Built from a `ClusterNamespace` document and an optional `ResourceConfig`
/// document; both kinds are validated at construction. Identity is
/// `cluster.metadata.name`. The only mutation path is [`apply`], which layers
/// a base document underneath this definition (this definition always wins
/// ties) without mutating the base.
///
/// [`apply`]: ClusterDefinition::apply
#[derive(Debug, Clone)]
pub struct ClusterDefinition {
    cluster: Value,
    rs_config: Value,
}

impl ClusterDefinition {
    pub fn new(cluster: Value, rs_config: Option<Value>) -> Result<Self, DefinitionError> {
        if DocKind::of(&cluster) != Some(DocKind::ClusterNamespace) {
            return Err(DefinitionError::InvalidDocumentKind {
                expected: DocKind::ClusterNamespace.as_str(),
                found: found_kind(&cluster),
            });
        }
        let rs_config = match rs_config {
            Some(cfg) if !cfg.is_null() => {
                if DocKind::of(&cfg) != Some(DocKind::ResourceConfig) {
                    return Err(DefinitionError::InvalidDocumentKind {
                        expected: DocKind::ResourceConfig.as_str(),
                        found: found_kind(&cfg),
                    });
                }
                cfg
            }
            _ => json!({ "kind": DocKind::ResourceConfig.as_str() }),
        };
        Ok(Self { cluster, rs_config })
    }

    /// The name of this cluster (`cluster.metadata.name`).
    pub fn name(&self) -> &str {
        self.metadata("name").unwrap_or("")
    }

    /// Deployment type of this cluster, e.g. develop/testing/production.
    pub fn cluster_type(&self) -> Option<&str> {
        self.metadata("type")
    }

    /// Default branch for resources of this cluster.
    pub fn branch(&self) -> Option<&str> {
        self.metadata("branch")
    }

    /// Clusters can opt out of generation entirely with
    /// `metadata.disable: true`.
    pub fn disabled(&self) -> bool {
        self.cluster
            .get("metadata")
            .and_then(|m| m.get("disable"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    fn metadata(&self, key: &str) -> Option<&str> {
        self.cluster
            .get("metadata")
            .and_then(|m| m.get(key))
            .and_then(Value::as_str)
    }

    /// Resource map of this cluster, by resource name.
    pub fn resources(&self) -> Option<&serde_json::Map<String, Value>> {
        self.cluster.get("resources").and_then(Value::as_object)
    }

    pub fn resource(&self, name: &str) -> Option<&Value> {
        self.resources().and_then(|r| r.get(name))
    }

    /// The default resource configuration document for this cluster.
    pub fn configuration(&self) -> &Value {
        &self.rs_config
    }

    /// Layer `base` underneath this definition. Values already present here
    /// take precedence; `base` is never mutated.
    ///
    /// Dispatches on the base document's declared kind: a full
    /// `ClusterDefinition` layers both halves independently, a
    /// `ClusterNamespace` only the cluster document, a `ResourceConfig` only
    /// the resource configuration.
    pub fn apply(&mut self, base: &Value) -> Result<(), DefinitionError> {
        if base.is_null() {
            return Ok(());
        }
        let named = NamedArrayFields::default();
        match DocKind::of(base) {
            Some(DocKind::ClusterDefinition) => {
                let null = Value::Null;
                self.cluster = merge(base.get("cluster").unwrap_or(&null), &self.cluster, &named);
                self.rs_config =
                    merge(base.get("rsConfig").unwrap_or(&null), &self.rs_config, &named);
            }
            Some(DocKind::ClusterNamespace) => {
                self.cluster = merge(base, &self.cluster, &named);
            }
            Some(DocKind::ResourceConfig) => {
                self.rs_config = merge(base, &self.rs_config, &named);
            }
            None => return Err(DefinitionError::UnknownKind(found_kind(base))),
        }
        Ok(())
    }

    /// Serialize this definition, kind included, so it can itself be applied
    /// as the base of another definition.
    pub fn to_value(&self) -> Value {
        json!({
            "kind": DocKind::ClusterDefinition.as_str(),
            "cluster": self.cluster,
            "rsConfig": self.rs_config,
        })
    }
}
