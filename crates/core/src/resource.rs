//! Typed read-only views over raw resource documents.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One environment entry. Uniqueness key is `name`; insertion order is
/// semantically visible and preserved across merges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvEntry {
    pub name: String,
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

impl EnvEntry {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            external: None,
            encoding: None,
        }
    }
}

/// Borrowed view over one named entry in `cluster.resources`.
///
/// A resource is either a single container descriptor or carries a
/// `containers` mapping for multi-container resources.
#[derive(Debug, Clone, Copy)]
pub struct Resource<'a> {
    doc: &'a Value,
}

impl<'a> Resource<'a> {
    pub fn new(doc: &'a Value) -> Self {
        Self { doc }
    }

    pub fn raw(&self) -> &'a Value {
        self.doc
    }

    pub fn disabled(&self) -> bool {
        self.doc
            .get("disable")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Template or static-file path for this resource, if any.
    pub fn file(&self) -> Option<&'a str> {
        self.doc.get("file").and_then(Value::as_str)
    }

    pub fn svc(&self) -> Option<&'a Value> {
        self.doc.get("svc").filter(|v| !v.is_null())
    }

    pub fn branch(&self) -> Option<&'a str> {
        self.doc.get("branch").and_then(Value::as_str)
    }

    pub fn image_tag(&self) -> Option<&'a str> {
        self.doc.get("image_tag").and_then(Value::as_str)
    }

    pub fn env(&self) -> Option<&'a Value> {
        self.doc.get("env").filter(|v| !v.is_null())
    }

    pub fn annotations(&self) -> Option<&'a Value> {
        self.doc.get("annotations")
    }

    /// Container mapping for multi-container resources; `None` means the
    /// resource itself is the single container.
    pub fn containers(&self) -> Option<&'a serde_json::Map<String, Value>> {
        self.doc.get("containers").and_then(Value::as_object)
    }
}
