//! Read-only image lookup table: tag -> branch -> image reference.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One image entry, as loaded from a `<branch>.yaml` image definition file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageSpec {
    pub image: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ImageSpec {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Mapping of `image_tag -> branch -> ImageSpec`. Populated once by the
/// loader and only read afterwards, so it is safe to share across clusters.
#[derive(Debug, Clone, Default)]
pub struct ImageResourceDefs {
    defs: HashMap<String, HashMap<String, ImageSpec>>,
}

impl ImageResourceDefs {
    pub fn insert(&mut self, tag: impl Into<String>, branch: impl Into<String>, spec: ImageSpec) {
        self.defs
            .entry(tag.into())
            .or_default()
            .insert(branch.into(), spec);
    }

    pub fn lookup(&self, tag: &str, branch: &str) -> Option<&ImageSpec> {
        self.defs.get(tag).and_then(|branches| branches.get(branch))
    }

    /// Branches known for a tag, for diagnostics on lookup misses.
    pub fn branches(&self, tag: &str) -> Vec<&str> {
        let mut out: Vec<&str> = self
            .defs
            .get(tag)
            .map(|branches| branches.keys().map(String::as_str).collect())
            .unwrap_or_default();
        out.sort_unstable();
        out
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }
}
