//! YAML discovery and loading for deployment definitions.
//!
//! On-disk layout under the load path:
//!
//! ```text
//! base-cluster.yaml          base ClusterNamespace document
//! base-var.yaml              base ResourceConfig document
//! type/<name>-var.yaml       per-type defaults, keyed by metadata.type
//! images/<tag>/<branch>.yaml image definitions ({image: ...})
//! clusters/<dir>/cluster.yaml
//! clusters/<dir>/configuration-var.yaml
//! ```
//!
//! All documents are parsed to `serde_json::Value` immediately; nothing else
//! in the pipeline touches YAML.

#![forbid(unsafe_code)]

mod include;

pub use include::{expand_includes, load_cluster_manifests, save_cluster_manifest};

use anyhow::{Context, Result};
use deploymentizer_core::{ClusterDefinition, ImageResourceDefs, ImageSpec};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Load one YAML file into a JSON value.
pub fn load_file(path: &Path) -> Result<Value> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let doc: serde_yaml::Value =
        serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    serde_json::to_value(doc).with_context(|| format!("converting {}", path.display()))
}

/// Load the base cluster definition pair everything else layers on top of.
pub fn load_base_definitions(load_path: &Path) -> Result<ClusterDefinition> {
    let cluster = load_file(&load_path.join("base-cluster.yaml"))?;
    let config = load_file(&load_path.join("base-var.yaml"))?;
    ClusterDefinition::new(cluster, Some(config)).context("building base cluster definition")
}

/// Load the per-type default documents, keyed by `metadata.type`. A load path
/// without a `type/` directory yields no definitions; type-less clusters are
/// still valid.
pub fn load_type_definitions(load_path: &Path) -> Result<std::collections::HashMap<String, Value>> {
    let dir = load_path.join("type");
    let mut defs = std::collections::HashMap::new();
    if !dir.is_dir() {
        warn!(dir = %dir.display(), "no type directory found, continuing without type definitions");
        return Ok(defs);
    }
    for path in sorted_entries(&dir)? {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.ends_with("-var.yaml") {
            continue;
        }
        let doc = load_file(&path)?;
        match doc
            .get("metadata")
            .and_then(|m| m.get("type"))
            .and_then(Value::as_str)
        {
            Some(type_name) => {
                debug!(type_name, file = %path.display(), "loaded type definition");
                defs.insert(type_name.to_string(), doc);
            }
            None => warn!(file = %path.display(), "type definition has no metadata.type, skipping"),
        }
    }
    Ok(defs)
}

/// Load the image definitions: one subdirectory per image tag, one
/// `<branch>.yaml` file per branch.
pub fn load_image_definitions(base_path: &Path) -> Result<ImageResourceDefs> {
    let mut defs = ImageResourceDefs::default();
    for tag_dir in sorted_entries(base_path)? {
        if !tag_dir.is_dir() {
            continue;
        }
        let Some(tag) = tag_dir.file_name().and_then(|n| n.to_str()).map(str::to_owned) else {
            continue;
        };
        for file in sorted_entries(&tag_dir)? {
            if file.extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }
            let Some(branch) = file.file_stem().and_then(|s| s.to_str()).map(str::to_owned)
            else {
                continue;
            };
            let doc = load_file(&file)?;
            let spec: ImageSpec = serde_json::from_value(doc)
                .with_context(|| format!("image definition {}", file.display()))?;
            defs.insert(tag.clone(), branch, spec);
        }
    }
    info!(tags = defs.len(), "loaded image definitions");
    Ok(defs)
}

/// Load every cluster definition found under `base_path`. A directory without
/// a `cluster.yaml` is skipped with a warning; a missing
/// `configuration-var.yaml` falls back to the empty resource config.
pub fn load_cluster_definitions(base_path: &Path) -> Result<Vec<ClusterDefinition>> {
    let mut clusters = Vec::new();
    for dir in sorted_entries(base_path)? {
        if !dir.is_dir() {
            continue;
        }
        let cluster_file = dir.join("cluster.yaml");
        if !cluster_file.exists() {
            warn!(dir = %dir.display(), "no cluster file found, skipping");
            continue;
        }
        info!(dir = %dir.display(), "found cluster directory");
        let cluster = load_file(&cluster_file)?;
        let config_file = dir.join("configuration-var.yaml");
        let config = if config_file.exists() {
            Some(load_file(&config_file)?)
        } else {
            None
        };
        let def = ClusterDefinition::new(cluster, config)
            .with_context(|| format!("cluster definition in {}", dir.display()))?;
        clusters.push(def);
    }
    Ok(clusters)
}

/// Save rendered manifest content as `<dir>/<name>.yaml`.
pub fn save_resource_file(dir: &Path, name: &str, content: &str) -> Result<PathBuf> {
    let path = dir.join(format!("{name}.yaml"));
    fs::write(&path, content).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

pub(crate) fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("listing {}", dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .collect();
    entries.sort();
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn load_file_parses_yaml_into_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.yaml");
        write(&path, "kind: ClusterNamespace\nmetadata:\n  name: staging\n");
        let doc = load_file(&path).unwrap();
        assert_eq!(doc["kind"], "ClusterNamespace");
        assert_eq!(doc["metadata"]["name"], "staging");
    }

    #[test]
    fn base_definitions_load_as_a_cluster_definition() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("base-cluster.yaml"),
            "kind: ClusterNamespace\nmetadata:\n  name: base\n",
        );
        write(&dir.path().join("base-var.yaml"), "kind: ResourceConfig\n");
        let base = load_base_definitions(dir.path()).unwrap();
        assert_eq!(base.name(), "base");
    }

    #[test]
    fn missing_type_directory_yields_no_definitions() {
        let dir = tempfile::tempdir().unwrap();
        let types = load_type_definitions(dir.path()).unwrap();
        assert!(types.is_empty());
    }

    #[test]
    fn type_definitions_are_keyed_by_metadata_type() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("type/develop-var.yaml"),
            "kind: ResourceConfig\nmetadata:\n  type: develop\nreplicas: 1\n",
        );
        write(
            &dir.path().join("type/production-var.yaml"),
            "kind: ResourceConfig\nmetadata:\n  type: production\nreplicas: 3\n",
        );
        write(&dir.path().join("type/notes.txt"), "ignored");
        let types = load_type_definitions(dir.path()).unwrap();
        assert_eq!(types.len(), 2);
        assert_eq!(types["production"]["replicas"], 3);
    }

    #[test]
    fn image_definitions_map_tag_then_branch() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("node-auth/develop.yaml"),
            "image: registry/node-auth:dev\n",
        );
        write(
            &dir.path().join("node-auth/release.yaml"),
            "image: registry/node-auth:1.0\n",
        );
        let defs = load_image_definitions(dir.path()).unwrap();
        assert_eq!(
            defs.lookup("node-auth", "develop").map(|s| s.image.as_str()),
            Some("registry/node-auth:dev")
        );
        assert_eq!(
            defs.lookup("node-auth", "release").map(|s| s.image.as_str()),
            Some("registry/node-auth:1.0")
        );
    }

    #[test]
    fn cluster_directories_without_cluster_yaml_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("staging/cluster.yaml"),
            "kind: ClusterNamespace\nmetadata:\n  name: staging\n",
        );
        write(
            &dir.path().join("staging/configuration-var.yaml"),
            "kind: ResourceConfig\n",
        );
        fs::create_dir_all(dir.path().join("empty-dir")).unwrap();
        let clusters = load_cluster_definitions(dir.path()).unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].name(), "staging");
    }

    #[test]
    fn save_resource_file_appends_the_yaml_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_resource_file(dir.path(), "auth-svc", "kind: Service\n").unwrap();
        assert!(path.ends_with("auth-svc.yaml"));
        assert_eq!(fs::read_to_string(path).unwrap(), "kind: Service\n");
    }
}
