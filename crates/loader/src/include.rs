//! Recursive `fromFile` document inclusion.
//!
//! Any object in a loaded document may carry a `fromFile` key naming one or
//! more YAML files, resolved relative to the file the including document came
//! from. Referenced documents are expanded the same way and then layered
//! underneath the including object: the including object's values win, and
//! arrays of named entries reconcile by `name` key. When several files are
//! included, earlier ones win over later ones.

use crate::{load_file, sorted_entries};
use anyhow::{bail, Context, Result};
use deploymentizer_merge::merge_named;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Expand every `fromFile` reference in `doc` in place. `file` is the path
/// the document was loaded from; include paths resolve against its directory.
pub fn expand_includes(file: &Path, doc: &mut Value) -> Result<()> {
    match doc {
        Value::Object(_) => {
            if doc.get("fromFile").is_some() {
                expand_object(file, doc)?;
            }
            if let Some(map) = doc.as_object_mut() {
                for (_, child) in map.iter_mut() {
                    expand_includes(file, child)?;
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                expand_includes(file, item)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn expand_object(file: &Path, doc: &mut Value) -> Result<()> {
    let Some(obj) = doc.as_object_mut() else {
        return Ok(());
    };
    let references: Vec<String> = match obj.remove("fromFile") {
        Some(Value::String(path)) => vec![path],
        Some(Value::Array(list)) => list
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_owned))
            .collect(),
        _ => return Ok(()),
    };
    let dir = file.parent().unwrap_or_else(|| Path::new("."));
    for reference in references {
        let include_path = dir.join(&reference);
        let mut included = load_file(&include_path)
            .with_context(|| format!("including {reference} from {}", file.display()))?;
        expand_includes(&include_path, &mut included)?;
        // values already on the including side win over the included file
        *doc = merge_named(&included, doc);
    }
    Ok(())
}

/// Load the free-standing `Cluster` manifests in `dir`: every `*.yaml` file
/// must declare `kind: Cluster` and a `metadata.name`, and its `fromFile`
/// references are expanded before the manifest is returned.
pub fn load_cluster_manifests(dir: &Path) -> Result<Vec<Value>> {
    let mut clusters = Vec::new();
    for file in sorted_entries(dir)? {
        if file.extension().and_then(|e| e.to_str()) != Some("yaml") {
            continue;
        }
        let mut cluster = load_file(&file)?;
        match cluster.get("kind").and_then(Value::as_str) {
            Some("Cluster") => {}
            found => bail!(
                "expected kind 'Cluster', found '{}' in {}",
                found.unwrap_or("null"),
                file.display()
            ),
        }
        if manifest_name(&cluster).is_none() {
            bail!("missing required metadata.name in {}", file.display());
        }
        expand_includes(&file, &mut cluster)?;
        clusters.push(cluster);
    }
    if clusters.is_empty() {
        bail!("no cluster manifests found in {}", dir.display());
    }
    Ok(clusters)
}

/// Write each entry of a cluster manifest's `spec` list as
/// `<dir>/<cluster name>/<entry name>.yaml`.
pub fn save_cluster_manifest(dir: &Path, cluster: &Value) -> Result<Vec<PathBuf>> {
    let name = manifest_name(cluster).context("cluster manifest has no metadata.name")?;
    let cluster_dir = dir.join(name);
    fs::create_dir_all(&cluster_dir)
        .with_context(|| format!("creating {}", cluster_dir.display()))?;
    let entries = cluster
        .get("spec")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let mut written = Vec::with_capacity(entries.len());
    for entry in entries {
        let entry_name = manifest_name(entry)
            .with_context(|| format!("spec entry without metadata.name in cluster {name}"))?;
        let content = serde_yaml::to_string(entry)
            .with_context(|| format!("serializing {entry_name}"))?;
        let path = cluster_dir.join(format!("{entry_name}.yaml"));
        fs::write(&path, content).with_context(|| format!("writing {}", path.display()))?;
        info!(file = %path.display(), "wrote cluster manifest entry");
        written.push(path);
    }
    Ok(written)
}

fn manifest_name(doc: &Value) -> Option<&str> {
    doc.get("metadata")
        .and_then(|m| m.get("name"))
        .and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn documents_without_from_file_pass_through() {
        let mut doc = json!({ "id": "123", "age": 21, "name": "joe" });
        expand_includes(Path::new("/nowhere/cluster.yaml"), &mut doc).unwrap();
        assert_eq!(doc, json!({ "id": "123", "age": 21, "name": "joe" }));
    }

    #[test]
    fn from_file_is_replaced_by_the_included_content() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root.yaml");
        write(&dir.path().join("simple.yaml"), "testing: true\n");
        let mut doc = json!({ "id": "123", "fromFile": "./simple.yaml" });
        expand_includes(&root, &mut doc).unwrap();
        assert_eq!(doc, json!({ "id": "123", "testing": true }));
    }

    #[test]
    fn including_values_win_and_env_arrays_merge_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root.yaml");
        write(
            &dir.path().join("defaults.yaml"),
            concat!(
                "replicas: 2\n",
                "env:\n",
                "  - name: OVERRIDE\n    value: \"true\"\n",
                "  - name: NOCHANGE\n    value: okay\n",
            ),
        );
        let mut doc = json!({
            "replicas": 5,
            "env": [{ "name": "OVERRIDE", "value": "false" }],
            "fromFile": "./defaults.yaml"
        });
        expand_includes(&root, &mut doc).unwrap();
        assert_eq!(doc["replicas"], 5);
        assert_eq!(
            doc["env"],
            json!([
                { "name": "OVERRIDE", "value": "false" },
                { "name": "NOCHANGE", "value": "okay" }
            ])
        );
    }

    #[test]
    fn nested_includes_resolve_relative_to_their_own_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root.yaml");
        write(
            &dir.path().join("nested1/nested1.yaml"),
            "nested1: true\nfromFile: ../nested2/nested2.yaml\n",
        );
        write(&dir.path().join("nested2/nested2.yaml"), "nested2: true\n");
        let mut doc = json!({ "id": "123", "fromFile": "./nested1/nested1.yaml" });
        expand_includes(&root, &mut doc).unwrap();
        assert_eq!(doc, json!({ "id": "123", "nested1": true, "nested2": true }));
    }

    #[test]
    fn earlier_includes_win_over_later_ones() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root.yaml");
        write(&dir.path().join("first.yaml"), "first: true\nshared: first\n");
        write(&dir.path().join("second.yaml"), "second: true\nshared: second\n");
        let mut doc = json!({ "fromFile": ["./first.yaml", "./second.yaml"] });
        expand_includes(&root, &mut doc).unwrap();
        assert_eq!(
            doc,
            json!({ "first": true, "second": true, "shared": "first" })
        );
    }

    #[test]
    fn includes_nested_inside_children_are_expanded() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root.yaml");
        write(&dir.path().join("child.yaml"), "found: true\n");
        let mut doc = json!({
            "spec": [{ "metadata": { "fromFile": "./child.yaml" } }]
        });
        expand_includes(&root, &mut doc).unwrap();
        assert_eq!(doc, json!({ "spec": [{ "metadata": { "found": true } }] }));
    }

    #[test]
    fn missing_include_files_are_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root.yaml");
        let mut doc = json!({ "fromFile": "./absent.yaml" });
        let err = expand_includes(&root, &mut doc).unwrap_err();
        assert!(err.to_string().contains("absent.yaml"));
    }

    #[test]
    fn cluster_manifests_validate_kind_and_name() {
        let dir = tempfile::tempdir().unwrap();
        let clusters_dir = dir.path().join("clusters");
        write(
            &clusters_dir.join("good.yaml"),
            concat!(
                "kind: Cluster\n",
                "metadata:\n  name: testing\n",
                "spec:\n  - metadata:\n      name: app1-svc\n    fromFile: ../includes/app1.yaml\n",
            ),
        );
        write(&dir.path().join("includes/app1.yaml"), "ports:\n  - 80\n");
        let clusters = load_cluster_manifests(&clusters_dir).unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0]["spec"][0]["metadata"]["name"], "app1-svc");
        assert_eq!(clusters[0]["spec"][0]["ports"], json!([80]));

        write(&clusters_dir.join("bad.yaml"), "kind: Deployment\n");
        assert!(load_cluster_manifests(&clusters_dir).is_err());
    }

    #[test]
    fn empty_manifest_directories_are_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_cluster_manifests(dir.path()).is_err());
    }

    #[test]
    fn save_writes_one_file_per_spec_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cluster = json!({
            "kind": "Cluster",
            "metadata": { "name": "testing" },
            "spec": [
                { "metadata": { "name": "service1" }, "kind": "Service" },
                { "metadata": { "name": "service2" }, "kind": "Service" }
            ]
        });
        let written = save_cluster_manifest(dir.path(), &cluster).unwrap();
        assert_eq!(written.len(), 2);
        assert!(dir.path().join("testing/service1.yaml").exists());
        let content = fs::read_to_string(dir.path().join("testing/service2.yaml")).unwrap();
        assert!(content.contains("name: service2"));
        // saving again over the existing directory is fine
        save_cluster_manifest(dir.path(), &cluster).unwrap();
    }
}
