//! Per-resource local configuration assembly and manifest generation.
//!
//! For each non-disabled resource of a (fully layered) cluster definition the
//! [`Generator`] builds one local configuration: cluster default config, then
//! per-container overrides, then externally fetched config, then declared env
//! entries, then the resolved container image. The result feeds the template
//! renderer.

#![forbid(unsafe_code)]

mod render;

pub use render::{Renderer, VarRenderer};

use deploymentizer_core::{ClusterDefinition, ImageResourceDefs, Notifier, Resource};
use deploymentizer_merge::{load_external_env, merge, merge_envs, EnvError, NamedArrayFields};
use deploymentizer_provider::ProviderAdapter;
use metrics::counter;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("image {tag} not found for defined branch ({branch})")]
    ImageNotFound { tag: String, branch: String },
    #[error("unknown file type: {0}")]
    UnknownFileType(String),
    #[error("service entry is missing a name")]
    MissingServiceName,
    #[error(transparent)]
    Env(#[from] EnvError),
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("rendering {path}: {message}")]
    Render { path: String, message: String },
    #[error("saving {path}: {message}")]
    Save { path: String, message: String },
}

fn io_err(context: impl Into<String>, source: std::io::Error) -> GenerateError {
    GenerateError::Io {
        context: context.into(),
        source,
    }
}

/// Generates the manifest files for one cluster definition.
pub struct Generator {
    def: ClusterDefinition,
    images: Arc<ImageResourceDefs>,
    base_path: PathBuf,
    export_path: PathBuf,
    save: bool,
    adapter: Option<ProviderAdapter>,
    renderer: Arc<dyn Renderer>,
    notifier: Arc<dyn Notifier>,
    named: NamedArrayFields,
}

impl Generator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        def: ClusterDefinition,
        images: Arc<ImageResourceDefs>,
        base_path: impl Into<PathBuf>,
        output_path: &Path,
        save: bool,
        adapter: Option<ProviderAdapter>,
        renderer: Arc<dyn Renderer>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let export_path = output_path.join(def.name());
        Self {
            def,
            images,
            base_path: base_path.into(),
            export_path,
            save,
            adapter,
            renderer,
            notifier,
            named: NamedArrayFields::default(),
        }
    }

    /// Process every resource of the cluster definition: build its local
    /// configuration, then render, copy or skip its files as declared.
    pub async fn process(&self) -> Result<(), GenerateError> {
        self.notifier
            .info(&format!("calling process for {}", self.def.name()));
        fs::create_dir_all(&self.export_path).map_err(|e| {
            io_err(
                format!("creating cluster directory {}", self.export_path.display()),
                e,
            )
        })?;
        let Some(resources) = self.def.resources() else {
            self.notifier
                .warn(&format!("cluster {} declares no resources", self.def.name()));
            return Ok(());
        };
        for (resource_name, doc) in resources {
            let resource = Resource::new(doc);
            if resource.disabled() {
                self.notifier
                    .warn(&format!("resource {resource_name} is disabled, skipping..."));
                continue;
            }
            self.notifier.info(&format!(
                "creating local config for resource {resource_name}"
            ));
            let local = self.build_local_config(resource_name, doc).await?;
            counter!("local_configs_built", 1u64);
            if let Some(file) = resource.file() {
                self.notifier
                    .info(&format!("processing resource {resource_name}"));
                match Path::new(file).extension().and_then(|e| e.to_str()) {
                    // plain YAML needs no processing, copy it through
                    Some("yaml") => self.copy_resource(file)?,
                    Some("mustache") => self.render_resource(file, &local)?,
                    other => {
                        return Err(GenerateError::UnknownFileType(
                            other.unwrap_or("<none>").to_string(),
                        ))
                    }
                }
            }
            if let Some(svc) = resource.svc() {
                self.process_service(svc, &local)?;
            }
        }
        Ok(())
    }

    /// Assemble the local configuration for one resource: a deep clone of the
    /// cluster's default config with resource- and container-specific values
    /// resolved onto it.
    pub async fn build_local_config(
        &self,
        resource_name: &str,
        resource_doc: &Value,
    ) -> Result<Value, GenerateError> {
        let resource = Resource::new(resource_doc);
        let mut local: Map<String, Value> = match self.def.configuration() {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };

        // resource branch falls back to the cluster default
        if let Some(branch) = resource.branch().or_else(|| self.def.branch()) {
            local.insert("branch".into(), Value::String(branch.to_string()));
        }
        local.insert("name".into(), Value::String(resource_name.to_string()));

        let containers: Vec<(String, Value)> = match resource.containers() {
            Some(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            None => vec![(resource_name.to_string(), resource_doc.clone())],
        };

        for (container_name, mut artifact) in containers {
            if let Some(obj) = artifact.as_object_mut() {
                let unnamed = !obj
                    .get("name")
                    .and_then(Value::as_str)
                    .is_some_and(|n| !n.is_empty());
                if unnamed {
                    obj.insert("name".into(), Value::String(resource_name.to_string()));
                }
            }
            local.insert(container_name.clone(), artifact.clone());

            // externally fetched config wins over the artifact object-wide
            if let Some(adapter) = &self.adapter {
                let fetched = adapter
                    .fetch(&artifact, self.def.cluster_type(), self.def.name())
                    .await;
                local.insert(
                    container_name.clone(),
                    merge(&artifact, &fetched.into_value(), &self.named),
                );
            }

            // declared env entries win per name, provider-only names are kept
            if let Some(declared) = artifact.get("env") {
                let resolved = load_external_env(declared)?;
                let current: Vec<Value> = local
                    .get(&container_name)
                    .and_then(|c| c.get("env"))
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                let env = merge_envs(&current, &resolved);
                if let Some(container) = local.get_mut(&container_name).and_then(Value::as_object_mut)
                {
                    container.insert("env".into(), Value::Array(env));
                }
            }

            if let Some(tag) = artifact.get("image_tag").and_then(Value::as_str) {
                let branch = local
                    .get(&container_name)
                    .and_then(|c| c.get("branch"))
                    .and_then(Value::as_str)
                    .or_else(|| local.get("branch").and_then(Value::as_str))
                    .unwrap_or_default()
                    .to_string();
                let Some(spec) = self.images.lookup(tag, &branch) else {
                    self.notifier.warn(&format!(
                        "known branches for image {tag}: {:?}",
                        self.images.branches(tag)
                    ));
                    return Err(GenerateError::ImageNotFound {
                        tag: tag.to_string(),
                        branch,
                    });
                };
                let image = spec.image.clone();
                if let Some(container) = local.get_mut(&container_name).and_then(Value::as_object_mut)
                {
                    container.insert("image".into(), Value::String(image));
                }
            } else {
                let display = artifact
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or(resource_name);
                self.notifier
                    .warn(&format!("no image tag found for {display}"));
            }
        }

        if let Some(svc) = resource.svc() {
            local.insert("svc".into(), svc.clone());
        }

        let local = Value::Object(local);
        self.notifier.debug(&format!(
            "local configuration for {resource_name}: {local}"
        ));
        Ok(local)
    }

    fn copy_resource(&self, file: &str) -> Result<(), GenerateError> {
        let from = self.base_path.join(file);
        let file_name = Path::new(file)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.to_string());
        let to = self.export_path.join(&file_name);
        if !self.save {
            self.notifier
                .info(&format!("saving is disabled, skipping {file_name}"));
            return Ok(());
        }
        self.notifier.info(&format!(
            "copying file from {} to {}",
            from.display(),
            to.display()
        ));
        fs::copy(&from, &to)
            .map_err(|e| io_err(format!("copying {}", from.display()), e))?;
        Ok(())
    }

    fn render_resource(&self, file: &str, local: &Value) -> Result<(), GenerateError> {
        let path = self.base_path.join(file);
        let template = fs::read_to_string(&path)
            .map_err(|e| io_err(format!("reading template {}", path.display()), e))?;
        let rendered =
            self.renderer
                .render(&template, local)
                .map_err(|e| GenerateError::Render {
                    path: file.to_string(),
                    message: format!("{e:#}"),
                })?;
        let stem = Path::new(file)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.to_string());
        if self.save {
            deploymentizer_loader::save_resource_file(&self.export_path, &stem, &rendered)
                .map_err(|e| GenerateError::Save {
                    path: file.to_string(),
                    message: format!("{e:#}"),
                })?;
        } else {
            self.notifier
                .info(&format!("saving is disabled, skipping {stem}"));
        }
        Ok(())
    }

    /// Render the shared service template with the resource's local config.
    /// The service is shared across all containers of the resource.
    fn process_service(&self, svc: &Value, local: &Value) -> Result<(), GenerateError> {
        let name = svc
            .get("name")
            .and_then(Value::as_str)
            .ok_or(GenerateError::MissingServiceName)?;
        self.notifier.info(&format!("processing service {name}"));
        let path = self.base_path.join("base-svc.mustache");
        let template = fs::read_to_string(&path)
            .map_err(|e| io_err(format!("reading template {}", path.display()), e))?;
        let rendered =
            self.renderer
                .render(&template, local)
                .map_err(|e| GenerateError::Render {
                    path: "base-svc.mustache".to_string(),
                    message: format!("{e:#}"),
                })?;
        if self.save {
            deploymentizer_loader::save_resource_file(&self.export_path, name, &rendered)
                .map_err(|e| GenerateError::Save {
                    path: "base-svc.mustache".to_string(),
                    message: format!("{e:#}"),
                })?;
        } else {
            self.notifier
                .info(&format!("saving is disabled, skipping {name}"));
        }
        Ok(())
    }
}
