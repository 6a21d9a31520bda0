//! Orchestration pipeline: load definitions, layer them, generate manifests.

#![forbid(unsafe_code)]

use anyhow::{anyhow, Context, Result};
use deploymentizer_core::{ClusterDefinition, ImageResourceDefs, Notifier};
use deploymentizer_generate::{Generator, Renderer};
use deploymentizer_provider::ProviderAdapter;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Pipeline options, independent of CLI parsing.
#[derive(Debug, Clone)]
pub struct Options {
    pub load_path: PathBuf,
    pub output_path: PathBuf,
    pub save: bool,
    pub clean: bool,
}

/// Runs the whole pipeline: layering per cluster, then generation.
pub struct Deploymentizer {
    options: Options,
    adapter: Option<ProviderAdapter>,
    renderer: Arc<dyn Renderer>,
    notifier: Arc<dyn Notifier>,
}

impl Deploymentizer {
    pub fn new(
        options: Options,
        adapter: Option<ProviderAdapter>,
        renderer: Arc<dyn Renderer>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            options,
            adapter,
            renderer,
            notifier,
        }
    }

    /// Load everything, then process each cluster in turn. A failing cluster
    /// is reported and does not stop its siblings; the run as a whole fails
    /// if any cluster failed.
    pub async fn process(&self) -> Result<()> {
        self.notifier.info(&format!(
            "processing directory: {}",
            self.options.load_path.display()
        ));
        if self.options.clean && self.options.output_path.exists() {
            self.notifier.info(&format!(
                "cleaning: {}",
                self.options.output_path.display()
            ));
            std::fs::remove_dir_all(&self.options.output_path)
                .with_context(|| format!("cleaning {}", self.options.output_path.display()))?;
        }
        std::fs::create_dir_all(&self.options.output_path)
            .with_context(|| format!("creating {}", self.options.output_path.display()))?;

        let base = deploymentizer_loader::load_base_definitions(&self.options.load_path)?;
        self.notifier.info("loaded base cluster definition");
        let types = deploymentizer_loader::load_type_definitions(&self.options.load_path)?;
        let images = Arc::new(deploymentizer_loader::load_image_definitions(
            &self.options.load_path.join("images"),
        )?);
        let clusters = deploymentizer_loader::load_cluster_definitions(
            &self.options.load_path.join("clusters"),
        )?;

        let base_value = base.to_value();
        let mut failures = 0usize;
        for def in clusters {
            if def.disabled() {
                self.notifier
                    .info(&format!("cluster {} is disabled, skipping", def.name()));
                continue;
            }
            let name = def.name().to_string();
            if let Err(e) = self
                .process_cluster(def, &types, &base_value, images.clone())
                .await
            {
                failures += 1;
                self.notifier
                    .fatal(&format!("cluster {name} failed: {e:#}"));
            }
        }
        self.notifier.info("finished processing files");
        if failures > 0 {
            return Err(anyhow!("{failures} cluster(s) failed to generate"));
        }
        Ok(())
    }

    /// Layer one cluster definition (type defaults first, then the base
    /// definition; the cluster's own values always win) and generate its
    /// manifests.
    async fn process_cluster(
        &self,
        mut def: ClusterDefinition,
        types: &HashMap<String, Value>,
        base_value: &Value,
        images: Arc<ImageResourceDefs>,
    ) -> Result<()> {
        match def.cluster_type().map(str::to_owned) {
            Some(cluster_type) => {
                let type_def = types.get(&cluster_type).ok_or_else(|| {
                    anyhow!("unsupported type {cluster_type} for cluster {}", def.name())
                })?;
                def.apply(type_def)?;
            }
            None => self.notifier.warn(&format!(
                "no type configured for cluster {}, applying base only",
                def.name()
            )),
        }
        def.apply(base_value)?;
        self.notifier.info("done merging cluster definitions");

        let generator = Generator::new(
            def,
            images,
            self.options.load_path.clone(),
            &self.options.output_path,
            self.options.save,
            self.adapter.clone(),
            self.renderer.clone(),
            self.notifier.clone(),
        );
        generator.process().await?;
        Ok(())
    }
}
