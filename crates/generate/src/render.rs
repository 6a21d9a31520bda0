//! Template rendering seam.

use regex::{Captures, Regex};
use serde_json::Value;

/// Renders a template against a fully resolved local configuration.
pub trait Renderer: Send + Sync {
    fn render(&self, template: &str, view: &Value) -> anyhow::Result<String>;
}

/// `{{path.to.field}}` interpolation over the local configuration document.
///
/// Scalars render as themselves, composites as compact JSON, missing paths as
/// the empty string (matching how the templates were authored).
pub struct VarRenderer {
    pattern: Regex,
}

impl Default for VarRenderer {
    fn default() -> Self {
        Self {
            pattern: Regex::new(r"\{\{\s*([A-Za-z0-9_\.\-]+)\s*\}\}").expect("template pattern"),
        }
    }
}

impl VarRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Renderer for VarRenderer {
    fn render(&self, template: &str, view: &Value) -> anyhow::Result<String> {
        let out = self.pattern.replace_all(template, |caps: &Captures<'_>| {
            render_path(view, &caps[1])
        });
        Ok(out.into_owned())
    }
}

fn render_path(view: &Value, path: &str) -> String {
    let mut current = view;
    for segment in path.split('.') {
        match current.get(segment) {
            Some(next) => current = next,
            None => return String::new(),
        }
    }
    match current {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        composite => composite.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn interpolates_nested_paths() {
        let view = json!({
            "name": "auth",
            "auth": { "image": "registry/auth:dev", "replicas": 2 }
        });
        let renderer = VarRenderer::new();
        let out = renderer
            .render("name: {{name}}\nimage: {{auth.image}}\nreplicas: {{auth.replicas}}\n", &view)
            .unwrap();
        assert_eq!(out, "name: auth\nimage: registry/auth:dev\nreplicas: 2\n");
    }

    #[test]
    fn missing_paths_render_empty() {
        let renderer = VarRenderer::new();
        let out = renderer.render("value: {{not.there}}!", &json!({})).unwrap();
        assert_eq!(out, "value: !");
    }
}
