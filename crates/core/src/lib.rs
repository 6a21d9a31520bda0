//! Core document model for the deploymentizer pipeline.
//!
//! Configuration documents are plain `serde_json::Value` trees parsed from
//! YAML; this crate gives them their identities (document kinds), the layered
//! [`ClusterDefinition::apply`] operation, the read-only image lookup table
//! and the event notifier used across the pipeline.

#![forbid(unsafe_code)]

mod definition;
mod images;
mod notify;
mod resource;

pub use definition::{ClusterDefinition, DefinitionError, DocKind};
pub use images::{ImageResourceDefs, ImageSpec};
pub use notify::{CapturingNotifier, Level, Notifier, TracingNotifier};
pub use resource::{EnvEntry, Resource};
