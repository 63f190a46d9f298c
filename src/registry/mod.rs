//! Registry client contract and registry namespace layout
//!
//! The engine never talks to a registry directly; it consumes the
//! [`RegistryClient`] trait. The only thing it knows about registry
//! topology is the [`RegistryLayout`]: one registry host with a
//! per-developer namespace and a shared global namespace that promoted
//! images are cloned from.

pub mod reference;
pub mod tagger;

pub use reference::Reference;
pub use tagger::{DefaultTagger, ImageTagger, DEFAULT_IMAGE_TAG};

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a registry client
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The reference does not exist in the registry. Expected during cache
    /// probing and never treated as a failure.
    #[error("reference not found")]
    NotFound,

    #[error("{0}")]
    Other(String),
}

impl RegistryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// Abstract image registry operations
///
/// Implemented by the CLI against the real registry API; the engine only
/// resolves digests and copies references between namespaces.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Resolve a reference to its `[name]@sha256:[digest]` form
    async fn resolve_digest(&self, reference: &str) -> Result<String, RegistryError>;

    /// Copy an image from one reference to another, returning the destination
    async fn copy(&self, source: &str, dest: &str) -> Result<String, RegistryError>;
}

/// Registry host plus the two namespaces the engine cares about
#[derive(Debug, Clone)]
pub struct RegistryLayout {
    registry_url: String,
    namespace: String,
    global_namespace: String,
}

impl RegistryLayout {
    pub fn new(
        registry_url: impl Into<String>,
        namespace: impl Into<String>,
        global_namespace: impl Into<String>,
    ) -> Self {
        Self {
            registry_url: registry_url.into(),
            namespace: namespace.into(),
            global_namespace: global_namespace.into(),
        }
    }

    pub fn registry_url(&self) -> &str {
        &self.registry_url
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn global_namespace(&self) -> &str {
        &self.global_namespace
    }

    /// Whether the reference lives in the shared global namespace
    pub fn is_global(&self, reference: &str) -> bool {
        reference.starts_with(&format!(
            "{}/{}/",
            self.registry_url, self.global_namespace
        ))
    }

    /// Whether the reference lives in the developer's namespace
    pub fn is_dev(&self, reference: &str) -> bool {
        reference.starts_with(&format!("{}/{}/", self.registry_url, self.namespace))
    }

    /// Rewrite a global reference into the developer's namespace
    ///
    /// References outside the global namespace are returned unchanged.
    pub fn dev_from_global(&self, reference: &str) -> String {
        let global_prefix = format!("{}/{}/", self.registry_url, self.global_namespace);
        match reference.strip_prefix(&global_prefix) {
            Some(rest) => format!("{}/{}/{}", self.registry_url, self.namespace, rest),
            None => reference.to_string(),
        }
    }
}
