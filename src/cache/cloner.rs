//! Promotion of shared-registry images into the developer namespace
//!
//! A cache hit found in the global registry is copied into the developer's
//! namespace so later deploy steps can pull it without global access.
//! References outside the global registry are already usable and pass
//! through untouched.

use crate::registry::{RegistryClient, RegistryError, RegistryLayout};
use std::sync::Arc;
use tracing::{debug, info};

/// Copies global images into the developer's registry namespace
pub struct Cloner {
    registry: Arc<dyn RegistryClient>,
    layout: RegistryLayout,
}

impl Cloner {
    pub fn new(registry: Arc<dyn RegistryClient>, layout: RegistryLayout) -> Self {
        Self { registry, layout }
    }

    /// Ensure the source image is usable from the developer's namespace
    ///
    /// Non-global sources are returned unchanged with no registry call.
    /// When `dest_hint` is empty the destination is derived from the source
    /// by rewriting its namespace.
    pub async fn clone_global_image_to_dev(
        &self,
        source: &str,
        dest_hint: &str,
    ) -> Result<String, RegistryError> {
        if !self.layout.is_global(source) {
            debug!("{source} is not a global image, skipping clone");
            return Ok(source.to_string());
        }

        let dest = if dest_hint.is_empty() {
            self.layout.dev_from_global(source)
        } else {
            dest_hint.to_string()
        };

        info!("cloning {source} to {dest}");
        self.registry.copy(source, &dest).await
    }
}
