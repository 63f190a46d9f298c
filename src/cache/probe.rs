//! Registry cache probing
//!
//! Resolves candidate references for a (service, hash) pair and checks
//! which of them already exist in the registry. Probing is deliberately
//! forgiving: a missing candidate is expected, and a degraded registry
//! answer only disqualifies that candidate. The probe prefers reporting a
//! miss (an extra rebuild) over a wrong hit.

use crate::registry::{ImageTagger, RegistryClient, RegistryError};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Checks whether a build hash is already backed by a registry image
pub struct CacheProbe {
    tagger: Arc<dyn ImageTagger>,
    registry: Arc<dyn RegistryClient>,

    // Hits observed this run, used later by the clone stage
    hits: RwLock<HashMap<String, String>>,
}

impl CacheProbe {
    pub fn new(tagger: Arc<dyn ImageTagger>, registry: Arc<dyn RegistryClient>) -> Self {
        Self {
            tagger,
            registry,
            hits: RwLock::new(HashMap::new()),
        }
    }

    /// Whether an image for the given hash already exists in the registry
    ///
    /// Returns the resolved `[name]@sha256:[digest]` reference on a hit.
    /// An empty hash means "do not attempt a lookup" and is an immediate
    /// miss with no registry call. Registry errors never escape: a failed
    /// candidate is skipped and the remaining ones are probed.
    pub async fn is_cached(
        &self,
        manifest_name: &str,
        image: &str,
        build_hash: &str,
        service: &str,
    ) -> (bool, String) {
        if build_hash.is_empty() {
            return (false, String::new());
        }

        let candidates = if image.is_empty() {
            self.tagger
                .references_for_tag(manifest_name, service, build_hash)
        } else {
            match self.tagger.global_tag_from_dev(image, build_hash) {
                Some(global_tag) => vec![global_tag],
                None => {
                    debug!("no global candidate for explicit image {image:?}");
                    return (false, String::new());
                }
            }
        };

        for candidate in candidates {
            match self.registry.resolve_digest(&candidate).await {
                Ok(with_digest) => {
                    info!("image {candidate} found");
                    if let Ok(mut hits) = self.hits.write() {
                        hits.insert(service.to_string(), with_digest.clone());
                    }
                    return (true, with_digest);
                }
                Err(RegistryError::NotFound) => continue,
                Err(e) => {
                    info!("could not check image {candidate}: {e}");
                    continue;
                }
            }
        }
        (false, String::new())
    }

    /// Direct digest lookup for a single reference
    ///
    /// Unlike [`is_cached`](Self::is_cached) this propagates registry
    /// errors, including not-found, so callers can distinguish them.
    pub async fn lookup_reference_with_digest(
        &self,
        reference: &str,
    ) -> Result<String, RegistryError> {
        self.registry.resolve_digest(reference).await
    }

    /// The hit recorded for a service earlier in this run, if any
    pub fn get_from_cache(&self, service: &str) -> Option<String> {
        self.hits
            .read()
            .ok()
            .and_then(|hits| hits.get(service).cloned())
    }
}
