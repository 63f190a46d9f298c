//! Sequential cache-check strategy
//!
//! Walks the ordered service list one at a time. When a service misses,
//! every service that transitively depends on it is marked as a miss up
//! front and skipped when the walk reaches it, so no hash is computed and
//! no registry call is made for a dependent whose cache is already known
//! to be invalid.

use crate::error::{FrescoError, FrescoResult};
use crate::manifest::{BuildManifest, BuildSpec, DependencyMap};
use crate::strategy::{CheckStrategy, StrategyDeps};
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::{debug, info};

pub struct SequentialCheckStrategy {
    deps: StrategyDeps,
}

impl SequentialCheckStrategy {
    pub(crate) fn new(deps: StrategyDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl CheckStrategy for SequentialCheckStrategy {
    async fn check_services_cache(
        &self,
        manifest_name: &str,
        manifest: &BuildManifest,
        ordered_services: &[String],
    ) -> FrescoResult<(Vec<String>, Vec<String>)> {
        let dependency_map = DependencyMap::new(manifest)?;

        // Services forced to miss because something upstream missed
        let mut forced_misses: HashSet<String> = HashSet::new();
        let mut cached = Vec::new();
        let mut not_cached = Vec::new();

        for service in ordered_services {
            if forced_misses.contains(service) {
                debug!("{service} invalidated by an upstream miss, skipping probe");
                not_cached.push(service.clone());
                continue;
            }

            let spec = manifest
                .get(service)
                .ok_or_else(|| FrescoError::ServiceNotFound(service.clone()))?;

            let build_hash = self.deps.hasher.build_hash(spec, service);
            let (hit, _) = self
                .deps
                .probe
                .is_cached(manifest_name, spec.image_ref(), &build_hash, service)
                .await;

            if hit {
                let cached_image = self
                    .deps
                    .probe
                    .get_from_cache(service)
                    .ok_or_else(|| FrescoError::ImageNotInCache(service.clone()))?;
                self.deps
                    .clone_and_publish(manifest_name, service, spec, &cached_image)
                    .await?;
                cached.push(service.clone());
            } else {
                not_cached.push(service.clone());
                mark_dependents(&dependency_map, service, &mut forced_misses);
            }
        }

        if !cached.is_empty() {
            info!(
                "skipping build of {} service(s) already built from cache: [{}]",
                cached.len(),
                cached.join(", ")
            );
        }
        Ok((cached, not_cached))
    }

    async fn clone_global_images_to_dev(
        &self,
        manifest_name: &str,
        manifest: &BuildManifest,
        services: &[String],
    ) -> FrescoResult<()> {
        self.deps
            .clone_services_from_cache(manifest_name, manifest, services)
            .await
    }

    async fn get_image_digest_reference_for_service_deploy(
        &self,
        manifest_name: &str,
        service: &str,
        spec: &BuildSpec,
    ) -> FrescoResult<String> {
        self.deps
            .digest_reference_for_deploy(manifest_name, service, spec)
            .await
    }
}

// Worklist walk over the inverse adjacency; the visited set keeps diamond
// shapes from being walked twice
fn mark_dependents(map: &DependencyMap, service: &str, forced_misses: &mut HashSet<String>) {
    let mut stack: Vec<&str> = map.dependents_of(service).iter().map(String::as_str).collect();
    while let Some(dependent) = stack.pop() {
        if forced_misses.insert(dependent.to_string()) {
            stack.extend(map.dependents_of(dependent).iter().map(String::as_str));
        }
    }
}
