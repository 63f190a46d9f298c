//! Cache-check strategies
//!
//! One contract, two implementations: [`sequential`] walks the ordered
//! service list one at a time; [`parallel`] runs one worker per service,
//! synchronized only by per-service completion signals. Both produce the
//! same hit/miss partition for the same inputs; they differ in wall-clock
//! cost and in when registry calls happen.

pub mod parallel;
pub mod sequential;

pub use parallel::ParallelCheckStrategy;
pub use sequential::SequentialCheckStrategy;

use crate::cache::{CacheProbe, Cloner};
use crate::config::StrategyKind;
use crate::envvars::EnvVarPublisher;
use crate::error::{FrescoError, FrescoResult};
use crate::hasher::ServiceHasher;
use crate::manifest::{BuildManifest, BuildSpec};
use crate::registry::{ImageTagger, RegistryError};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Decides which services are cache hits and which must be rebuilt
///
/// `ordered_services` is assumed already topologically sorted, dependencies
/// before dependents. The returned lists are a total partition of the input
/// in its original order.
#[async_trait]
pub trait CheckStrategy: Send + Sync {
    /// Partition services into (cached, not cached)
    ///
    /// Cache hits are cloned into the developer namespace and published; a
    /// clone failure aborts the whole call. An individual miss is never an
    /// error.
    async fn check_services_cache(
        &self,
        manifest_name: &str,
        manifest: &BuildManifest,
        ordered_services: &[String],
    ) -> FrescoResult<(Vec<String>, Vec<String>)>;

    /// Promote previously-probed cache hits into the developer namespace
    async fn clone_global_images_to_dev(
        &self,
        manifest_name: &str,
        manifest: &BuildManifest,
        services: &[String],
    ) -> FrescoResult<()>;

    /// Resolve the digest reference used to deploy a service
    async fn get_image_digest_reference_for_service_deploy(
        &self,
        manifest_name: &str,
        service: &str,
        spec: &BuildSpec,
    ) -> FrescoResult<String>;
}

/// Select the configured strategy implementation
pub(crate) fn create_strategy(kind: StrategyKind, deps: StrategyDeps) -> Box<dyn CheckStrategy> {
    match kind {
        StrategyKind::Sequential => Box::new(SequentialCheckStrategy::new(deps)),
        StrategyKind::Parallel => Box::new(ParallelCheckStrategy::new(deps)),
    }
}

/// Collaborators shared by both strategy implementations
pub(crate) struct StrategyDeps {
    pub hasher: Arc<ServiceHasher>,
    pub probe: Arc<CacheProbe>,
    pub cloner: Arc<Cloner>,
    pub tagger: Arc<dyn ImageTagger>,
    pub publisher: Arc<dyn EnvVarPublisher>,
}

impl StrategyDeps {
    /// The dev-side reference a cache hit should end up at
    fn dev_image_for(&self, manifest_name: &str, service: &str, spec: &BuildSpec) -> String {
        if spec.has_dockerfile() && spec.image.is_none() {
            return self
                .tagger
                .references_for_deploy(manifest_name, service)
                .first()
                .cloned()
                .unwrap_or_default();
        }
        spec.image_ref().to_string()
    }

    /// Clone a hit into the dev namespace and publish its components
    pub(crate) async fn clone_and_publish(
        &self,
        manifest_name: &str,
        service: &str,
        spec: &BuildSpec,
        cached_image: &str,
    ) -> FrescoResult<String> {
        let dev_image = self.dev_image_for(manifest_name, service, spec);
        let reference = self
            .cloner
            .clone_global_image_to_dev(cached_image, &dev_image)
            .await
            .map_err(|e| FrescoError::clone_failed(service, e))?;
        self.publisher.publish(service, &reference);
        Ok(reference)
    }

    /// Clone every listed service's recorded hit; used by the clone stage
    pub(crate) async fn clone_services_from_cache(
        &self,
        manifest_name: &str,
        manifest: &BuildManifest,
        services: &[String],
    ) -> FrescoResult<()> {
        let mut skipped = 0usize;
        for service in services {
            let spec = manifest
                .get(service)
                .ok_or_else(|| FrescoError::ServiceNotFound(service.clone()))?;
            let cached_image = self
                .probe
                .get_from_cache(service)
                .ok_or_else(|| FrescoError::ImageNotInCache(service.clone()))?;
            self.clone_and_publish(manifest_name, service, spec, &cached_image)
                .await?;
            skipped += 1;
        }
        if skipped > 0 {
            info!("skipping build of {skipped} service(s) already built from cache");
        }
        Ok(())
    }

    /// Resolve the deploy-time digest reference for a service
    pub(crate) async fn digest_reference_for_deploy(
        &self,
        manifest_name: &str,
        service: &str,
        spec: &BuildSpec,
    ) -> FrescoResult<String> {
        let candidates = if spec.has_dockerfile() && spec.image.is_none() {
            self.tagger.references_for_deploy(manifest_name, service)
        } else if spec.image.is_some() {
            vec![spec.image_ref().to_string()]
        } else {
            Vec::new()
        };

        for candidate in &candidates {
            match self.probe.lookup_reference_with_digest(candidate).await {
                Ok(with_digest) => return Ok(with_digest),
                Err(RegistryError::NotFound) => continue,
                Err(e) => return Err(FrescoError::registry_check(candidate, e)),
            }
        }
        Err(FrescoError::ImagesNotFound(candidates.join(", ")))
    }
}
