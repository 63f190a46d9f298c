//! Engine facade
//!
//! [`CacheController`] wires the hasher, probe, cloner, tagger and the
//! configured check strategy together and is the only type callers need.

use crate::cache::{CacheProbe, Cloner};
use crate::config::CacheConfig;
use crate::envvars::EnvVarPublisher;
use crate::error::FrescoResult;
use crate::hasher::ServiceHasher;
use crate::manifest::{BuildManifest, BuildSpec};
use crate::registry::{DefaultTagger, ImageTagger, RegistryClient, RegistryLayout};
use crate::repo::RepositorySignals;
use crate::strategy::{create_strategy, CheckStrategy, StrategyDeps};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

pub struct CacheController {
    enabled: bool,
    hasher: Arc<ServiceHasher>,
    strategy: Box<dyn CheckStrategy>,
}

impl CacheController {
    /// Build a controller from configuration and the external collaborators
    /// it cannot own: the repository, the registry client and the variable
    /// publisher.
    pub fn new(
        config: &CacheConfig,
        layout: RegistryLayout,
        repo: Arc<dyn RepositorySignals>,
        registry: Arc<dyn RegistryClient>,
        publisher: Arc<dyn EnvVarPublisher>,
        working_dir: PathBuf,
    ) -> Self {
        let tagger: Arc<dyn ImageTagger> = Arc::new(DefaultTagger::new(layout.clone()));
        let hasher = Arc::new(ServiceHasher::new(repo, config.mode, working_dir));
        let probe = Arc::new(CacheProbe::new(Arc::clone(&tagger), Arc::clone(&registry)));
        let cloner = Arc::new(Cloner::new(registry, layout));

        debug!(
            "smart build cache: enabled={} mode={:?} strategy={:?}",
            config.enabled, config.mode, config.strategy
        );
        let strategy = create_strategy(
            config.strategy,
            StrategyDeps {
                hasher: Arc::clone(&hasher),
                probe,
                cloner,
                tagger,
                publisher,
            },
        );

        Self {
            enabled: config.enabled,
            hasher,
            strategy,
        }
    }

    /// Whether the cache engine is turned on at all
    ///
    /// Callers are expected to skip every other method when this is false.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Hash of the repository state shared by every service this run
    pub fn get_project_hash(&self, spec: &BuildSpec) -> FrescoResult<String> {
        self.hasher.hash_project_commit(spec)
    }

    /// Hash of the inputs of one service's build, in the configured mode
    ///
    /// An empty hash means the inputs could not be determined; the probe
    /// treats it as a guaranteed miss.
    pub fn get_build_hash(&self, spec: &BuildSpec, service: &str) -> String {
        self.hasher.build_hash(spec, service)
    }

    /// Partition services into cache hits and services needing a rebuild
    pub async fn check_services_cache(
        &self,
        manifest_name: &str,
        manifest: &BuildManifest,
        ordered_services: &[String],
    ) -> FrescoResult<(Vec<String>, Vec<String>)> {
        self.strategy
            .check_services_cache(manifest_name, manifest, ordered_services)
            .await
    }

    /// Promote previously-found cache hits into the developer namespace
    pub async fn clone_global_images_to_dev(
        &self,
        manifest_name: &str,
        manifest: &BuildManifest,
        services: &[String],
    ) -> FrescoResult<()> {
        self.strategy
            .clone_global_images_to_dev(manifest_name, manifest, services)
            .await
    }

    /// Resolve the digest reference a service should be deployed from
    pub async fn get_image_digest_reference_for_service_deploy(
        &self,
        manifest_name: &str,
        service: &str,
        spec: &BuildSpec,
    ) -> FrescoResult<String> {
        self.strategy
            .get_image_digest_reference_for_service_deploy(manifest_name, service, spec)
            .await
    }
}
