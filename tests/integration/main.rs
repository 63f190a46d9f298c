//! Integration tests for Fresco
//!
//! Wires a [`CacheController`] over in-memory collaborators and drives the
//! full check / clone / deploy flow through the public facade.

use async_trait::async_trait;
use fresco::config::{CacheConfig, HashMode, StrategyKind};
use fresco::envvars::EnvVarPublisher;
use fresco::manifest::{BuildManifest, BuildSpec};
use fresco::registry::{RegistryClient, RegistryError, RegistryLayout};
use fresco::repo::RepositorySignals;
use fresco::{CacheController, FrescoResult};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

struct FakeRegistry {
    existing_prefixes: Vec<String>,
    lookups: Mutex<Vec<String>>,
    copies: Mutex<Vec<(String, String)>>,
}

impl FakeRegistry {
    fn with_prefixes(prefixes: &[String]) -> Self {
        Self {
            existing_prefixes: prefixes.to_vec(),
            lookups: Mutex::new(Vec::new()),
            copies: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl RegistryClient for FakeRegistry {
    async fn resolve_digest(&self, reference: &str) -> Result<String, RegistryError> {
        self.lookups.lock().unwrap().push(reference.to_string());
        if self
            .existing_prefixes
            .iter()
            .any(|p| reference.starts_with(p.as_str()))
        {
            Ok(format!("{reference}@sha256:feedface"))
        } else {
            Err(RegistryError::NotFound)
        }
    }

    async fn copy(&self, source: &str, dest: &str) -> Result<String, RegistryError> {
        self.copies
            .lock()
            .unwrap()
            .push((source.to_string(), dest.to_string()));
        Ok(dest.to_string())
    }
}

struct FakeRepo;

impl RepositorySignals for FakeRepo {
    fn current_commit(&self) -> FrescoResult<String> {
        Ok("commit-1".to_string())
    }

    fn latest_change_signal(&self, _path: &Path) -> FrescoResult<String> {
        Ok("change-1".to_string())
    }

    fn local_diff_signal(&self, _path: &Path) -> FrescoResult<String> {
        Ok("diff-1".to_string())
    }
}

#[derive(Default)]
struct RecordingPublisher {
    published: Mutex<Vec<(String, String)>>,
}

impl EnvVarPublisher for RecordingPublisher {
    fn publish(&self, service: &str, reference: &str) {
        self.published
            .lock()
            .unwrap()
            .push((service.to_string(), reference.to_string()));
    }
}

struct Harness {
    registry: Arc<FakeRegistry>,
    publisher: Arc<RecordingPublisher>,
    controller: CacheController,
}

fn harness(strategy: StrategyKind, hit_prefixes: &[String]) -> Harness {
    let registry = Arc::new(FakeRegistry::with_prefixes(hit_prefixes));
    let publisher = Arc::new(RecordingPublisher::default());
    let config = CacheConfig {
        enabled: true,
        mode: HashMode::Context,
        strategy,
    };
    let controller = CacheController::new(
        &config,
        RegistryLayout::new("registry.test", "cindy", "global"),
        Arc::new(FakeRepo),
        Arc::clone(&registry) as Arc<dyn RegistryClient>,
        Arc::clone(&publisher) as Arc<dyn EnvVarPublisher>,
        PathBuf::from("/work"),
    );
    Harness {
        registry,
        publisher,
        controller,
    }
}

fn manifest(edges: &[(&str, &[&str])]) -> BuildManifest {
    edges
        .iter()
        .map(|(name, deps)| {
            let spec = BuildSpec {
                context: name.to_string(),
                dockerfile: "Dockerfile".to_string(),
                depends_on: deps.iter().map(|d| d.to_string()).collect(),
                ..Default::default()
            };
            (name.to_string(), spec)
        })
        .collect()
}

fn services(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn dev_prefix(service: &str) -> String {
    format!("registry.test/cindy/shop-{service}:")
}

fn global_prefix(service: &str) -> String {
    format!("registry.test/global/shop-{service}:")
}

#[tokio::test]
async fn check_partitions_and_propagates_misses() {
    // api hits; db misses, so worker is invalidated without a probe
    let h = harness(StrategyKind::Sequential, &[dev_prefix("api")]);
    let manifest = manifest(&[("db", &[]), ("api", &[]), ("worker", &["db"])]);

    let (cached, not_cached) = h
        .controller
        .check_services_cache("shop", &manifest, &services(&["db", "api", "worker"]))
        .await
        .unwrap();

    assert_eq!(cached, services(&["api"]));
    assert_eq!(not_cached, services(&["db", "worker"]));
    assert!(!h
        .registry
        .lookups
        .lock()
        .unwrap()
        .iter()
        .any(|r| r.contains("shop-worker")));
}

#[tokio::test]
async fn global_hit_is_promoted_and_published() {
    let h = harness(StrategyKind::Sequential, &[global_prefix("api")]);
    let manifest = manifest(&[("api", &[])]);

    let (cached, _) = h
        .controller
        .check_services_cache("shop", &manifest, &services(&["api"]))
        .await
        .unwrap();

    assert_eq!(cached, services(&["api"]));
    let copies = h.registry.copies.lock().unwrap();
    assert_eq!(copies.len(), 1);
    assert!(copies[0].0.starts_with("registry.test/global/shop-api:"));

    let published = h.publisher.published.lock().unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, "api");
}

#[tokio::test]
async fn clone_stage_reuses_recorded_hits() {
    let h = harness(StrategyKind::Sequential, &[global_prefix("api")]);
    let manifest = manifest(&[("api", &[])]);

    h.controller
        .check_services_cache("shop", &manifest, &services(&["api"]))
        .await
        .unwrap();
    h.controller
        .clone_global_images_to_dev("shop", &manifest, &services(&["api"]))
        .await
        .unwrap();

    assert_eq!(h.registry.copies.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn deploy_reference_carries_digest() {
    let h = harness(StrategyKind::Sequential, &[dev_prefix("api")]);
    let manifest = manifest(&[("api", &[])]);
    let spec = &manifest["api"];

    let reference = h
        .controller
        .get_image_digest_reference_for_service_deploy("shop", "api", spec)
        .await
        .unwrap();

    assert_eq!(reference, "registry.test/cindy/shop-api:dev@sha256:feedface");
}

#[tokio::test]
async fn parallel_strategy_behaves_like_sequential() {
    let hits = [dev_prefix("api"), dev_prefix("docs")];
    let manifest_edges: &[(&str, &[&str])] = &[
        ("db", &[]),
        ("api", &[]),
        ("worker", &["db"]),
        ("docs", &[]),
    ];
    let order = services(&["db", "api", "worker", "docs"]);

    let seq = harness(StrategyKind::Sequential, &hits);
    let par = harness(StrategyKind::Parallel, &hits);

    let seq_result = seq
        .controller
        .check_services_cache("shop", &manifest(manifest_edges), &order)
        .await
        .unwrap();
    let par_result = par
        .controller
        .check_services_cache("shop", &manifest(manifest_edges), &order)
        .await
        .unwrap();

    assert_eq!(seq_result, par_result);
    assert_eq!(seq_result.0, services(&["api", "docs"]));
}

#[tokio::test]
async fn disabled_config_is_visible_to_callers() {
    let registry = Arc::new(FakeRegistry::with_prefixes(&[]));
    let config = CacheConfig {
        enabled: false,
        mode: HashMode::Context,
        strategy: StrategyKind::Sequential,
    };
    let controller = CacheController::new(
        &config,
        RegistryLayout::new("registry.test", "cindy", "global"),
        Arc::new(FakeRepo),
        registry as Arc<dyn RegistryClient>,
        Arc::new(RecordingPublisher::default()) as Arc<dyn EnvVarPublisher>,
        PathBuf::from("/work"),
    );

    assert!(!controller.is_enabled());
}

#[tokio::test]
async fn build_hash_is_stable_within_a_run() {
    let h = harness(StrategyKind::Sequential, &[]);
    let manifest = manifest(&[("api", &[])]);
    let spec = &manifest["api"];

    let first = h.controller.get_build_hash(spec, "api");
    let second = h.controller.get_build_hash(spec, "api");

    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[tokio::test]
async fn project_hash_reflects_the_commit() {
    let h = harness(StrategyKind::Sequential, &[]);
    let manifest = manifest(&[("api", &[])]);

    let hash = h.controller.get_project_hash(&manifest["api"]).unwrap();
    assert_eq!(hash.len(), 64);
}
