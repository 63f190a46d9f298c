//! Concurrent cache-check strategy
//!
//! Runs one worker per service. A worker first waits for the completion
//! signal of each direct dependency; if any dependency missed, the worker
//! records its own miss immediately without hashing or touching the
//! registry. Signals are single-fire watch channels, so a service with
//! many dependents is still probed exactly once.

use crate::error::{FrescoError, FrescoResult};
use crate::manifest::{BuildManifest, BuildSpec, DependencyMap};
use crate::strategy::{CheckStrategy, StrategyDeps};
use async_trait::async_trait;
use futures_util::future::join_all;
use std::collections::HashMap;
use tokio::sync::watch;
use tracing::{debug, info};

pub struct ParallelCheckStrategy {
    deps: StrategyDeps,
}

impl ParallelCheckStrategy {
    pub(crate) fn new(deps: StrategyDeps) -> Self {
        Self { deps }
    }

    // Runs one service's check end to end. Fires the completion signal on
    // every path, including errors, so downstream workers never hang.
    async fn check_service(
        &self,
        manifest_name: &str,
        service: &str,
        spec: &BuildSpec,
        tx: watch::Sender<Option<bool>>,
        dep_signals: Vec<watch::Receiver<Option<bool>>>,
    ) -> FrescoResult<bool> {
        for mut rx in dep_signals {
            let dependency_hit = match rx.wait_for(|signal| signal.is_some()).await {
                Ok(signal) => signal.unwrap_or(false),
                // Sender gone without firing only happens when its worker
                // panicked; treat it as a miss
                Err(_) => false,
            };
            if !dependency_hit {
                debug!("{service} invalidated by an upstream miss, skipping probe");
                let _ = tx.send(Some(false));
                return Ok(false);
            }
        }

        let build_hash = self.deps.hasher.build_hash(spec, service);
        let (hit, _) = self
            .deps
            .probe
            .is_cached(manifest_name, spec.image_ref(), &build_hash, service)
            .await;

        if !hit {
            let _ = tx.send(Some(false));
            return Ok(false);
        }

        let cached_image = match self.deps.probe.get_from_cache(service) {
            Some(image) => image,
            None => {
                let _ = tx.send(Some(false));
                return Err(FrescoError::ImageNotInCache(service.to_string()));
            }
        };

        match self
            .deps
            .clone_and_publish(manifest_name, service, spec, &cached_image)
            .await
        {
            Ok(_) => {
                let _ = tx.send(Some(true));
                Ok(true)
            }
            Err(e) => {
                let _ = tx.send(Some(false));
                Err(e)
            }
        }
    }
}

#[async_trait]
impl CheckStrategy for ParallelCheckStrategy {
    async fn check_services_cache(
        &self,
        manifest_name: &str,
        manifest: &BuildManifest,
        ordered_services: &[String],
    ) -> FrescoResult<(Vec<String>, Vec<String>)> {
        // Rejecting cycles up front also guarantees the workers cannot
        // deadlock waiting on each other
        DependencyMap::new(manifest)?;

        let mut senders: HashMap<&str, watch::Sender<Option<bool>>> = HashMap::new();
        let mut receivers: HashMap<&str, watch::Receiver<Option<bool>>> = HashMap::new();
        for service in ordered_services {
            let (tx, rx) = watch::channel(None);
            senders.insert(service.as_str(), tx);
            receivers.insert(service.as_str(), rx);
        }

        let mut workers = Vec::with_capacity(ordered_services.len());
        for service in ordered_services {
            let spec = manifest
                .get(service)
                .ok_or_else(|| FrescoError::ServiceNotFound(service.clone()))?;
            let tx = senders
                .remove(service.as_str())
                .ok_or_else(|| FrescoError::Internal(format!("duplicate service {service}")))?;
            // Dependencies outside this run have no signal and impose no wait
            let dep_signals = spec
                .depends_on
                .iter()
                .filter_map(|d| receivers.get(d.as_str()).cloned())
                .collect();
            workers.push(self.check_service(manifest_name, service, spec, tx, dep_signals));
        }

        // join_all keeps results aligned with the input order
        let results = join_all(workers).await;

        let mut cached = Vec::new();
        let mut not_cached = Vec::new();
        for (service, result) in ordered_services.iter().zip(results) {
            match result? {
                true => cached.push(service.clone()),
                false => not_cached.push(service.clone()),
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
