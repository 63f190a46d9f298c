//! Inverse dependency map with cycle validation
//!
//! Built once per run from every spec's depends-on list and never mutated
//! afterwards. The engine uses it to force a rebuild of every service that
//! transitively depends on a cache miss without probing the registry again.

use crate::error::{FrescoError, FrescoResult};
use crate::manifest::BuildManifest;
use std::collections::HashMap;

/// Maps a service name to the services that directly depend on it
#[derive(Debug, Default)]
pub struct DependencyMap {
    dependents: HashMap<String, Vec<String>>,
}

impl DependencyMap {
    /// Build the inverse adjacency from a manifest
    ///
    /// Rejects unknown dependency names and cycles in the depends-on graph
    /// before any cache checking starts.
    pub fn new(manifest: &BuildManifest) -> FrescoResult<Self> {
        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();

        for (service, spec) in manifest {
            for dep in &spec.depends_on {
                if !manifest.contains_key(dep) {
                    return Err(FrescoError::UnknownDependency {
                        service: service.clone(),
                        dependency: dep.clone(),
                    });
                }
                dependents
                    .entry(dep.clone())
                    .or_default()
                    .push(service.clone());
            }
        }

        // Deterministic fan-out order regardless of manifest map iteration
        for deps in dependents.values_mut() {
            deps.sort();
        }

        let map = Self { dependents };
        map.check_acyclic(manifest)?;
        Ok(map)
    }

    /// Services that directly depend on the given one
    pub fn dependents_of(&self, service: &str) -> &[String] {
        self.dependents
            .get(service)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    // Iterative three-color DFS over the depends-on edges
    fn check_acyclic(&self, manifest: &BuildManifest) -> FrescoResult<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        let mut marks: HashMap<&str, Mark> = HashMap::new();

        for start in manifest.keys() {
            if marks.contains_key(start.as_str()) {
                continue;
            }
            // Stack of (service, next dependency index)
            let mut stack: Vec<(&str, usize)> = vec![(start.as_str(), 0)];
            marks.insert(start.as_str(), Mark::Visiting);

            while let Some((service, idx)) = stack.pop() {
                let deps = &manifest[service].depends_on;
                if idx < deps.len() {
                    stack.push((service, idx + 1));
                    let dep = deps[idx].as_str();
                    match marks.get(dep) {
                        Some(Mark::Visiting) => {
                            return Err(FrescoError::DependencyCycle {
                                service: dep.to_string(),
                            });
                        }
                        Some(Mark::Done) => {}
                        None => {
                            marks.insert(dep, Mark::Visiting);
                            stack.push((dep, 0));
                        }
                    }
                } else {
                    marks.insert(service, Mark::Done);
                }
            }
        }
        Ok(())
    }
}
