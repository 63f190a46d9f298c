//! Publication of resolved image references as build variables
//!
//! When a service's image is resolved from cache, its reference components
//! are published so later manifest stages (and the builder) can substitute
//! them. Publication is one-way and write-once per service per run; the
//! engine never reads the values back.

use crate::registry::{Reference, DEFAULT_IMAGE_TAG};
use tracing::{debug, warn};

/// One-way sink for resolved reference components
pub trait EnvVarPublisher: Send + Sync {
    /// Publish the components of `reference` for `service`
    fn publish(&self, service: &str, reference: &str);
}

/// Publishes `FRESCO_BUILD_<SERVICE>_*` process environment variables
#[derive(Debug, Default)]
pub struct ProcessEnvPublisher;

impl ProcessEnvPublisher {
    pub fn new() -> Self {
        Self
    }
}

impl EnvVarPublisher for ProcessEnvPublisher {
    fn publish(&self, service: &str, reference: &str) {
        let parsed = match Reference::parse(reference) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("not publishing build variables for {service}: {e}");
                return;
            }
        };

        let tag = parsed.identifier().to_string();
        let sha = match &parsed.digest {
            Some(digest) => format!("{DEFAULT_IMAGE_TAG}@{digest}"),
            None => tag.clone(),
        };

        let key = service.to_uppercase().replace('-', "_");
        std::env::set_var(format!("FRESCO_BUILD_{key}_REGISTRY"), &parsed.registry);
        std::env::set_var(format!("FRESCO_BUILD_{key}_REPOSITORY"), &parsed.repository);
        std::env::set_var(format!("FRESCO_BUILD_{key}_IMAGE"), reference);
        std::env::set_var(format!("FRESCO_BUILD_{key}_TAG"), &tag);
        std::env::set_var(format!("FRESCO_BUILD_{key}_SHA"), &sha);

        debug!("published build variables for service {service}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn env(service: &str, suffix: &str) -> Option<String> {
        std::env::var(format!("FRESCO_BUILD_{service}_{suffix}")).ok()
    }

    fn clear(service: &str) {
        for suffix in ["REGISTRY", "REPOSITORY", "IMAGE", "TAG", "SHA"] {
            std::env::remove_var(format!("FRESCO_BUILD_{service}_{suffix}"));
        }
    }

    #[test]
    #[serial]
    fn publishes_digest_reference_components() {
        clear("FRONTEND");
        let publisher = ProcessEnvPublisher::new();
        publisher.publish(
            "frontend",
            "registry.url/namespace/frontend@sha256:7075f109",
        );

        assert_eq!(env("FRONTEND", "REGISTRY").as_deref(), Some("registry.url"));
        assert_eq!(
            env("FRONTEND", "REPOSITORY").as_deref(),
            Some("namespace/frontend")
        );
        assert_eq!(
            env("FRONTEND", "IMAGE").as_deref(),
            Some("registry.url/namespace/frontend@sha256:7075f109")
        );
        assert_eq!(env("FRONTEND", "TAG").as_deref(), Some("sha256:7075f109"));
        assert_eq!(env("FRONTEND", "SHA").as_deref(), Some("dev@sha256:7075f109"));
        clear("FRONTEND");
    }

    #[test]
    #[serial]
    fn publishes_latest_for_bare_reference() {
        clear("FRONTEND");
        let publisher = ProcessEnvPublisher::new();
        publisher.publish("frontend", "registry.url/namespace/frontend");

        assert_eq!(env("FRONTEND", "TAG").as_deref(), Some("latest"));
        assert_eq!(env("FRONTEND", "SHA").as_deref(), Some("latest"));
        clear("FRONTEND");
    }

    #[test]
    #[serial]
    fn service_name_is_uppercased_and_underscored() {
        clear("MY_API");
        let publisher = ProcessEnvPublisher::new();
        publisher.publish("my-api", "registry.url/ns/my-api:v1");

        assert_eq!(env("MY_API", "TAG").as_deref(), Some("v1"));
        clear("MY_API");
    }

    #[test]
    #[serial]
    fn invalid_reference_publishes_nothing() {
        clear("BROKEN");
        let publisher = ProcessEnvPublisher::new();
        publisher.publish("broken", "");

        assert_eq!(env("BROKEN", "IMAGE"), None);
    }
}
