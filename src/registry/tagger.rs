//! Tag synthesis for cache probing and deploy resolution
//!
//! Owns the naming scheme for engine-managed images:
//! `<registry>/<namespace>/<manifest>-<service>:<tag>`. Cache probing uses
//! the content hash as the tag; deploys use the fixed default tag.

use crate::registry::{Reference, RegistryLayout};

/// Tag applied to dev images when no content hash is involved
pub const DEFAULT_IMAGE_TAG: &str = "dev";

/// Synthesizes candidate references for a (manifest, service, tag) triple
pub trait ImageTagger: Send + Sync {
    /// Ordered candidate references to probe for the given tag.
    /// An empty tag yields no candidates.
    fn references_for_tag(&self, manifest_name: &str, service: &str, tag: &str) -> Vec<String>;

    /// Candidate references for deploy-time resolution
    fn references_for_deploy(&self, manifest_name: &str, service: &str) -> Vec<String>;

    /// Global-namespace form of an explicit dev image, tagged with the hash.
    /// `None` when the image does not live in the developer's namespace.
    fn global_tag_from_dev(&self, image: &str, build_hash: &str) -> Option<String>;
}

/// Default naming scheme over a [`RegistryLayout`]
#[derive(Debug, Clone)]
pub struct DefaultTagger {
    layout: RegistryLayout,
}

impl DefaultTagger {
    pub fn new(layout: RegistryLayout) -> Self {
        Self { layout }
    }

    fn reference(&self, namespace: &str, manifest_name: &str, service: &str, tag: &str) -> String {
        format!(
            "{}/{}/{}-{}:{}",
            self.layout.registry_url(),
            namespace,
            sanitize_name(manifest_name),
            service,
            tag
        )
    }
}

impl ImageTagger for DefaultTagger {
    fn references_for_tag(&self, manifest_name: &str, service: &str, tag: &str) -> Vec<String> {
        if tag.is_empty() {
            return Vec::new();
        }
        // Developer namespace first, shared global namespace second
        vec![
            self.reference(self.layout.namespace(), manifest_name, service, tag),
            self.reference(self.layout.global_namespace(), manifest_name, service, tag),
        ]
    }

    fn references_for_deploy(&self, manifest_name: &str, service: &str) -> Vec<String> {
        vec![self.reference(
            self.layout.namespace(),
            manifest_name,
            service,
            DEFAULT_IMAGE_TAG,
        )]
    }

    fn global_tag_from_dev(&self, image: &str, build_hash: &str) -> Option<String> {
        if build_hash.is_empty() {
            return None;
        }
        let reference = Reference::parse(image).ok()?;
        if reference.registry != self.layout.registry_url() {
            return None;
        }
        let prefix = format!("{}/", self.layout.namespace());
        let name = reference.repository.strip_prefix(&prefix)?;
        Some(format!(
            "{}/{}/{}:{}",
            self.layout.registry_url(),
            self.layout.global_namespace(),
            name,
            build_hash
        ))
    }
}

/// Restrict a manifest name to kubernetes metadata characters
fn sanitize_name(name: &str) -> String {
    let sanitized: String = name
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    sanitized.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagger() -> DefaultTagger {
        DefaultTagger::new(RegistryLayout::new("registry.test", "cindy", "global"))
    }

    #[test]
    fn references_for_tag_dev_then_global() {
        let refs = tagger().references_for_tag("shop", "api", "abc123");
        assert_eq!(
            refs,
            vec![
                "registry.test/cindy/shop-api:abc123",
                "registry.test/global/shop-api:abc123",
            ]
        );
    }

    #[test]
    fn references_for_empty_tag() {
        assert!(tagger().references_for_tag("shop", "api", "").is_empty());
    }

    #[test]
    fn references_for_deploy_uses_default_tag() {
        let refs = tagger().references_for_deploy("shop", "api");
        assert_eq!(refs, vec!["registry.test/cindy/shop-api:dev"]);
    }

    #[test]
    fn deploy_reference_sanitizes_manifest_name() {
        let refs = tagger().references_for_deploy("My Shop!", "api");
        assert_eq!(refs, vec!["registry.test/cindy/my-shop-api:dev"]);
    }

    #[test]
    fn global_tag_from_dev_image() {
        let t = tagger();
        assert_eq!(
            t.global_tag_from_dev("registry.test/cindy/api:v1", "hash123"),
            Some("registry.test/global/api:hash123".to_string())
        );
    }

    #[test]
    fn global_tag_from_foreign_image_is_none() {
        let t = tagger();
        assert_eq!(t.global_tag_from_dev("docker.io/library/alpine:3", "h"), None);
        assert_eq!(t.global_tag_from_dev("registry.test/other/api:v1", "h"), None);
    }

    #[test]
    fn global_tag_with_empty_hash_is_none() {
        assert_eq!(tagger().global_tag_from_dev("registry.test/cindy/api:v1", ""), None);
    }
}
