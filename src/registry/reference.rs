//! Image reference decomposition
//!
//! Splits an image string into registry host, repository path, tag and
//! digest. Derived on demand, never stored: the engine passes references
//! around as strings and only decomposes them to publish build variables.

use crate::error::{FrescoError, FrescoResult};
use std::fmt;

/// Decomposed image reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub registry: String,
    pub repository: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

impl Reference {
    /// Parse a reference of the form `registry/repo/path[:tag][@sha256:digest]`
    ///
    /// The first path segment is treated as the registry host when it looks
    /// like one (contains a dot or a port, or is `localhost`); otherwise the
    /// whole path is the repository, as in bare Docker Hub references.
    pub fn parse(reference: &str) -> FrescoResult<Self> {
        if reference.is_empty() {
            return Err(FrescoError::InvalidReference(reference.to_string()));
        }

        let (remainder, digest) = match reference.split_once('@') {
            Some((rest, d)) => (rest, Some(d.to_string())),
            None => (reference, None),
        };

        let (registry, repo_and_tag) = match remainder.split_once('/') {
            Some((host, rest)) if looks_like_host(host) => (host.to_string(), rest),
            _ => (String::new(), remainder),
        };

        // A ':' after the last '/' separates the tag from the repository
        let (repository, tag) = match repo_and_tag.rsplit_once(':') {
            Some((repo, t)) if !t.contains('/') => (repo.to_string(), Some(t.to_string())),
            _ => (repo_and_tag.to_string(), None),
        };

        if repository.is_empty() {
            return Err(FrescoError::InvalidReference(reference.to_string()));
        }

        Ok(Self {
            registry,
            repository,
            tag,
            digest,
        })
    }

    /// The tag or digest identifying this reference, `latest` when bare
    pub fn identifier(&self) -> &str {
        if let Some(digest) = &self.digest {
            return digest;
        }
        self.tag.as_deref().unwrap_or("latest")
    }
}

fn looks_like_host(segment: &str) -> bool {
    segment == "localhost" || segment.contains('.') || segment.contains(':')
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.registry.is_empty() {
            write!(f, "{}/", self.registry)?;
        }
        write!(f, "{}", self.repository)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}
