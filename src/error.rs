//! Error types for fresco
//!
//! All modules use `FrescoResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for fresco operations
pub type FrescoResult<T> = Result<T, FrescoError>;

/// All errors that can occur in the cache engine
#[derive(Error, Debug)]
pub enum FrescoError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    // Manifest errors
    #[error("Service not found in build manifest: {0}")]
    ServiceNotFound(String),

    #[error("Dependency cycle detected involving service {service}")]
    DependencyCycle { service: String },

    #[error("Service {service} depends on unknown service {dependency}")]
    UnknownDependency { service: String, dependency: String },

    // Repository errors
    #[error("Could not get repository commit: {0}")]
    RepositoryCommit(String),

    // Registry errors
    #[error("Error checking image at registry {reference}: {reason}")]
    RegistryCheck { reference: String, reason: String },

    #[error("Images [{0}] not found")]
    ImagesNotFound(String),

    #[error("Image for service {0} not found in cache")]
    ImageNotInCache(String),

    // Clone errors
    #[error("Error cloning service {service} global image to dev: {reason}")]
    CloneFailed { service: String, reason: String },

    // Reference errors
    #[error("Invalid image reference: {0}")]
    InvalidReference(String),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FrescoError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a registry check error for a reference
    pub fn registry_check(reference: impl Into<String>, reason: impl ToString) -> Self {
        Self::RegistryCheck {
            reference: reference.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a clone failure error for a service
    pub fn clone_failed(service: impl Into<String>, reason: impl ToString) -> Self {
        Self::CloneFailed {
            service: service.into(),
            reason: reason.to_string(),
        }
    }
}
