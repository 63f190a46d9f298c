//! Repository signal source
//!
//! Narrow contract over git introspection. The engine only ever needs the
//! current commit and two per-path change signals; how those are produced
//! (libgit2, shelling out, a test fake) is the caller's concern.

use crate::error::FrescoResult;
use std::path::Path;

/// Source of version-control signals used as hash inputs
pub trait RepositorySignals: Send + Sync {
    /// Identifier of the repository's current commit
    fn current_commit(&self) -> FrescoResult<String>;

    /// Identifier of the latest change affecting the given directory
    fn latest_change_signal(&self, path: &Path) -> FrescoResult<String>;

    /// Signal describing uncommitted local modifications under the path
    fn local_diff_signal(&self, path: &Path) -> FrescoResult<String>;
}
