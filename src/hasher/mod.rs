//! Deterministic content hashing for build units
//!
//! A service's hash is a pure function of its [`BuildSpec`] and the selected
//! [`HashMode`]: either the repository's current commit or per-context
//! change signals. Signals and per-service results are memoized for the
//! lifetime of one run; the tables take many concurrent readers and a
//! single writer because parallel cache checks may race on the same
//! context path.
//!
//! When repository metadata is unavailable the hasher degrades instead of
//! failing: it feeds a (service, timestamp) signal into the hash, which
//! guarantees a cache miss and therefore a safe rebuild.

use crate::config::HashMode;
use crate::error::{FrescoError, FrescoResult};
use crate::manifest::BuildSpec;
use crate::repo::RepositorySignals;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Computes and memoizes per-service build hashes
pub struct ServiceHasher {
    repo: Arc<dyn RepositorySignals>,
    mode: HashMode,
    working_dir: PathBuf,

    project_commit: RwLock<Option<String>>,
    service_hashes: RwLock<HashMap<String, String>>,
    context_signals: RwLock<HashMap<PathBuf, (String, String)>>,
    warned_missing_repo: AtomicBool,
}

impl ServiceHasher {
    pub fn new(repo: Arc<dyn RepositorySignals>, mode: HashMode, working_dir: PathBuf) -> Self {
        Self {
            repo,
            mode,
            working_dir,
            project_commit: RwLock::new(None),
            service_hashes: RwLock::new(HashMap::new()),
            context_signals: RwLock::new(HashMap::new()),
            warned_missing_repo: AtomicBool::new(false),
        }
    }

    /// Hash for the configured mode; commit-mode failures degrade to an
    /// empty hash, which the cache probe treats as "do not look up"
    pub fn build_hash(&self, spec: &BuildSpec, service: &str) -> String {
        match self.mode {
            HashMode::Context => self.hash_with_build_context(spec, service),
            HashMode::Commit => self.hash_project_commit(spec).unwrap_or_else(|e| {
                warn!("could not hash service {service} from project commit: {e}");
                String::new()
            }),
        }
    }

    /// Hash combining the repository's current commit with the spec
    ///
    /// The commit is fetched once per run and reused for every service.
    pub fn hash_project_commit(&self, spec: &BuildSpec) -> FrescoResult<String> {
        let memoized = self
            .project_commit
            .read()
            .ok()
            .and_then(|guard| guard.clone());

        let commit = match memoized {
            Some(commit) => commit,
            None => {
                let commit = self
                    .repo
                    .current_commit()
                    .map_err(|e| FrescoError::RepositoryCommit(e.to_string()))?;
                if let Ok(mut guard) = self.project_commit.write() {
                    *guard = Some(commit.clone());
                }
                commit
            }
        };
        Ok(self.hash_fields(spec, &commit, ""))
    }

    /// Hash combining the build context's change signals with the spec
    pub fn hash_with_build_context(&self, spec: &BuildSpec, service: &str) -> String {
        if let Ok(cache) = self.service_hashes.read() {
            if let Some(hash) = cache.get(service) {
                return hash.clone();
            }
        }

        let context = if spec.context.is_empty() {
            "."
        } else {
            spec.context.as_str()
        };
        let context_path = if Path::new(context).is_absolute() {
            PathBuf::from(context)
        } else {
            self.working_dir.join(context)
        };
        debug!("build context directory: {}", context_path.display());

        let (dir_signal, diff_signal) = self.context_signals_for(&context_path, service);
        let hash = self.hash_fields(spec, &dir_signal, &diff_signal);

        if let Ok(mut cache) = self.service_hashes.write() {
            // Another worker may have raced us here; first write wins so the
            // memoized value stays stable for the run
            return cache.entry(service.to_string()).or_insert(hash).clone();
        }
        hash
    }

    // Fetches (latest change, local diff) for a context path, memoized per
    // path. Failures produce a forced-miss signal and are not memoized.
    fn context_signals_for(&self, path: &Path, service: &str) -> (String, String) {
        if let Ok(cache) = self.context_signals.read() {
            if let Some(signals) = cache.get(path) {
                return signals.clone();
            }
        }

        let fetched = self
            .repo
            .latest_change_signal(path)
            .and_then(|change| Ok((change, self.repo.local_diff_signal(path)?)));

        match fetched {
            Ok(signals) => {
                if let Ok(mut cache) = self.context_signals.write() {
                    cache.entry(path.to_path_buf()).or_insert(signals.clone());
                }
                signals
            }
            Err(e) => {
                debug!(
                    "could not get change signals for {}: {e}, forcing a rebuild",
                    path.display()
                );
                if !self.warned_missing_repo.swap(true, Ordering::Relaxed) {
                    warn!("Smart builds cannot access repository metadata, building image {service:?}");
                }
                let signal = self.forced_miss_signal(service);
                (signal.clone(), signal)
            }
        }
    }

    // Signal unique to (service, now), guaranteeing a cache miss
    fn forced_miss_signal(&self, service: &str) -> String {
        let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let key = format!("{service}-{nanos}");
        hex::encode(Sha256::digest(key.as_bytes()))
    }

    // Ordered concatenation of every hash-relevant field, then SHA256
    fn hash_fields(&self, spec: &BuildSpec, commit: &str, diff: &str) -> String {
        let args = spec
            .args
            .iter()
            .map(|arg| arg.render())
            .collect::<Vec<_>>()
            .join(";");
        let secrets = spec
            .secrets
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join(";");

        let mut text = String::new();
        let _ = write!(text, "commit:{commit};");
        let _ = write!(text, "target:{};", spec.target);
        let _ = write!(text, "build_args:{args};");
        let _ = write!(text, "secrets:{secrets};");
        let _ = write!(text, "context:{};", spec.context);
        let _ = write!(
            text,
            "dockerfile_content:{};",
            self.dockerfile_digest(&spec.context, &spec.dockerfile)
        );
        let _ = write!(text, "diff:{diff};");
        let _ = write!(text, "image:{};", spec.image_ref());

        hex::encode(Sha256::digest(text.as_bytes()))
    }

    // Digest of the Dockerfile bytes; falls back to resolving the path
    // relative to the context, and to an empty digest when unreadable
    fn dockerfile_digest(&self, context: &str, dockerfile: &str) -> String {
        let content = match std::fs::read(dockerfile) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let joined = Path::new(context).join(dockerfile);
                match std::fs::read(&joined) {
                    Ok(content) => content,
                    Err(e) => {
                        debug!("error reading Dockerfile at {}: {e}", joined.display());
                        return String::new();
                    }
                }
            }
            Err(e) => {
                debug!("error reading Dockerfile at {dockerfile:?}: {e}");
                return String::new();
            }
        };
        hex::encode(Sha256::digest(&content))
    }
}
