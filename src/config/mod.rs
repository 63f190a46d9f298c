//! Cache engine configuration
//!
//! Read once at construction; the engine never re-reads flags mid-run.
//! Values come from an optional TOML file with environment-variable
//! overrides, so CI can flip the strategy without touching config files.

use crate::error::{FrescoError, FrescoResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable toggling the whole cache engine
pub const ENABLED_ENV_VAR: &str = "FRESCO_SMART_BUILD_ENABLED";
/// Environment variable selecting the hashing mode (`commit` or `context`)
pub const HASH_MODE_ENV_VAR: &str = "FRESCO_BUILD_HASH_MODE";
/// Environment variable selecting the check strategy (`sequential` or `parallel`)
pub const STRATEGY_ENV_VAR: &str = "FRESCO_BUILD_CHECK_STRATEGY";

/// What a build hash is derived from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashMode {
    /// Hash the repository's current commit plus the spec
    Commit,
    /// Hash per-context change signals plus the spec
    #[default]
    Context,
}

/// Which cache-check strategy the controller wires
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    #[default]
    Sequential,
    Parallel,
}

/// Engine feature flags
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Master toggle; disabled means every service is rebuilt
    pub enabled: bool,

    /// Hashing mode
    pub mode: HashMode,

    /// Cache-check strategy
    pub strategy: StrategyKind,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: HashMode::default(),
            strategy: StrategyKind::default(),
        }
    }
}

impl CacheConfig {
    /// Default config file location
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fresco")
            .join("config.toml")
    }

    /// Load from a TOML file, falling back to defaults when it is missing,
    /// then apply environment overrides
    pub fn load(path: &Path) -> FrescoResult<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| FrescoError::io(format!("reading config from {}", path.display()), e))?;
            toml::from_str(&content).map_err(|e| FrescoError::ConfigInvalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        } else {
            debug!("Config file not found, using defaults");
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Build a config from defaults plus environment overrides only
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var(ENABLED_ENV_VAR) {
            if !v.is_empty() {
                self.enabled = !matches!(v.to_lowercase().as_str(), "false" | "0");
            }
        }
        if let Ok(v) = std::env::var(HASH_MODE_ENV_VAR) {
            match v.to_lowercase().as_str() {
                "commit" => self.mode = HashMode::Commit,
                "context" => self.mode = HashMode::Context,
                _ => {}
            }
        }
        if let Ok(v) = std::env::var(STRATEGY_ENV_VAR) {
            match v.to_lowercase().as_str() {
                "parallel" => self.strategy = StrategyKind::Parallel,
                "sequential" => self.strategy = StrategyKind::Sequential,
                _ => {}
            }
        }
    }
}
