//! Build manifest types consumed by the cache engine
//!
//! A manifest maps service names to a [`BuildSpec`] describing how that
//! service's image is built. Specs are immutable once handed to the engine
//! for a run. Manifest parsing itself lives in the CLI; this module only
//! defines the shapes the engine needs plus the derived dependency map.

pub mod depgraph;

pub use depgraph::DependencyMap;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Map of service name to its build specification
pub type BuildManifest = HashMap<String, BuildSpec>;

/// One named build argument, ordered as declared in the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildArg {
    pub name: String,
    pub value: String,
}

impl BuildArg {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Render as `name=value`, expanding shell-style variable references
    /// in the value against the current process environment
    pub fn render(&self) -> String {
        format!("{}={}", self.name, expand_vars(&self.value))
    }
}

/// Declarative description of one service's image build
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSpec {
    /// Build context directory, relative to the working directory or absolute
    pub context: String,

    /// Dockerfile path; resolved relative to the context when not found as-is
    pub dockerfile: String,

    /// Explicit image reference, if the manifest pins one
    pub image: Option<String>,

    /// Ordered build arguments
    pub args: Vec<BuildArg>,

    /// Secret name to source path; ordered map so hashing is deterministic
    pub secrets: BTreeMap<String, String>,

    /// Target build stage
    pub target: String,

    /// Names of services whose images must be built before this one
    pub depends_on: Vec<String>,
}

impl BuildSpec {
    /// Whether the spec carries a Dockerfile to build from
    pub fn has_dockerfile(&self) -> bool {
        !self.dockerfile.is_empty()
    }

    /// The explicit image reference, or empty when the manifest sets none
    pub fn image_ref(&self) -> &str {
        self.image.as_deref().unwrap_or("")
    }
}

/// Expand `$NAME` and `${NAME}` references against the process environment
///
/// Unset variables expand to the empty string. A `$` not followed by a
/// valid variable name is kept literally.
pub fn expand_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some(&(_, '{')) => {
                chars.next();
                let mut name = String::new();
                let mut closed = false;
                for (_, n) in chars.by_ref() {
                    if n == '}' {
                        closed = true;
                        break;
                    }
                    name.push(n);
                }
                if closed {
                    out.push_str(&std::env::var(&name).unwrap_or_default());
                } else {
                    out.push_str("${");
                    out.push_str(&name);
                }
            }
            Some(&(_, n)) if n == '_' || n.is_ascii_alphabetic() => {
                let mut name = String::new();
                while let Some(&(_, n)) = chars.peek() {
                    if n == '_' || n.is_ascii_alphanumeric() {
                        name.push(n);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push_str(&std::env::var(&name).unwrap_or_default());
            }
            _ => out.push('$'),
        }
    }
    out
}
