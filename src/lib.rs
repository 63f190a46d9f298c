//! Fresco - Smart Build Cache
//!
//! Decides which services of a multi-service manifest can skip their image
//! build because an equivalent image already exists in the registry, and
//! promotes those images into the developer's namespace.

pub mod cache;
pub mod config;
pub mod controller;
pub mod envvars;
pub mod error;
pub mod hasher;
pub mod manifest;
pub mod registry;
pub mod repo;
pub mod strategy;

pub use controller::CacheController;
pub use error::{FrescoError, FrescoResult};
