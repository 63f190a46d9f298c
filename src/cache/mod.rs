//! Cache probing and cross-registry image promotion
//!
//! [`probe::CacheProbe`] answers "does an image for this hash already
//! exist"; [`cloner::Cloner`] promotes shared-registry hits into the
//! developer's namespace so they are usable without a rebuild.

pub mod cloner;
pub mod probe;

pub use cloner::Cloner;
pub use probe::CacheProbe;
