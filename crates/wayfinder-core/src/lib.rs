//! wayfinder-core — shared data model for the Wayfinder gateway engine.
//!
//! Holds the types every other crate exchanges (gateway records, probe
//! results, the ranked cache document, policies), the `wayfinder.toml`
//! configuration, and the parser for custom-scheme resource references.

pub mod config;
pub mod reference;
pub mod types;

pub use config::{ConfigError, WayfinderConfig};
pub use reference::{ReferenceError, ResourceRef, Target};
pub use types::*;
