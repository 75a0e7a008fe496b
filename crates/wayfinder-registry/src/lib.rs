//! wayfinder-registry — the registry reader.
//!
//! Performs one query against the gateway registry per call, validates every
//! entry into a typed [`GatewayRecord`], and drops (and logs) the entries
//! that do not validate. Only a wholly unreadable response is an error.
//!
//! # Architecture
//!
//! ```text
//! RegistryReader
//!   ├── RegistrySource::fetch() → raw bytes     (HttpRegistrySource in production)
//!   ├── sha256(raw) → source_hash
//!   └── parse_entries(raw) → Vec<GatewayRecord> (malformed entries dropped)
//! ```
//!
//! [`GatewayRecord`]: wayfinder_core::GatewayRecord

pub mod error;
pub mod parse;
pub mod reader;

pub use error::{RegistryError, RegistryResult};
pub use parse::parse_entries;
pub use reader::{HttpRegistrySource, RegistryReader, RegistrySnapshot, RegistrySource};
