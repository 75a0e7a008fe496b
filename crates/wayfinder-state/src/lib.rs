//! wayfinder-state — the gateway cache store.
//!
//! Backed by [redb](https://docs.rs/redb) through the [`DocumentStorage`]
//! trait, which stores opaque whole documents under fixed keys. The
//! [`CacheStore`] layers the ranked [`GatewayCache`] on top: JSON
//! serialization, version assignment, and a copy-on-write in-memory
//! snapshot that readers clone as an `Arc` without ever blocking on a write.
//!
//! # Replace discipline
//!
//! ```text
//! set(new) ── assign version ── serialize ── storage.store(key, bytes) ── swap Arc
//!                                              │ fails
//!                                              └── return error, nothing swapped
//! ```
//!
//! [`GatewayCache`]: wayfinder_core::GatewayCache

pub mod error;
pub mod storage;
pub mod store;
pub mod tables;

pub use error::{StateError, StateResult};
pub use storage::{DocumentStorage, MemoryStorage, RedbStorage};
pub use store::{CACHE_KEY, CacheStore};
