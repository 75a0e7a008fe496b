//! wayfinder-resolve — read-only resolution against the gateway cache.
//!
//! The [`Resolver`] never touches the network and never triggers a refresh:
//! it parses a reference, takes the current snapshot from the
//! [`CacheStore`](wayfinder_state::CacheStore), and rewrites the reference
//! onto the highest-ranked gateway that satisfies the request's policy.
//! Anything it cannot handle yields `None` so the caller proceeds
//! unmodified.

pub mod resolver;

pub use resolver::{Resolution, Resolver};
