//! wayfinder-net — the network transport shared by the registry reader and
//! the health prober.
//!
//! A deliberately small HTTP/1.1 client: one connection per request, `GET`
//! only, plain TCP for `http://` and rustls (Mozilla roots) for `https://`.
//! Every request is bounded by a caller-supplied timeout.

pub mod client;
pub mod error;

pub use client::{HttpClient, HttpResponse};
pub use error::{NetError, NetResult};
