//! wayfinderd — assembles the Wayfinder subsystems into one process.
//!
//! - Cache store (redb, under the data directory)
//! - Registry reader + health prober over the shared HTTP client
//! - Refresh scheduler driven by Tokio timers
//! - Resolve endpoint for the navigation-interception collaborator
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/v1/resolve?reference=..` | Resolved URL (200) or pass-through (204) |
//! | GET | `/v1/cache` | Current ranked snapshot |
//! | GET | `/healthz` | Liveness plus cache and refresh state |

pub mod api;
pub mod daemon;

pub use api::{ApiState, build_router};
pub use daemon::{build_scheduler, load_config, open_store, open_store_or_empty};
