//! wayfinder-health — concurrent health probing of gateway candidates.
//!
//! # Architecture
//!
//! ```text
//! HealthProber::probe(candidates)
//!   ├── one task per candidate, gated by a Semaphore (max parallelism)
//!   │   └── timeout(per_probe) → ProbeTransport::probe() → latency | FailureKind
//!   └── batch deadline: stragglers aborted and recorded as BatchTimeout
//! ```
//!
//! Every candidate yields exactly one `ProbeResult`, in input order. A
//! failed probe never aborts the batch.

pub mod prober;
pub mod transport;

pub use prober::{HealthProber, ProbeSummary};
pub use transport::{HttpProbeTransport, ProbeTransport};
