//! wayfinder-rank — turns probed candidates into a ranked gateway cache.
//!
//! Candidates are first filtered (unhealthy, leaving, or under-staked
//! gateways are disqualified), then scored by a weighted combination of
//! normalized stake and normalized latency, and ordered deterministically.
//! Zero survivors is a valid outcome: the result is an empty cache.

pub mod scorer;

pub use scorer::{Disqualification, rank, score_candidates};
