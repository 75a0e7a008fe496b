//! Gateway scoring for the ranked cache.
//!
//! Evaluates qualified candidates using a weighted combination of:
//! - **Stake**: `stake / max_stake` across qualified candidates (higher is better)
//! - **Latency**: `(max - latency) / (max - min)` across qualified candidates
//!   (lower latency is better)
//!
//! A component whose range is degenerate (all equal, or zero stake overall)
//! contributes its full weight to every candidate. Ties are broken by
//! gateway identity, host first.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, info, warn};

use wayfinder_core::{
    FailureKind, GatewayCache, GatewayId, GatewayRecord, GatewayStatus, ProbeResult, RankPolicy,
    RankedGateway,
};

/// Why a candidate was left out of the ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disqualification {
    /// No probe result was produced for the candidate.
    NotProbed,
    Unhealthy(Option<FailureKind>),
    Leaving,
    BelowMinStake { stake: u64, min_stake: u64 },
}

impl fmt::Display for Disqualification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disqualification::NotProbed => f.write_str("not probed"),
            Disqualification::Unhealthy(Some(kind)) => write!(f, "unhealthy ({kind:?})"),
            Disqualification::Unhealthy(None) => f.write_str("unhealthy"),
            Disqualification::Leaving => f.write_str("leaving the registry"),
            Disqualification::BelowMinStake { stake, min_stake } => {
                write!(f, "stake {stake} below minimum {min_stake}")
            }
        }
    }
}

fn qualify(
    candidate: &GatewayRecord,
    probe: Option<&ProbeResult>,
    policy: &RankPolicy,
) -> Result<u64, Disqualification> {
    let probe = probe.ok_or(Disqualification::NotProbed)?;
    let latency = match (probe.success, probe.latency_ms) {
        (true, Some(latency)) => latency,
        _ => return Err(Disqualification::Unhealthy(probe.failure)),
    };
    if candidate.status == GatewayStatus::Leaving {
        return Err(Disqualification::Leaving);
    }
    if policy.ensure_stake && candidate.stake < policy.min_stake {
        return Err(Disqualification::BelowMinStake {
            stake: candidate.stake,
            min_stake: policy.min_stake,
        });
    }
    Ok(latency)
}

/// Score qualified candidates, unsorted. Pairs are `(record, latency_ms)`.
pub fn score_candidates(
    qualified: Vec<(GatewayRecord, u64)>,
    policy: &RankPolicy,
) -> Vec<RankedGateway> {
    let max_stake = qualified.iter().map(|(r, _)| r.stake).max().unwrap_or(0);
    let min_latency = qualified.iter().map(|(_, l)| *l).min().unwrap_or(0);
    let max_latency = qualified.iter().map(|(_, l)| *l).max().unwrap_or(0);

    qualified
        .into_iter()
        .map(|(record, latency_ms)| {
            let stake_term = if max_stake == 0 {
                1.0
            } else {
                record.stake as f64 / max_stake as f64
            };
            let latency_term = if max_latency == min_latency {
                1.0
            } else {
                (max_latency - latency_ms) as f64 / (max_latency - min_latency) as f64
            };
            let score = policy.stake_weight * stake_term + policy.latency_weight * latency_term;
            RankedGateway {
                record,
                score,
                latency_ms,
            }
        })
        .collect()
}

/// Rank probed candidates into a fresh cache document.
///
/// The returned cache has version 0 and no source hash; the caller stamps
/// the hash and the cache store assigns the version.
pub fn rank(
    candidates: &[GatewayRecord],
    probes: &[ProbeResult],
    policy: &RankPolicy,
) -> GatewayCache {
    let by_id: HashMap<&GatewayId, &ProbeResult> =
        probes.iter().map(|p| (&p.gateway, p)).collect();

    let mut qualified = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match qualify(candidate, by_id.get(&candidate.id).copied(), policy) {
            Ok(latency) => qualified.push((candidate.clone(), latency)),
            Err(reason) => debug!(gateway = %candidate.id, %reason, "gateway disqualified"),
        }
    }

    let mut gateways = score_candidates(qualified, policy);
    gateways.sort_by(RankedGateway::rank_cmp);
    if policy.max_gateways > 0 {
        gateways.truncate(policy.max_gateways);
    }

    if gateways.is_empty() {
        warn!(
            candidates = candidates.len(),
            ensure_stake = policy.ensure_stake,
            "policy unsatisfiable: no gateway qualified, producing empty cache"
        );
    } else {
        info!(
            candidates = candidates.len(),
            qualified = gateways.len(),
            top = %gateways[0].record.id,
            "gateways ranked"
        );
    }

    GatewayCache {
        gateways,
        ..GatewayCache::default()
    }
}
