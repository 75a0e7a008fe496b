//! Shared types used across Wayfinder crates.
//!
//! The registry reader produces [`GatewayRecord`]s, the prober produces one
//! [`ProbeResult`] per record, and the ranker folds both into a
//! [`GatewayCache`], which is the only document the store persists and the
//! resolver reads.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// ── Gateway identity ───────────────────────────────────────────────

/// Transport protocol a gateway is reachable on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }

    /// The port implied by the scheme when none is written.
    pub fn default_port(&self) -> u16 {
        match self {
            Protocol::Http => 80,
            Protocol::Https => 443,
        }
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            other => Err(format!("unknown protocol: {other}")),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network identity of a gateway.
///
/// Field order matters: the derived `Ord` compares host first, then port,
/// then protocol, which is the ranker's deterministic tie-break.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GatewayId {
    pub host: String,
    pub port: u16,
    pub protocol: Protocol,
}

impl GatewayId {
    pub fn new(host: impl Into<String>, port: u16, protocol: Protocol) -> Self {
        Self {
            host: host.into(),
            port,
            protocol,
        }
    }

    /// `host` or `host:port` when the port is not the protocol default.
    pub fn authority(&self) -> String {
        if self.port == self.protocol.default_port() {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Base URL of the gateway, e.g. `https://gw.example.com`.
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.authority())
    }
}

impl fmt::Display for GatewayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.protocol, self.host, self.port)
    }
}

// ── Gateway records ────────────────────────────────────────────────

/// Optional services a gateway advertises.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Serves named resources as subdomains (`<name>.<host>`).
    pub name_resolution: bool,
}

/// Registry membership status of a gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayStatus {
    Joined,
    Leaving,
}

/// A validated registry entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayRecord {
    pub id: GatewayId,
    /// Operator address as published by the registry, if any.
    pub operator: Option<String>,
    /// Collateral posted by the operator.
    pub stake: u64,
    pub capabilities: Capabilities,
    pub status: GatewayStatus,
}

// ── Probing ────────────────────────────────────────────────────────

/// Why a probe did not count as healthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connection, TLS, or protocol error.
    Network,
    /// The probe's own timeout elapsed.
    Timeout,
    /// The batch deadline elapsed before the probe finished.
    BatchTimeout,
    /// The gateway answered with a non-2xx status.
    BadStatus(u16),
    /// The probe task was cancelled or panicked.
    Aborted,
}

impl FailureKind {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FailureKind::Timeout | FailureKind::BatchTimeout)
    }
}

/// Outcome of probing one candidate in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub gateway: GatewayId,
    /// Round-trip latency, present only on success.
    pub latency_ms: Option<u64>,
    pub success: bool,
    pub failure: Option<FailureKind>,
    /// Epoch milliseconds when the probe completed (or was given up on).
    pub probed_at_ms: u64,
}

impl ProbeResult {
    pub fn healthy(gateway: GatewayId, latency_ms: u64) -> Self {
        Self {
            gateway,
            latency_ms: Some(latency_ms),
            success: true,
            failure: None,
            probed_at_ms: epoch_millis(),
        }
    }

    pub fn failed(gateway: GatewayId, kind: FailureKind) -> Self {
        Self {
            gateway,
            latency_ms: None,
            success: false,
            failure: Some(kind),
            probed_at_ms: epoch_millis(),
        }
    }
}

// ── Ranked cache ───────────────────────────────────────────────────

/// A qualified gateway with the score it was ranked by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedGateway {
    pub record: GatewayRecord,
    pub score: f64,
    pub latency_ms: u64,
}

impl RankedGateway {
    /// Ranking order: score descending, then identity ascending.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.record.id.cmp(&other.record.id))
    }
}

/// The ranked gateway list as persisted and served to the resolver.
///
/// Always replaced as a whole document; never patched in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayCache {
    /// Monotonically increasing generation, assigned by the cache store.
    pub version: u64,
    /// Epoch milliseconds when this generation was built.
    pub built_at_ms: u64,
    /// Hex SHA-256 of the registry response the list was built from.
    pub source_hash: String,
    /// Ranked descending; index 0 is the preferred gateway.
    pub gateways: Vec<RankedGateway>,
}

impl GatewayCache {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.gateways.is_empty()
    }

    pub fn len(&self) -> usize {
        self.gateways.len()
    }

    /// Whether a gateway with this identity is part of the snapshot.
    pub fn contains(&self, id: &GatewayId) -> bool {
        self.gateways.iter().any(|g| &g.record.id == id)
    }

    /// True when entries are unique, scores are finite, and the list is in
    /// ranking order.
    pub fn is_consistent(&self) -> bool {
        let mut seen = HashSet::with_capacity(self.gateways.len());
        for gw in &self.gateways {
            if !gw.score.is_finite() || !seen.insert(&gw.record.id) {
                return false;
            }
        }
        self.gateways
            .windows(2)
            .all(|pair| pair[0].rank_cmp(&pair[1]) == Ordering::Less)
    }
}

// ── Policies ───────────────────────────────────────────────────────

/// Ranking policy applied at refresh time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankPolicy {
    /// Disqualify gateways whose stake is below `min_stake`.
    pub ensure_stake: bool,
    pub min_stake: u64,
    pub stake_weight: f64,
    pub latency_weight: f64,
    /// Keep at most this many gateways (0 = unlimited).
    pub max_gateways: usize,
}

impl Default for RankPolicy {
    fn default() -> Self {
        Self {
            ensure_stake: false,
            min_stake: 0,
            stake_weight: 0.7,
            latency_weight: 0.3,
            max_gateways: 0,
        }
    }
}

/// Per-request filters applied by the resolver against the cached ranking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolvePolicy {
    pub require_name_resolution: bool,
    pub require_stake: bool,
}

/// A raw resource reference to be rewritten onto a gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionRequest {
    pub reference: String,
    #[serde(default)]
    pub policy: ResolvePolicy,
}

impl ResolutionRequest {
    pub fn new(reference: impl Into<String>, policy: ResolvePolicy) -> Self {
        Self {
            reference: reference.into(),
            policy,
        }
    }
}

/// Boxed future returned by the collaborator traits (registry, transport,
/// timers) so they can be used as trait objects.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Current wall-clock time in epoch milliseconds.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranked(host: &str, score: f64) -> RankedGateway {
        RankedGateway {
            record: GatewayRecord {
                id: GatewayId::new(host, 443, Protocol::Https),
                operator: None,
                stake: 10,
                capabilities: Capabilities::default(),
                status: GatewayStatus::Joined,
            },
            score,
            latency_ms: 20,
        }
    }

    #[test]
    fn gateway_id_orders_by_host_first() {
        let a = GatewayId::new("alpha.example", 9000, Protocol::Http);
        let b = GatewayId::new("beta.example", 80, Protocol::Http);
        assert!(a < b);
    }

    #[test]
    fn authority_omits_default_port() {
        assert_eq!(
            GatewayId::new("gw.example", 443, Protocol::Https).base_url(),
            "https://gw.example"
        );
        assert_eq!(
            GatewayId::new("gw.example", 3000, Protocol::Http).base_url(),
            "http://gw.example:3000"
        );
    }

    #[test]
    fn protocol_parses_case_insensitively() {
        assert_eq!("HTTPS".parse::<Protocol>(), Ok(Protocol::Https));
        assert!("ftp".parse::<Protocol>().is_err());
    }

    #[test]
    fn empty_cache_is_consistent() {
        assert!(GatewayCache::empty().is_consistent());
    }

    #[test]
    fn sorted_cache_is_consistent() {
        let cache = GatewayCache {
            gateways: vec![ranked("a", 0.9), ranked("b", 0.5), ranked("c", 0.5)],
            ..GatewayCache::default()
        };
        assert!(cache.is_consistent());
    }

    #[test]
    fn unsorted_cache_is_inconsistent() {
        let cache = GatewayCache {
            gateways: vec![ranked("a", 0.1), ranked("b", 0.5)],
            ..GatewayCache::default()
        };
        assert!(!cache.is_consistent());

        // Equal scores must fall back to host order.
        let cache = GatewayCache {
            gateways: vec![ranked("z", 0.5), ranked("a", 0.5)],
            ..GatewayCache::default()
        };
        assert!(!cache.is_consistent());
    }

    #[test]
    fn duplicate_or_nan_entries_are_inconsistent() {
        let dup = GatewayCache {
            gateways: vec![ranked("a", 0.9), ranked("a", 0.5)],
            ..GatewayCache::default()
        };
        assert!(!dup.is_consistent());

        let nan = GatewayCache {
            gateways: vec![ranked("a", f64::NAN)],
            ..GatewayCache::default()
        };
        assert!(!nan.is_consistent());
    }

    #[test]
    fn cache_json_roundtrip_preserves_order() {
        let cache = GatewayCache {
            version: 3,
            built_at_ms: 1000,
            source_hash: "abc".to_string(),
            gateways: vec![ranked("a", 0.9), ranked("b", 0.4)],
        };
        let json = serde_json::to_vec(&cache).unwrap();
        let back: GatewayCache = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, cache);
    }
}
