//! Resolver — selects the first qualifying gateway in cache order.

use http::Uri;
use serde::Serialize;
use tracing::{debug, trace};

use wayfinder_core::{
    GatewayId, RankedGateway, ResolutionRequest, ResolvePolicy, ResourceRef, WayfinderConfig,
};
use wayfinder_state::CacheStore;

/// A resolved reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub url: String,
    pub gateway: GatewayId,
    /// Generation of the snapshot the gateway was picked from.
    pub cache_version: u64,
}

#[derive(Clone)]
pub struct Resolver {
    store: CacheStore,
    scheme: String,
    /// Stake threshold applied when a request sets `require_stake`.
    min_stake: u64,
}

impl Resolver {
    pub fn new(store: CacheStore, scheme: impl Into<String>, min_stake: u64) -> Self {
        Self {
            store,
            scheme: scheme.into(),
            min_stake,
        }
    }

    pub fn from_config(store: CacheStore, config: &WayfinderConfig) -> Self {
        Self::new(store, config.resolver.scheme.clone(), config.rank.min_stake)
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Resolve a reference, or `None` when it is not ours or no cached
    /// gateway qualifies.
    pub fn resolve(&self, request: &ResolutionRequest) -> Option<Resolution> {
        let reference = match ResourceRef::parse(&request.reference, &self.scheme) {
            Ok(reference) => reference,
            Err(e) => {
                trace!(reference = %request.reference, error = %e, "reference not handled");
                return None;
            }
        };

        let cache = self.store.get();
        let needs_names = reference.needs_name_resolution();
        let gateway = cache
            .gateways
            .iter()
            .find(|gw| self.qualifies(gw, request.policy, needs_names))?;

        let url = reference.to_gateway_url(&gateway.record.id);
        if let Err(e) = url.parse::<Uri>() {
            debug!(%url, error = %e, "rewritten url rejected");
            return None;
        }

        debug!(
            reference = %request.reference,
            gateway = %gateway.record.id,
            version = cache.version,
            "reference resolved"
        );
        Some(Resolution {
            url,
            gateway: gateway.record.id.clone(),
            cache_version: cache.version,
        })
    }

    fn qualifies(&self, gateway: &RankedGateway, policy: ResolvePolicy, needs_names: bool) -> bool {
        let record = &gateway.record;
        if (needs_names || policy.require_name_resolution) && !record.capabilities.name_resolution {
            return false;
        }
        if policy.require_stake && (record.stake == 0 || record.stake < self.min_stake) {
            return false;
        }
        true
    }
}
