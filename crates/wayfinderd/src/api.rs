//! HTTP handlers for the resolve endpoint and operator views.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use wayfinder_core::{GatewayCache, ResolutionRequest, ResolvePolicy};
use wayfinder_refresh::{RefreshScheduler, RefreshStatus};
use wayfinder_resolve::Resolver;
use wayfinder_state::CacheStore;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub resolver: Resolver,
    pub store: CacheStore,
    /// Present when the process runs a refresh loop.
    pub scheduler: Option<Arc<RefreshScheduler>>,
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/v1/resolve", get(resolve))
        .route("/v1/cache", get(cache))
        .route("/healthz", get(healthz))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    pub reference: String,
    #[serde(default)]
    pub require_name_resolution: bool,
    #[serde(default)]
    pub require_stake: bool,
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    cache_version: u64,
    gateways: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh: Option<RefreshStatus>,
}

/// GET /v1/resolve
///
/// 200 with the rewritten URL, or 204 when the caller should proceed
/// unmodified.
pub async fn resolve(
    State(state): State<ApiState>,
    Query(query): Query<ResolveQuery>,
) -> impl IntoResponse {
    let request = ResolutionRequest::new(
        query.reference,
        ResolvePolicy {
            require_name_resolution: query.require_name_resolution,
            require_stake: query.require_stake,
        },
    );
    match state.resolver.resolve(&request) {
        Some(resolution) => Json(resolution).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// GET /v1/cache
pub async fn cache(State(state): State<ApiState>) -> Json<GatewayCache> {
    Json(GatewayCache::clone(&state.store.get()))
}

/// GET /healthz
pub async fn healthz(State(state): State<ApiState>) -> impl IntoResponse {
    let cache = state.store.get();
    Json(Health {
        status: "ok",
        cache_version: cache.version,
        gateways: cache.len(),
        refresh: state.scheduler.as_ref().map(|s| s.status()),
    })
}
