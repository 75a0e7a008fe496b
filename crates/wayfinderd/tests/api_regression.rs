//! Daemon regression tests.
//!
//! Exercises the resolve endpoint against seeded and freshly refreshed
//! caches, including a full refresh cycle against local HTTP servers.

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower::ServiceExt;

use wayfinder_core::*;
use wayfinder_refresh::{Tick, TickOutcome, TokioTimers};
use wayfinder_resolve::Resolver;
use wayfinder_state::{CacheStore, MemoryStorage};
use wayfinderd::{ApiState, build_router, build_scheduler, open_store, open_store_or_empty};

const TX: &str = "4jBV3ofWh41KhuTs2pFvj-KBZWUkbrbCYlJH0vLA6LM";

fn ranked(host: &str, names: bool, score: f64) -> RankedGateway {
    RankedGateway {
        record: GatewayRecord {
            id: GatewayId::new(host, 443, Protocol::Https),
            operator: None,
            stake: 100,
            capabilities: Capabilities {
                name_resolution: names,
            },
            status: GatewayStatus::Joined,
        },
        score,
        latency_ms: 15,
    }
}

fn state_with(gateways: Vec<RankedGateway>) -> ApiState {
    let store = CacheStore::open(Arc::new(MemoryStorage::new()));
    if !gateways.is_empty() {
        store
            .set(GatewayCache {
                gateways,
                ..GatewayCache::default()
            })
            .unwrap();
    }
    ApiState {
        resolver: Resolver::new(store.clone(), "ar", 0),
        store,
        scheduler: None,
    }
}

async fn get(state: ApiState, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let resp = build_router(state).oneshot(req).await.unwrap();
    let status = resp.status();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn resolve_with_empty_cache_passes_through() {
    let (status, _) = get(state_with(vec![]), "/v1/resolve?reference=ar%3A%2F%2Fabc123").await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn resolve_rewrites_onto_top_gateway() {
    let state = state_with(vec![ranked("a.example", false, 0.9), ranked("b.example", true, 0.5)]);
    let uri = format!("/v1/resolve?reference=ar%3A%2F%2F{TX}%2Fimg.png");

    let (status, json) = get(state, &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["url"], format!("https://a.example/{TX}/img.png"));
    assert_eq!(json["cache_version"], 1);
}

#[tokio::test]
async fn resolve_applies_request_policy() {
    let state = state_with(vec![ranked("a.example", false, 0.9), ranked("b.example", true, 0.5)]);
    let uri = format!("/v1/resolve?reference=ar%3A%2F%2F{TX}&require_name_resolution=true");
    let (status, json) = get(state.clone(), &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["gateway"]["host"], "b.example");

    let only_plain = state_with(vec![ranked("a.example", false, 0.9)]);
    let (status, _) = get(only_plain, "/v1/resolve?reference=ar%3A%2F%2Fardrive").await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn foreign_reference_passes_through() {
    let state = state_with(vec![ranked("a.example", true, 0.9)]);
    let (status, _) = get(state, "/v1/resolve?reference=https%3A%2F%2Fexample.com%2F").await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn cache_and_health_report_the_snapshot() {
    let state = state_with(vec![ranked("a.example", false, 0.9)]);

    let (status, json) = get(state.clone(), "/v1/cache").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["version"], 1);
    assert_eq!(json["gateways"][0]["record"]["id"]["host"], "a.example");

    let (status, json) = get(state, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["gateways"], 1);
    assert!(json.get("refresh").is_none());
}

#[test]
fn locked_store_resolves_against_an_empty_cache() {
    let dir = tempfile::tempdir().unwrap();
    let held = open_store(dir.path()).unwrap();
    held.set(GatewayCache {
        gateways: vec![ranked("a.example", true, 0.9)],
        ..GatewayCache::default()
    })
    .unwrap();

    // `held` keeps the database locked, as a running daemon would.
    assert!(open_store(dir.path()).is_err());
    let store = open_store_or_empty(dir.path());
    assert!(store.get().is_empty());

    let request = ResolutionRequest::new(format!("ar://{TX}"), ResolvePolicy::default());
    assert!(Resolver::new(store, "ar", 0).resolve(&request).is_none());
    assert_eq!(
        Resolver::new(held, "ar", 0)
            .resolve(&request)
            .map(|r| r.url),
        Some(format!("https://a.example/{TX}"))
    );
}

// ── Full cycle against local servers ───────────────────────────

/// Answer every connection with `response`.
async fn serve_forever(response: String) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let response = response.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 2048];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    port
}

fn http_response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    )
}

#[tokio::test]
async fn refresh_cycle_feeds_the_resolver_and_persists() {
    let healthy = serve_forever(http_response("200 OK", "{}")).await;
    let broken = serve_forever(http_response("503 Service Unavailable", "")).await;
    let registry_body = format!(
        r#"[
            {{"fqdn": "127.0.0.1", "port": {healthy}, "protocol": "http", "operatorStake": 10}},
            {{"fqdn": "localhost", "port": {broken}, "protocol": "http", "operatorStake": 1000}}
        ]"#
    );
    let registry = serve_forever(http_response("200 OK", &registry_body)).await;

    let mut config = WayfinderConfig::default();
    config.registry.url = format!("http://127.0.0.1:{registry}/v1/gateways");
    config.probe.timeout = "2s".to_string();

    let dir = tempfile::tempdir().unwrap();
    {
        let store = open_store(dir.path()).unwrap();
        let (tick_tx, _tick_rx) = mpsc::channel(4);
        let timers = Arc::new(TokioTimers::new(tick_tx));
        let scheduler = build_scheduler(&config, store.clone(), timers).unwrap();

        let outcome = scheduler.handle_tick(Tick::Manual).await;
        assert_eq!(
            outcome,
            TickOutcome::Refreshed {
                version: 1,
                gateways: 1
            }
        );

        let state = ApiState {
            resolver: Resolver::from_config(store.clone(), &config),
            store,
            scheduler: Some(Arc::new(scheduler)),
        };
        let uri = format!("/v1/resolve?reference=ar%3A%2F%2F{TX}");
        let (status, json) = get(state.clone(), &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["url"], format!("http://127.0.0.1:{healthy}/{TX}"));

        let (_, health) = get(state, "/healthz").await;
        assert_eq!(health["refresh"]["state"], "idle");
        assert_eq!(health["refresh"]["attempt"], 0);
    }

    let reopened = open_store(dir.path()).unwrap();
    let cache = reopened.get();
    assert_eq!(cache.version, 1);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.gateways[0].record.id.port, healthy);
}
