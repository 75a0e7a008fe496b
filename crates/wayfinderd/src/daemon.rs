//! Subsystem construction shared by the daemon and the one-shot commands.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use wayfinder_core::WayfinderConfig;
use wayfinder_health::{HealthProber, HttpProbeTransport};
use wayfinder_net::HttpClient;
use wayfinder_refresh::{RefreshScheduler, RefreshSettings, TimerService};
use wayfinder_registry::{HttpRegistrySource, RegistryReader};
use wayfinder_state::{CacheStore, MemoryStorage, RedbStorage};

/// Database file inside the data directory.
pub const DB_FILE: &str = "wayfinder.redb";

/// Load `path`, or the defaults when no config file was given.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<WayfinderConfig> {
    match path {
        Some(path) => WayfinderConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(WayfinderConfig::default()),
    }
}

/// Open the persistent cache store under `data_dir`, creating it if needed.
pub fn open_store(data_dir: &Path) -> anyhow::Result<CacheStore> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("creating data dir {}", data_dir.display()))?;
    let db_path = data_dir.join(DB_FILE);
    let storage = RedbStorage::open(&db_path)?;
    info!(path = ?db_path, "cache store opened");
    Ok(CacheStore::open(Arc::new(storage)))
}

/// Open the cache store for a read-only command.
///
/// The daemon holds an exclusive lock on the database while it runs; when
/// the store cannot be opened the command sees an empty cache instead.
pub fn open_store_or_empty(data_dir: &Path) -> CacheStore {
    match open_store(data_dir) {
        Ok(store) => store,
        Err(e) => {
            warn!(error = %e, "cache store unavailable; using an empty cache");
            CacheStore::open(Arc::new(MemoryStorage::new()))
        }
    }
}

/// Wire the registry reader, prober, and store into a scheduler.
pub fn build_scheduler(
    config: &WayfinderConfig,
    store: CacheStore,
    timers: Arc<dyn TimerService>,
) -> anyhow::Result<RefreshScheduler> {
    let client = HttpClient::new()?;

    let source = HttpRegistrySource::new(
        client.clone(),
        config.registry.url.clone(),
        config.registry.timeout(),
    );
    let transport = HttpProbeTransport::new(client, config.probe.path.clone());

    Ok(RefreshScheduler::new(
        RegistryReader::new(Arc::new(source)),
        HealthProber::new(Arc::new(transport), config.probe.max_parallelism),
        store,
        timers,
        RefreshSettings::from_config(config),
    ))
}
