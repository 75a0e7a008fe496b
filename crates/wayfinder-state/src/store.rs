//! CacheStore — the single owner of the current ranked gateway snapshot.
//!
//! Readers get an `Arc<GatewayCache>` and keep it for as long as they like;
//! a concurrent `set` builds and persists a new document, then swaps the
//! pointer. No reader ever sees a half-written list.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{debug, info, warn};

use wayfinder_core::{GatewayCache, epoch_millis};

use crate::error::{StateError, StateResult};
use crate::storage::DocumentStorage;

/// Fixed storage key of the persisted snapshot.
pub const CACHE_KEY: &str = "gateway-cache";

/// Thread-safe, cloneable handle to the gateway cache.
#[derive(Clone)]
pub struct CacheStore {
    storage: Arc<dyn DocumentStorage>,
    current: Arc<RwLock<Arc<GatewayCache>>>,
    /// Serializes writers so version assignment stays monotonic.
    write_lock: Arc<Mutex<()>>,
}

impl CacheStore {
    /// Open the store, loading the last persisted snapshot.
    ///
    /// Unreadable, undecodable, or inconsistent documents are logged and
    /// treated as absent; the store then starts empty.
    pub fn open(storage: Arc<dyn DocumentStorage>) -> Self {
        let initial = match load_snapshot(storage.as_ref()) {
            Ok(Some(cache)) => {
                info!(
                    version = cache.version,
                    gateways = cache.len(),
                    "loaded persisted gateway cache"
                );
                cache
            }
            Ok(None) => {
                debug!("no persisted gateway cache");
                GatewayCache::empty()
            }
            Err(e) => {
                warn!(error = %e, "ignoring unreadable gateway cache");
                GatewayCache::empty()
            }
        };

        Self {
            storage,
            current: Arc::new(RwLock::new(Arc::new(initial))),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// The current snapshot (empty when none has been built yet).
    pub fn get(&self) -> Arc<GatewayCache> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the snapshot as a whole document.
    ///
    /// The new version is one past the greater of the current and supplied
    /// versions. On any error neither the persisted nor the in-memory
    /// snapshot changes.
    pub fn set(&self, mut cache: GatewayCache) -> StateResult<Arc<GatewayCache>> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let previous = self.get();
        cache.version = previous.version.max(cache.version) + 1;
        if cache.built_at_ms == 0 {
            cache.built_at_ms = epoch_millis();
        }
        if !cache.is_consistent() {
            return Err(StateError::Inconsistent(format!(
                "version {} is not in ranking order or has duplicates",
                cache.version
            )));
        }

        let bytes = serde_json::to_vec(&cache).map_err(|e| StateError::Serialize(e.to_string()))?;
        self.storage.store(CACHE_KEY, &bytes)?;

        let snapshot = Arc::new(cache);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = snapshot.clone();

        info!(
            version = snapshot.version,
            gateways = snapshot.len(),
            previous_version = previous.version,
            "gateway cache replaced"
        );
        Ok(snapshot)
    }
}

fn load_snapshot(storage: &dyn DocumentStorage) -> StateResult<Option<GatewayCache>> {
    let Some(bytes) = storage.load(CACHE_KEY)? else {
        return Ok(None);
    };
    let cache: GatewayCache =
        serde_json::from_slice(&bytes).map_err(|e| StateError::Deserialize(e.to_string()))?;
    if !cache.is_consistent() {
        return Err(StateError::Inconsistent(format!(
            "persisted version {} failed validation",
            cache.version
        )));
    }
    Ok(Some(cache))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, RedbStorage};
    use std::sync::atomic::{AtomicBool, Ordering};
    use wayfinder_core::*;

    fn ranked(host: &str, score: f64) -> RankedGateway {
        RankedGateway {
            record: GatewayRecord {
                id: GatewayId::new(host, 443, Protocol::Https),
                operator: None,
                stake: 100,
                capabilities: Capabilities::default(),
                status: GatewayStatus::Joined,
            },
            score,
            latency_ms: 10,
        }
    }

    /// A cache with `n` gateways in valid ranking order.
    fn cache_of(n: usize) -> GatewayCache {
        GatewayCache {
            source_hash: format!("hash-{n}"),
            gateways: (0..n)
                .map(|i| ranked(&format!("gw{i:03}.example"), 1.0 - i as f64 * 0.001))
                .collect(),
            ..GatewayCache::default()
        }
    }

    /// Storage whose writes can be switched to fail.
    #[derive(Default)]
    struct FlakyStorage {
        inner: MemoryStorage,
        fail_writes: AtomicBool,
    }

    impl DocumentStorage for FlakyStorage {
        fn load(&self, key: &str) -> StateResult<Option<Vec<u8>>> {
            self.inner.load(key)
        }

        fn store(&self, key: &str, value: &[u8]) -> StateResult<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StateError::Write("disk full".to_string()));
            }
            self.inner.store(key, value)
        }
    }

    /// Storage whose reads always fail.
    struct UnreadableStorage;

    impl DocumentStorage for UnreadableStorage {
        fn load(&self, _key: &str) -> StateResult<Option<Vec<u8>>> {
            Err(StateError::Read("io error".to_string()))
        }

        fn store(&self, _key: &str, _value: &[u8]) -> StateResult<()> {
            Ok(())
        }
    }

    #[test]
    fn starts_empty() {
        let store = CacheStore::open(Arc::new(MemoryStorage::new()));
        let snap = store.get();
        assert!(snap.is_empty());
        assert_eq!(snap.version, 0);
    }

    #[test]
    fn set_bumps_version_and_replaces() {
        let store = CacheStore::open(Arc::new(MemoryStorage::new()));

        let first = store.set(cache_of(2)).unwrap();
        assert_eq!(first.version, 1);
        assert!(first.built_at_ms > 0);

        let second = store.set(cache_of(3)).unwrap();
        assert_eq!(second.version, 2);
        assert_eq!(store.get().len(), 3);
        assert_eq!(store.get().source_hash, "hash-3");
    }

    #[test]
    fn old_snapshot_survives_replace_for_holders() {
        let store = CacheStore::open(Arc::new(MemoryStorage::new()));
        store.set(cache_of(1)).unwrap();

        let held = store.get();
        store.set(cache_of(4)).unwrap();

        assert_eq!(held.len(), 1);
        assert_eq!(store.get().len(), 4);
    }

    #[test]
    fn failed_write_leaves_snapshot_untouched() {
        let storage = Arc::new(FlakyStorage::default());
        let store = CacheStore::open(storage.clone());
        store.set(cache_of(2)).unwrap();

        storage.fail_writes.store(true, Ordering::SeqCst);
        let err = store.set(cache_of(5)).unwrap_err();
        assert!(matches!(err, StateError::Write(_)));

        let snap = store.get();
        assert_eq!(snap.version, 1);
        assert_eq!(snap.len(), 2);

        // The persisted copy is also the old one.
        let reopened = CacheStore::open(storage.clone());
        assert_eq!(reopened.get().version, 1);
    }

    #[test]
    fn rejects_inconsistent_cache() {
        let store = CacheStore::open(Arc::new(MemoryStorage::new()));
        let unsorted = GatewayCache {
            gateways: vec![ranked("a", 0.1), ranked("b", 0.9)],
            ..GatewayCache::default()
        };
        assert!(matches!(store.set(unsorted), Err(StateError::Inconsistent(_))));
        assert!(store.get().is_empty());
    }

    #[test]
    fn unreadable_storage_opens_empty() {
        let store = CacheStore::open(Arc::new(UnreadableStorage));
        assert!(store.get().is_empty());
    }

    #[test]
    fn corrupt_document_opens_empty() {
        let storage = Arc::new(MemoryStorage::new());
        storage.store(CACHE_KEY, b"{not json").unwrap();
        let store = CacheStore::open(storage);
        assert!(store.get().is_empty());
    }

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("cache.redb");

        {
            let storage = RedbStorage::open(&db_path).unwrap();
            let store = CacheStore::open(Arc::new(storage));
            store.set(cache_of(2)).unwrap();
            store.set(cache_of(3)).unwrap();
        }

        let storage = RedbStorage::open(&db_path).unwrap();
        let store = CacheStore::open(Arc::new(storage));
        let snap = store.get();
        assert_eq!(snap.version, 2);
        assert_eq!(snap.len(), 3);

        // Versions keep increasing across restarts.
        assert_eq!(store.set(cache_of(1)).unwrap().version, 3);
    }

    #[test]
    fn concurrent_readers_never_see_partial_writes() {
        let store = CacheStore::open(Arc::new(RedbStorage::open_in_memory().unwrap()));
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                let done = done.clone();
                std::thread::spawn(move || {
                    while !done.load(Ordering::SeqCst) {
                        let snap = store.get();
                        // Version n was written with exactly n gateways.
                        assert_eq!(snap.len() as u64, snap.version);
                        assert!(snap.is_consistent());
                    }
                })
            })
            .collect();

        for n in 1..=50 {
            store.set(cache_of(n)).unwrap();
        }
        done.store(true, Ordering::SeqCst);
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(store.get().version, 50);
    }
}
