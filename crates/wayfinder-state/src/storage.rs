//! Persistent storage collaborator — whole-document get/set under a key.
//!
//! Implementations must make `store` atomic: a concurrent or later `load`
//! sees either the previous document or the new one, never a mix.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::DOCUMENTS;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Durable key → document storage.
pub trait DocumentStorage: Send + Sync {
    /// Read the document stored under `key`, if any.
    fn load(&self, key: &str) -> StateResult<Option<Vec<u8>>>;

    /// Atomically replace the document stored under `key`.
    fn store(&self, key: &str, value: &[u8]) -> StateResult<()>;
}

/// Storage backed by a redb database. Clone + Send + Sync.
#[derive(Clone)]
pub struct RedbStorage {
    db: Arc<Database>,
}

impl RedbStorage {
    /// Open (or create) a persistent database at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let storage = Self { db: Arc::new(db) };
        storage.ensure_tables()?;
        debug!(?path, "document storage opened");
        Ok(storage)
    }

    /// Create an ephemeral in-memory database (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let storage = Self { db: Arc::new(db) };
        storage.ensure_tables()?;
        debug!("in-memory document storage opened");
        Ok(storage)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(DOCUMENTS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }
}

impl DocumentStorage for RedbStorage {
    fn load(&self, key: &str) -> StateResult<Option<Vec<u8>>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(DOCUMENTS).map_err(map_err!(Table))?;
        let value = table.get(key).map_err(map_err!(Read))?;
        Ok(value.map(|guard| guard.value().to_vec()))
    }

    fn store(&self, key: &str, value: &[u8]) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(DOCUMENTS).map_err(map_err!(Table))?;
            table.insert(key, value).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, bytes = value.len(), "document stored");
        Ok(())
    }
}

/// Process-local storage for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStorage {
    documents: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStorage for MemoryStorage {
    fn load(&self, key: &str) -> StateResult<Option<Vec<u8>>> {
        let documents = self
            .documents
            .lock()
            .map_err(|_| StateError::Read("memory storage lock poisoned".to_string()))?;
        Ok(documents.get(key).cloned())
    }

    fn store(&self, key: &str, value: &[u8]) -> StateResult<()> {
        let mut documents = self
            .documents
            .lock()
            .map_err(|_| StateError::Write("memory storage lock poisoned".to_string()))?;
        documents.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}
