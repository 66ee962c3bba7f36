// src/client/memory.rs
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::RemoteClient;
use crate::content::Stamp;
use crate::error::ClientError;

#[derive(Debug, Default)]
struct Store {
    revision: i64,
    entries: HashMap<String, (String, i64)>,
    unreachable: bool,
}

/// In-process key-value store with etcd revision semantics: every write bumps
/// one store-wide revision and stamps the written key with it.
///
/// Clones share the same store, so a test can keep a handle and mutate the
/// data behind a source that owns another clone.
#[derive(Debug, Clone, Default)]
pub struct MemoryClient {
    inner: Arc<RwLock<Store>>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`; returns the new revision.
    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) -> Stamp {
        let mut store = self.write();
        store.revision += 1;
        let rev = store.revision;
        store.entries.insert(key.into(), (value.into(), rev));
        Stamp::new(rev)
    }

    /// Remove `key`; the store revision moves on even if nothing was deleted.
    pub fn delete(&self, key: &str) -> bool {
        let mut store = self.write();
        store.revision += 1;
        store.entries.remove(key).is_some()
    }

    /// Simulate a network partition: every call fails until reset.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.write().unreachable = unreachable;
    }

    pub fn current_revision(&self) -> Stamp {
        Stamp::new(self.read().revision)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Store> {
        // A poisoned lock only means a writer panicked mid-test; the map is still usable.
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Store> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    fn lookup(&self, key: &str) -> Result<Option<(String, i64)>, ClientError> {
        let store = self.read();
        if store.unreachable {
            return Err(ClientError::Unavailable("memory store marked unreachable".into()));
        }
        Ok(store.entries.get(key).cloned())
    }
}

#[async_trait]
impl RemoteClient for MemoryClient {
    async fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
        Ok(self.lookup(key)?.map(|(v, _)| v))
    }

    async fn revision(&self, key: &str) -> Result<Stamp, ClientError> {
        self.lookup(key)?
            .map(|(_, rev)| Stamp::new(rev))
            .ok_or_else(|| ClientError::KeyNotFound(key.to_string()))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
