//! Key-Value Storage Abstraction
//!
//! The core persists everything (favorite lists, play history, lyric offsets,
//! settings) as JSON text under string keys. Hosts back this with whatever
//! on-device store they have: AsyncStorage, SharedPreferences, SQLite.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::error::Result;

/// Asynchronous string-keyed store.
///
/// Values are opaque to the store; callers serialize before writing.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    async fn remove_key(&self, key: &str) -> Result<()>;

    async fn list_all_keys(&self) -> Result<Vec<String>>;

    /// Fetch several keys at once. Missing keys come back as `None`, in the
    /// same order as requested.
    async fn multi_get(&self, keys: &[String]) -> Result<Vec<(String, Option<String>)>> {
        let mut pairs = Vec::with_capacity(keys.len());
        for key in keys {
            pairs.push((key.clone(), self.get_string(key).await?));
        }
        Ok(pairs)
    }

    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.get_string(key).await?.is_some())
    }
}

/// Process-local store, handy for tests and for hosts that persist elsewhere.
///
/// Counts writes so callers can assert that an operation left storage alone.
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    entries: RwLock<BTreeMap<String, String>>,
    writes: AtomicUsize,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set_string`/`remove_key` calls served so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_key(&self, key: &str) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn list_all_keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }
}
