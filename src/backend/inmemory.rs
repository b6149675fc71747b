//! In-memory key-value store with versioned writes.

use super::{KeyValueStore, VersionToken, VersionedEntry};
use crate::error::Result;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct Slot {
    version: u64,
    value: Vec<u8>,
}

/// Process-local store backed by `DashMap`.
///
/// Clones share the same data. Versions come from one store-wide counter,
/// so a key that is deleted and re-created never reuses an old version.
///
/// # Example
///
/// ```
/// # use cache_bridge::backend::{InMemoryStore, KeyValueStore};
/// # async fn example() -> cache_bridge::Result<()> {
/// let store = InMemoryStore::new();
/// store.put("k", b"v".to_vec()).await?;
/// assert_eq!(store.get("k").await?, Some(b"v".to_vec()));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct InMemoryStore {
    slots: Arc<DashMap<String, Slot>>,
    next_version: Arc<AtomicU64>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore::default()
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.slots.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drop every key.
    pub async fn clear(&self) {
        self.slots.clear();
        warn!("⚠ InMemory store cleared");
    }

    fn bump(&self) -> u64 {
        self.next_version.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl KeyValueStore for InMemoryStore {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let version = self.bump();
        self.slots.insert(key.to_string(), Slot { version, value });
        debug!("✓ InMemory PUT {} (v{})", key, version);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value = self.slots.get(key).map(|slot| slot.value.clone());
        debug!(
            "✓ InMemory GET {} -> {}",
            key,
            if value.is_some() { "HIT" } else { "MISS" }
        );
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let removed = self.slots.remove(key).is_some();
        debug!("✓ InMemory DELETE {} (removed: {})", key, removed);
        Ok(removed)
    }

    async fn get_versioned(&self, key: &str) -> Result<Option<VersionedEntry>> {
        Ok(self.slots.get(key).map(|slot| {
            VersionedEntry::new(slot.value.clone(), VersionToken::new(slot.version))
        }))
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        token: VersionToken,
        value: Option<Vec<u8>>,
    ) -> Result<bool> {
        let expected = token.get();

        let Some(value) = value else {
            let removed = self
                .slots
                .remove_if(key, |_, slot| slot.version == expected)
                .is_some();
            debug!("✓ InMemory CAS-DELETE {} (v{}) -> {}", key, expected, removed);
            return Ok(removed);
        };

        // The shard write lock is held for the whole check-and-write.
        let stored = match self.slots.get_mut(key) {
            Some(mut slot) if slot.version == expected => {
                slot.version = self.bump();
                slot.value = value;
                true
            }
            _ => false,
        };
        debug!("✓ InMemory CAS {} (v{}) -> {}", key, expected, stored);
        Ok(stored)
    }
}
