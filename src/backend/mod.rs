//! Backing store abstraction and implementations.
//!
//! The adapter consumes a remote key-value store through [`KeyValueStore`].
//! Every operation is asynchronous; the futures it returns are the
//! "pending operations" the adapter waits on with a bounded timeout.

use crate::error::Result;

#[cfg(feature = "inmemory")]
mod inmemory;
#[cfg(feature = "redis")]
mod redis;

#[cfg(feature = "inmemory")]
pub use inmemory::InMemoryStore;
#[cfg(feature = "redis")]
pub use self::redis::{RedisConfig, RedisStore};

/// Opaque version issued by the store with a versioned read.
///
/// Not `Clone`: [`KeyValueStore::compare_and_swap`] takes it by value, so a
/// token can back at most one conditional write.
#[derive(Debug, PartialEq, Eq)]
pub struct VersionToken(u64);

impl VersionToken {
    /// Wrap a store-native version. Only store implementations should call this.
    pub fn new(version: u64) -> Self {
        VersionToken(version)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

/// Entry bytes paired with the version they were read at.
#[derive(Debug)]
pub struct VersionedEntry {
    pub value: Vec<u8>,
    pub token: VersionToken,
}

impl VersionedEntry {
    pub fn new(value: Vec<u8>, token: VersionToken) -> Self {
        VersionedEntry { value, token }
    }

    pub fn into_parts(self) -> (Vec<u8>, VersionToken) {
        (self.value, self.token)
    }
}

/// Asynchronous key-value store with optimistic versioning.
///
/// Implementations must be safe to share between many workers. A successful
/// write of any kind must make every previously issued token for that key
/// stale.
#[allow(async_fn_in_trait)]
pub trait KeyValueStore: Send + Sync {
    /// Unconditionally store `value` under `key`.
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Read the value under `key`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Remove `key`. Returns whether something was removed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Read the value under `key` together with its current version.
    async fn get_versioned(&self, key: &str) -> Result<Option<VersionedEntry>>;

    /// Store `value` only if `key` is still at the version `token` was read
    /// at. `None` conditionally deletes. Returns `false` if the token is stale.
    async fn compare_and_swap(
        &self,
        key: &str,
        token: VersionToken,
        value: Option<Vec<u8>>,
    ) -> Result<bool>;
}

impl<S: KeyValueStore> KeyValueStore for std::sync::Arc<S> {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        (**self).put(key, value).await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        (**self).delete(key).await
    }

    async fn get_versioned(&self, key: &str) -> Result<Option<VersionedEntry>> {
        (**self).get_versioned(key).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        token: VersionToken,
        value: Option<Vec<u8>>,
    ) -> Result<bool> {
        (**self).compare_and_swap(key, token, value).await
    }
}
