//! Synchronous cache storage over an asynchronous key-value store.

use crate::backend::KeyValueStore;
use crate::config::StorageConfig;
use crate::entry::CacheEntry;
use crate::error::{Error, Result};
use crate::key::KeyBuilder;
use crate::observability::{NoOpMetrics, OperationKind, StorageMetrics};
use crate::status::StatusCache;
use crate::wait::{Outcome, Waiter};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

/// Shared half of the adapter: the store client, configuration and the
/// runtime that drives store futures.
///
/// Cheap to clone and safe to share between threads. Callers do not use it
/// directly for cache operations; each worker thread asks for its own
/// [`StorageWorker`].
///
/// # Example
///
/// ```ignore
/// use cache_bridge::{backend::InMemoryStore, CacheStorage, HttpCacheEntry, StorageConfig};
///
/// let runtime = tokio::runtime::Runtime::new()?;
/// let storage = CacheStorage::new(
///     InMemoryStore::new(),
///     StorageConfig::default(),
///     runtime.handle().clone(),
/// )?;
///
/// std::thread::spawn(move || {
///     let mut worker = storage.worker();
///     worker.put("k1", &HttpCacheEntry::new(200, "OK", b"hi".to_vec()))?;
///     let cached: Option<HttpCacheEntry> = worker.get("k1")?;
///     Ok::<_, cache_bridge::Error>(())
/// });
/// ```
pub struct CacheStorage<S: KeyValueStore> {
    pub(crate) store: Arc<S>,
    pub(crate) config: StorageConfig,
    pub(crate) keys: KeyBuilder,
    pub(crate) waiter: Waiter,
    pub(crate) metrics: Arc<dyn StorageMetrics>,
}

impl<S: KeyValueStore> Clone for CacheStorage<S> {
    fn clone(&self) -> Self {
        CacheStorage {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
            keys: self.keys.clone(),
            waiter: self.waiter.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<S: KeyValueStore> CacheStorage<S> {
    /// Create storage over `store`.
    ///
    /// `runtime` must be a handle to a multi-thread tokio runtime, and the
    /// synchronous operations must be called from threads outside it.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if `config` fails validation.
    pub fn new(store: S, config: StorageConfig, runtime: Handle) -> Result<Self> {
        config.validate()?;

        let metrics: Arc<dyn StorageMetrics> = Arc::new(NoOpMetrics);
        let waiter = Waiter::new(runtime, config.operation_timeout, Arc::clone(&metrics));

        info!(
            "✓ Cache storage ready (max update retries: {}, timeout: {:?}, namespace: {:?})",
            config.max_update_retries,
            waiter.timeout(),
            config.namespace
        );

        Ok(CacheStorage {
            store: Arc::new(store),
            keys: KeyBuilder::new(config.namespace.clone()),
            config,
            waiter,
            metrics,
        })
    }

    /// Set custom metrics handler.
    pub fn with_metrics(mut self, metrics: Arc<dyn StorageMetrics>) -> Self {
        self.waiter = Waiter::new(
            self.waiter.runtime(),
            self.config.operation_timeout,
            Arc::clone(&metrics),
        );
        self.metrics = metrics;
        self
    }

    /// A new worker with an empty presence memo and a fresh cancellation token.
    pub fn worker(&self) -> StorageWorker<S> {
        StorageWorker {
            status: StatusCache::new(self.config.status_capacity),
            cancel: CancellationToken::new(),
            storage: self.clone(),
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Get store reference (for advanced use).
    pub fn store(&self) -> &S {
        &self.store
    }
}

/// Per-worker handle performing cache operations.
///
/// Owns the worker's private presence memo and its cancellation token. Every
/// method blocks the calling thread until the store answers, the configured
/// timeout elapses, or the token is cancelled. Timeouts and cancellation are
/// never reported as errors.
///
/// `put` and `remove` update the memo even when the store did not confirm in
/// time: the request was sent, and read-after-write locality on this worker
/// is preferred over strict accuracy. A cancelled `remove` leaves the memo
/// alone, since its request may never have been issued.
pub struct StorageWorker<S: KeyValueStore> {
    pub(crate) storage: CacheStorage<S>,
    pub(crate) status: StatusCache,
    pub(crate) cancel: CancellationToken,
}

impl<S: KeyValueStore> StorageWorker<S> {
    /// Store `entry` under `key`, replacing whatever is there.
    ///
    /// # Errors
    /// Returns `Err` if the entry cannot be encoded or the store reports a failure.
    pub fn put<T: CacheEntry>(&mut self, key: &str, entry: &T) -> Result<()> {
        let store_key = self.storage.keys.build(key);
        trace!("putEntry {}", store_key);

        let bytes = entry.encode()?;
        let outcome = self.storage.waiter.wait(
            OperationKind::Put,
            &store_key,
            &self.cancel,
            self.storage.store.put(&store_key, bytes),
        );
        if let Outcome::Failed(err) = outcome {
            return Err(err);
        }

        self.status.record(&store_key, true);
        Ok(())
    }

    /// Read the entry under `key`.
    ///
    /// Returns `None` without a round trip when this worker last saw the key
    /// absent. A read that times out or is cancelled also returns `None`,
    /// but is not remembered as a miss.
    ///
    /// # Errors
    /// Returns `Err` if the store reports a failure or the stored bytes are
    /// corrupt. Entries written under another schema version read as `None`.
    pub fn get<T: CacheEntry>(&mut self, key: &str) -> Result<Option<T>> {
        let store_key = self.storage.keys.build(key);
        trace!("getEntry {}", store_key);

        if self.status.is_known_absent(&store_key) {
            debug!("✓ {} known absent on this worker, skipping store", store_key);
            self.storage.metrics.record_status_hit(&store_key);
            return Ok(None);
        }

        let outcome = self.storage.waiter.wait(
            OperationKind::Get,
            &store_key,
            &self.cancel,
            self.storage.store.get(&store_key),
        );

        match outcome {
            Outcome::Value(bytes) => {
                let entry = match bytes {
                    Some(bytes) => decode_entry::<T>(&store_key, &bytes)?,
                    None => None,
                };
                self.status.record(&store_key, entry.is_some());
                Ok(entry)
            }
            Outcome::TimedOut | Outcome::Cancelled => Ok(None),
            Outcome::Failed(err) => Err(err),
        }
    }

    /// Delete the entry under `key`. Deleting an absent key is not an error.
    ///
    /// # Errors
    /// Returns `Err` if the store reports a failure.
    pub fn remove(&mut self, key: &str) -> Result<()> {
        let store_key = self.storage.keys.build(key);
        trace!("removeEntry {}", store_key);

        let outcome = self.storage.waiter.wait(
            OperationKind::Delete,
            &store_key,
            &self.cancel,
            self.storage.store.delete(&store_key),
        );
        match outcome {
            Outcome::Failed(err) => return Err(err),
            // A delete that was never polled must not leave a false "absent".
            Outcome::Cancelled => return Ok(()),
            Outcome::Value(_) | Outcome::TimedOut => {}
        }

        self.status.record(&store_key, false);
        Ok(())
    }

    /// Handle that cancels this worker's in-flight and future waits.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Clear a previous cancellation so the worker can issue calls again.
    /// Tokens handed out earlier stay cancelled and no longer affect it.
    pub fn reset_cancellation(&mut self) {
        self.cancel = CancellationToken::new();
    }

    /// This worker's presence memo.
    pub fn status(&self) -> &StatusCache {
        &self.status
    }

    pub fn storage(&self) -> &CacheStorage<S> {
        &self.storage
    }
}

/// Decode stored bytes. Entries from another schema version read as absent.
pub(crate) fn decode_entry<T: CacheEntry>(key: &str, bytes: &[u8]) -> Result<Option<T>> {
    match T::decode(bytes) {
        Ok(entry) => Ok(Some(entry)),
        Err(Error::VersionMismatch { expected, found }) => {
            warn!(
                "Ignoring entry {} written with schema v{} (expected v{})",
                key, found, expected
            );
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryStore;
    use crate::entry::HttpCacheEntry;
    use crate::serialization::serialize_for_cache;
    use std::time::Duration;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .expect("Failed to build runtime")
    }

    fn entry(body: &str) -> HttpCacheEntry {
        HttpCacheEntry::new(200, "OK", body.as_bytes().to_vec())
            .with_header("Content-Type", "text/html")
    }

    #[test]
    fn test_put_then_get() {
        let rt = runtime();
        let storage = CacheStorage::new(
            InMemoryStore::new(),
            StorageConfig::default(),
            rt.handle().clone(),
        )
        .expect("Failed to create storage");
        let mut worker = storage.worker();

        let stored = entry("<p>hello</p>");
        worker.put("k1", &stored).expect("Failed to put");

        let read: Option<HttpCacheEntry> = worker.get("k1").expect("Failed to get");
        assert_eq!(read, Some(stored));
        assert_eq!(worker.status().lookup("k1"), Some(true));
    }

    #[test]
    fn test_remove_then_get() {
        let rt = runtime();
        let storage = CacheStorage::new(
            InMemoryStore::new(),
            StorageConfig::default(),
            rt.handle().clone(),
        )
        .expect("Failed to create storage");
        let mut worker = storage.worker();

        worker.put("k1", &entry("x")).expect("Failed to put");
        worker.remove("k1").expect("Failed to remove");
        // removing again is fine
        worker.remove("k1").expect("Failed to remove");

        let read: Option<HttpCacheEntry> = worker.get("k1").expect("Failed to get");
        assert!(read.is_none());
        assert_eq!(worker.status().lookup("k1"), Some(false));
    }

    #[test]
    fn test_workers_do_not_share_status() {
        let rt = runtime();
        let storage = CacheStorage::new(
            InMemoryStore::new(),
            StorageConfig::default(),
            rt.handle().clone(),
        )
        .expect("Failed to create storage");
        let mut first = storage.worker();
        let mut second = storage.worker();

        first.remove("k1").expect("Failed to remove");
        second.put("k1", &entry("fresh")).expect("Failed to put");

        // first's memo still says absent; it only trusts its own observations
        let stale: Option<HttpCacheEntry> = first.get("k1").expect("Failed to get");
        assert!(stale.is_none());

        let seen: Option<HttpCacheEntry> = second.get("k1").expect("Failed to get");
        assert_eq!(seen.map(|e| e.body), Some(b"fresh".to_vec()));
    }

    #[test]
    fn test_namespace_applied_to_store_keys() {
        let rt = runtime();
        let store = InMemoryStore::new();
        let storage = CacheStorage::new(
            store.clone(),
            StorageConfig::default().with_namespace("proxy"),
            rt.handle().clone(),
        )
        .expect("Failed to create storage");
        let mut worker = storage.worker();

        worker.put("k1", &entry("x")).expect("Failed to put");

        let raw = rt
            .block_on(store.get("proxy:k1"))
            .expect("Failed to read store");
        assert!(raw.is_some());
        assert!(rt.block_on(store.get("k1")).expect("Failed to read store").is_none());
    }

    #[test]
    fn test_other_schema_version_reads_as_miss() {
        let rt = runtime();
        let store = InMemoryStore::new();
        let mut bytes = serialize_for_cache(&entry("old")).expect("Failed to serialize");
        bytes[4..8].copy_from_slice(&99u32.to_le_bytes());
        rt.block_on(store.put("k1", bytes)).expect("Failed to seed store");

        let storage = CacheStorage::new(store, StorageConfig::default(), rt.handle().clone())
            .expect("Failed to create storage");
        let mut worker = storage.worker();

        let read: Option<HttpCacheEntry> = worker.get("k1").expect("Failed to get");
        assert!(read.is_none());
    }

    #[test]
    fn test_corrupt_entry_is_an_error() {
        let rt = runtime();
        let store = InMemoryStore::new();
        rt.block_on(store.put("k1", b"garbage".to_vec())).expect("Failed to seed store");

        let storage = CacheStorage::new(store, StorageConfig::default(), rt.handle().clone())
            .expect("Failed to create storage");
        let mut worker = storage.worker();

        let result: Result<Option<HttpCacheEntry>> = worker.get("k1");
        assert!(matches!(result, Err(Error::InvalidCacheEntry(_))));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let rt = runtime();
        let result = CacheStorage::new(
            InMemoryStore::new(),
            StorageConfig::default().with_max_update_retries(0),
            rt.handle().clone(),
        );
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_waiter_keeps_configured_timeout() {
        let rt = runtime();
        let limit = Some(Duration::from_millis(250));
        let storage = CacheStorage::new(
            InMemoryStore::new(),
            StorageConfig::default().with_operation_timeout(limit),
            rt.handle().clone(),
        )
        .expect("Failed to create storage");
        assert_eq!(storage.waiter.timeout(), limit);

        let storage = storage.with_metrics(Arc::new(NoOpMetrics));
        assert_eq!(storage.waiter.timeout(), limit);
    }

    #[test]
    fn test_cancelled_worker_get_returns_none_without_memo() {
        let rt = runtime();
        let storage = CacheStorage::new(
            InMemoryStore::new(),
            StorageConfig::default().with_operation_timeout(Some(Duration::from_millis(100))),
            rt.handle().clone(),
        )
        .expect("Failed to create storage");
        let mut writer = storage.worker();
        writer.put("k1", &entry("x")).expect("Failed to put");

        let mut worker = storage.worker();
        worker.cancellation_token().cancel();

        let read: Option<HttpCacheEntry> = worker.get("k1").expect("Failed to get");
        assert!(read.is_none());
        assert!(worker.is_cancelled());
        assert_eq!(worker.status().lookup("k1"), None);

        worker.reset_cancellation();
        assert!(!worker.is_cancelled());
        let read: Option<HttpCacheEntry> = worker.get("k1").expect("Failed to get");
        assert!(read.is_some());
    }

    #[test]
    fn test_cancelled_remove_leaves_memo_and_entry() {
        let rt = runtime();
        let storage = CacheStorage::new(
            InMemoryStore::new(),
            StorageConfig::default(),
            rt.handle().clone(),
        )
        .expect("Failed to create storage");
        let mut writer = storage.worker();
        writer.put("k1", &entry("x")).expect("Failed to put");

        let mut worker = storage.worker();
        worker.cancellation_token().cancel();
        worker.remove("k1").expect("cancellation is not an error");
        assert_eq!(worker.status().lookup("k1"), None);

        worker.reset_cancellation();
        let read: Option<HttpCacheEntry> = worker.get("k1").expect("Failed to get");
        assert_eq!(read, Some(entry("x")));
    }
}
