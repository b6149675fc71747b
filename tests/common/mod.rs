//! Shared fixtures for integration tests.

#![allow(dead_code)]

use cache_bridge::backend::InMemoryStore;
use cache_bridge::{
    CacheEntry, CacheStorage, Error, KeyValueStore, Result, StorageConfig, VersionToken,
    VersionedEntry,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Counter {
    pub value: u64,
}

impl CacheEntry for Counter {}

pub fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("Failed to build runtime")
}

pub fn storage<S: KeyValueStore>(
    rt: &tokio::runtime::Runtime,
    store: S,
    config: StorageConfig,
) -> CacheStorage<S> {
    CacheStorage::new(store, config, rt.handle().clone()).expect("Failed to create storage")
}

/// Counts every call and remembers which tokens backed a successful swap.
#[derive(Default)]
pub struct CountingStore {
    pub inner: InMemoryStore,
    pub puts: AtomicUsize,
    pub gets: AtomicUsize,
    pub deletes: AtomicUsize,
    pub versioned_reads: AtomicUsize,
    pub swaps: AtomicUsize,
    pub winning_tokens: Mutex<Vec<u64>>,
}

impl CountingStore {
    pub fn over(inner: InMemoryStore) -> Self {
        CountingStore {
            inner,
            ..Default::default()
        }
    }

    pub fn total_calls(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
            + self.gets.load(Ordering::SeqCst)
            + self.deletes.load(Ordering::SeqCst)
            + self.versioned_reads.load(Ordering::SeqCst)
            + self.swaps.load(Ordering::SeqCst)
    }

    pub fn winning_tokens_unique(&self) -> bool {
        let tokens = self.winning_tokens.lock().expect("Failed to lock");
        tokens.iter().collect::<HashSet<_>>().len() == tokens.len()
    }
}

impl KeyValueStore for CountingStore {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(key, value).await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(key).await
    }

    async fn get_versioned(&self, key: &str) -> Result<Option<VersionedEntry>> {
        self.versioned_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get_versioned(key).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        token: VersionToken,
        value: Option<Vec<u8>>,
    ) -> Result<bool> {
        self.swaps.fetch_add(1, Ordering::SeqCst);
        let version = token.get();
        let stored = self.inner.compare_and_swap(key, token, value).await?;
        if stored {
            self.winning_tokens
                .lock()
                .expect("Failed to lock")
                .push(version);
        }
        Ok(stored)
    }
}

/// Reads work; every conditional write loses.
#[derive(Default)]
pub struct ContendedStore {
    pub inner: InMemoryStore,
    pub versioned_reads: AtomicUsize,
    pub swaps: AtomicUsize,
}

impl KeyValueStore for ContendedStore {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.inner.put(key, value).await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.inner.delete(key).await
    }

    async fn get_versioned(&self, key: &str) -> Result<Option<VersionedEntry>> {
        self.versioned_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get_versioned(key).await
    }

    async fn compare_and_swap(
        &self,
        _key: &str,
        _token: VersionToken,
        _value: Option<Vec<u8>>,
    ) -> Result<bool> {
        self.swaps.fetch_add(1, Ordering::SeqCst);
        Ok(false)
    }
}

/// Which calls never resolve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stall {
    Everything,
    VersionedReads,
    Swaps,
}

/// Store whose selected calls hang forever; the rest go to an in-memory store.
pub struct StalledStore {
    pub inner: InMemoryStore,
    pub stall: Stall,
    pub calls: AtomicUsize,
    pub versioned_reads: AtomicUsize,
    pub swaps: AtomicUsize,
}

impl StalledStore {
    pub fn new(inner: InMemoryStore, stall: Stall) -> Self {
        StalledStore {
            inner,
            stall,
            calls: AtomicUsize::new(0),
            versioned_reads: AtomicUsize::new(0),
            swaps: AtomicUsize::new(0),
        }
    }

    async fn hang_if(&self, stalls: bool) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if stalls {
            std::future::pending::<()>().await;
        }
    }
}

impl KeyValueStore for StalledStore {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.hang_if(self.stall == Stall::Everything).await;
        self.inner.put(key, value).await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.hang_if(self.stall == Stall::Everything).await;
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.hang_if(self.stall == Stall::Everything).await;
        self.inner.delete(key).await
    }

    async fn get_versioned(&self, key: &str) -> Result<Option<VersionedEntry>> {
        self.versioned_reads.fetch_add(1, Ordering::SeqCst);
        self.hang_if(matches!(self.stall, Stall::Everything | Stall::VersionedReads)).await;
        self.inner.get_versioned(key).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        token: VersionToken,
        value: Option<Vec<u8>>,
    ) -> Result<bool> {
        self.swaps.fetch_add(1, Ordering::SeqCst);
        self.hang_if(matches!(self.stall, Stall::Everything | Stall::Swaps)).await;
        self.inner.compare_and_swap(key, token, value).await
    }
}

/// Every call fails like an unreachable server.
#[derive(Default)]
pub struct FailingStore {
    pub calls: AtomicUsize,
}

impl FailingStore {
    fn fail<T>(&self, operation: &'static str, key: &str) -> Result<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::backend(
            operation,
            key,
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused"),
        ))
    }
}

impl KeyValueStore for FailingStore {
    async fn put(&self, key: &str, _value: Vec<u8>) -> Result<()> {
        self.fail("put", key)
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.fail("get", key)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.fail("delete", key)
    }

    async fn get_versioned(&self, key: &str) -> Result<Option<VersionedEntry>> {
        self.fail("get_versioned", key)
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        _token: VersionToken,
        _value: Option<Vec<u8>>,
    ) -> Result<bool> {
        self.fail("compare_and_swap", key)
    }
}
