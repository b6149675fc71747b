//! # cache-bridge
//!
//! Synchronous cache storage over asynchronous key-value stores.
//!
//! ## Features
//!
//! - **Blocking Surface:** `put`, `get`, `remove` and `update_entry` for callers that
//!   cannot be async, backed by any async store implementing `KeyValueStore`
//! - **Bounded Waits:** Every store call is capped by a configurable timeout; timeouts
//!   and cancellation degrade to "no result" instead of errors
//! - **Lock-Free Updates:** `update_entry` reads a versioned entry, applies your
//!   transform and writes back with compare-and-swap, retrying a bounded number of times
//! - **Per-Worker Memo:** Each worker remembers keys it just saw absent and skips
//!   the redundant round trip
//! - **Backend Agnostic:** In-memory and Redis stores included
//!
//! ## Quick Start
//!
//! ```ignore
//! use cache_bridge::{backend::InMemoryStore, CacheStorage, HttpCacheEntry, StorageConfig};
//!
//! // 1. A multi-thread runtime drives the store; callers stay synchronous
//! let runtime = tokio::runtime::Runtime::new()?;
//!
//! // 2. Shared storage
//! let storage = CacheStorage::new(
//!     InMemoryStore::new(),
//!     StorageConfig::from_env()?,
//!     runtime.handle().clone(),
//! )?;
//!
//! // 3. One worker per thread
//! let mut worker = storage.worker();
//! worker.put("https://example.com/", &HttpCacheEntry::new(200, "OK", body))?;
//! let cached: Option<HttpCacheEntry> = worker.get("https://example.com/")?;
//! ```

#[macro_use]
extern crate log;

pub mod backend;
pub mod config;
pub mod entry;
pub mod error;
pub mod key;
pub mod observability;
pub mod serialization;
pub mod status;
pub mod storage;
mod update;
pub mod wait;

// Re-exports for convenience
pub use backend::{KeyValueStore, VersionToken, VersionedEntry};
pub use config::{StorageConfig, TimedOutRead};
pub use entry::{CacheEntry, HttpCacheEntry};
pub use error::{Error, Result};
pub use status::StatusCache;
pub use storage::{CacheStorage, StorageWorker};
pub use wait::Outcome;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
