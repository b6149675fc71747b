//! Entry trait for values stored through the adapter, plus a ready-made
//! HTTP response entry.

use crate::error::Result;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Trait that all values stored through [`StorageWorker`](crate::StorageWorker)
/// must implement.
///
/// The adapter treats entries as opaque; this trait is the seam where they
/// become bytes. The defaults use the postcard envelope from
/// [`crate::serialization`]; override both methods to plug in another encoding.
///
/// # Example
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use cache_bridge::CacheEntry;
///
/// #[derive(Clone, Serialize, Deserialize)]
/// pub struct RewrittenStylesheet {
///     pub url: String,
///     pub css: String,
/// }
///
/// impl CacheEntry for RewrittenStylesheet {}
/// ```
pub trait CacheEntry: Serialize + DeserializeOwned + Send {
    /// Encode the entry for the backing store.
    fn encode(&self) -> Result<Vec<u8>> {
        crate::serialization::serialize_for_cache(self)
    }

    /// Decode an entry read from the backing store.
    fn decode(bytes: &[u8]) -> Result<Self> {
        crate::serialization::deserialize_from_cache(bytes)
    }
}

/// A cached HTTP response: status line, headers, body and the timing
/// metadata a caching proxy needs for freshness decisions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpCacheEntry {
    pub status: u16,
    pub reason: String,
    /// Header order is preserved; names may repeat.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Milliseconds since the epoch when the request was sent.
    pub request_date: u64,
    /// Milliseconds since the epoch when the response arrived.
    pub response_date: u64,
    /// Variant key → cache key of the stored variant (for `Vary` handling).
    pub variants: BTreeMap<String, String>,
}

impl HttpCacheEntry {
    /// New entry stamped with the current time for both dates.
    pub fn new(status: u16, reason: impl Into<String>, body: Vec<u8>) -> Self {
        let now = now_millis();
        HttpCacheEntry {
            status,
            reason: reason.into(),
            headers: Vec::new(),
            body,
            request_date: now,
            response_date: now,
            variants: BTreeMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_variant(
        mut self,
        variant_key: impl Into<String>,
        cache_key: impl Into<String>,
    ) -> Self {
        self.variants.insert(variant_key.into(), cache_key.into());
        self
    }

    /// First header value with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has_variants(&self) -> bool {
        !self.variants.is_empty()
    }
}

impl CacheEntry for HttpCacheEntry {}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
