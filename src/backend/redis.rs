//! Redis key-value store implementation.
//!
//! Each key is a hash with two fields: `v`, the version of the last write, and
//! `d`, the entry bytes. Versions come from one store-wide counter
//! ([`VERSION_COUNTER_KEY`]), never from the hash itself, so a key that is
//! deleted and written again never reissues an old version. Writes that touch
//! the version run as Lua scripts so the check and the write are atomic on the
//! server.

use super::{KeyValueStore, VersionToken, VersionedEntry};
use crate::error::{Error, Result};
use deadpool_redis::{Config, Connection, Pool, Runtime};
use redis::Script;
use std::time::Duration;

/// Default Redis connection pool size.
/// Override with REDIS_POOL_SIZE environment variable
const DEFAULT_POOL_SIZE: u32 = 16;

const FIELD_VERSION: &str = "v";
const FIELD_DATA: &str = "d";

/// Counter every write draws its version from.
pub const VERSION_COUNTER_KEY: &str = "cache-bridge:version";

// KEYS[1] = entry hash, KEYS[2] = version counter
const PUT_SCRIPT: &str = r"
local v = redis.call('INCR', KEYS[2])
redis.call('HSET', KEYS[1], 'v', v, 'd', ARGV[1])
return v
";

const CAS_SCRIPT: &str = r"
local current = redis.call('HGET', KEYS[1], 'v')
if current ~= ARGV[1] then
  return 0
end
if ARGV[2] == '1' then
  local v = redis.call('INCR', KEYS[2])
  redis.call('HSET', KEYS[1], 'v', v, 'd', ARGV[3])
else
  redis.call('DEL', KEYS[1])
end
return 1
";

/// Configuration for the Redis store.
#[derive(Clone, Debug)]
pub struct RedisConfig {
    pub url: String, // e.g., "redis://localhost:6379/0"
    pub pool_size: u32,
    pub connection_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        RedisConfig {
            url: "redis://localhost:6379".to_string(),
            pool_size: 10,
            connection_timeout: Duration::from_secs(5),
        }
    }
}

/// Redis-backed store with connection pooling.
///
/// # Example
///
/// ```no_run
/// # use cache_bridge::backend::{RedisStore, RedisConfig, KeyValueStore};
/// # use cache_bridge::error::Result;
/// # async fn example() -> Result<()> {
/// let store = RedisStore::new(RedisConfig {
///     url: "redis://localhost:6379".to_string(),
///     ..Default::default()
/// })?;
///
/// store.put("key", b"value".to_vec()).await?;
/// let value = store.get("key").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
    put_script: Script,
    cas_script: Script,
}

impl RedisStore {
    /// Create a store from configuration.
    ///
    /// # Errors
    /// Returns `Err` if connection pool creation fails
    pub fn new(config: RedisConfig) -> Result<Self> {
        let mut pool_config = Config::from_url(config.url.clone());
        pool_config.pool = Some(deadpool_redis::PoolConfig {
            max_size: config.pool_size as usize,
            timeouts: deadpool_redis::Timeouts {
                wait: Some(config.connection_timeout),
                create: Some(config.connection_timeout),
                recycle: Some(config.connection_timeout),
            },
            ..Default::default()
        });

        let pool = pool_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| Error::ConfigError(format!("Failed to create connection pool: {}", e)))?;

        info!(
            "✓ Redis store initialized with {} (pool size: {})",
            config.url, config.pool_size
        );

        Ok(RedisStore {
            pool,
            put_script: Script::new(PUT_SCRIPT),
            cas_script: Script::new(CAS_SCRIPT),
        })
    }

    /// Create from a URL directly.
    ///
    /// Pool size is determined by:
    /// 1. `REDIS_POOL_SIZE` environment variable (if set)
    /// 2. `DEFAULT_POOL_SIZE` constant (16)
    ///
    /// # Errors
    /// Returns `Err` if connection pool creation fails
    pub fn from_url(url: impl Into<String>) -> Result<Self> {
        let pool_size = std::env::var("REDIS_POOL_SIZE")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_POOL_SIZE);

        Self::new(RedisConfig {
            url: url.into(),
            pool_size,
            ..Default::default()
        })
    }

    async fn connection(&self, operation: &'static str, key: &str) -> Result<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| Error::backend(operation, key, e))
    }
}

impl KeyValueStore for RedisStore {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let mut conn = self.connection("put", key).await?;
        let version: u64 = self
            .put_script
            .key(key)
            .key(VERSION_COUNTER_KEY)
            .arg(value)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| Error::backend("put", key, e))?;

        debug!("✓ Redis PUT {} (v{})", key, version);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.connection("get", key).await?;
        let value: Option<Vec<u8>> = redis::cmd("HGET")
            .arg(key)
            .arg(FIELD_DATA)
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::backend("get", key, e))?;

        debug!(
            "✓ Redis GET {} -> {}",
            key,
            if value.is_some() { "HIT" } else { "MISS" }
        );
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection("delete", key).await?;
        let removed: u64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::backend("delete", key, e))?;

        debug!("✓ Redis DELETE {} (removed: {})", key, removed);
        Ok(removed > 0)
    }

    async fn get_versioned(&self, key: &str) -> Result<Option<VersionedEntry>> {
        let mut conn = self.connection("get_versioned", key).await?;
        let (version, value): (Option<u64>, Option<Vec<u8>>) = redis::cmd("HMGET")
            .arg(key)
            .arg(FIELD_VERSION)
            .arg(FIELD_DATA)
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::backend("get_versioned", key, e))?;

        Ok(match (version, value) {
            (Some(version), Some(value)) => {
                Some(VersionedEntry::new(value, VersionToken::new(version)))
            }
            _ => None,
        })
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        token: VersionToken,
        value: Option<Vec<u8>>,
    ) -> Result<bool> {
        let mut conn = self.connection("compare_and_swap", key).await?;
        let expected = token.get();

        let mut invocation = self.cas_script.key(key);
        invocation.key(VERSION_COUNTER_KEY).arg(expected.to_string());
        match value {
            Some(bytes) => invocation.arg("1").arg(bytes),
            None => invocation.arg("0").arg(Vec::<u8>::new()),
        };

        let stored: u64 = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(|e| Error::backend("compare_and_swap", key, e))?;

        debug!("✓ Redis CAS {} (v{}) -> {}", key, expected, stored == 1);
        Ok(stored == 1)
    }
}
