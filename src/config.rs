//! Storage adapter configuration.

use crate::error::{Error, Result};
use std::time::Duration;

/// Default number of optimistic update attempts.
pub const DEFAULT_MAX_UPDATE_RETRIES: u32 = 5;

/// Default bound on a single backing store round trip.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default number of keys a worker remembers presence for.
pub const DEFAULT_STATUS_CAPACITY: usize = 8;

/// What `update_entry` does when its versioned read times out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TimedOutRead {
    /// Proceed as if the key were absent; the transform sees `None` and a
    /// present result is written unconditionally.
    #[default]
    TreatAsMiss,

    /// Stop the update silently without writing anything.
    Abandon,
}

/// Configuration for [`CacheStorage`](crate::CacheStorage).
///
/// # Example
///
/// ```
/// use cache_bridge::StorageConfig;
/// use std::time::Duration;
///
/// let config = StorageConfig::default()
///     .with_max_update_retries(10)
///     .with_operation_timeout(Some(Duration::from_millis(250)))
///     .with_namespace("proxy");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug)]
pub struct StorageConfig {
    /// Attempts `update_entry` makes before giving up with `UpdateFailed`.
    pub max_update_retries: u32,
    /// `None` blocks indefinitely on every store call.
    pub operation_timeout: Option<Duration>,
    /// Prefix applied to every key as `"{namespace}:{key}"`.
    pub namespace: Option<String>,
    /// Keys remembered per worker by the presence memo.
    pub status_capacity: usize,
    pub timed_out_read: TimedOutRead,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            max_update_retries: DEFAULT_MAX_UPDATE_RETRIES,
            operation_timeout: Some(DEFAULT_OPERATION_TIMEOUT),
            namespace: None,
            status_capacity: DEFAULT_STATUS_CAPACITY,
            timed_out_read: TimedOutRead::default(),
        }
    }
}

impl StorageConfig {
    pub fn with_max_update_retries(mut self, retries: u32) -> Self {
        self.max_update_retries = retries;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_status_capacity(mut self, capacity: usize) -> Self {
        self.status_capacity = capacity;
        self
    }

    pub fn with_timed_out_read(mut self, policy: TimedOutRead) -> Self {
        self.timed_out_read = policy;
        self
    }

    /// Build configuration from environment variables over the defaults.
    ///
    /// - `CACHE_MAX_UPDATE_RETRIES`: positive integer
    /// - `CACHE_OPERATION_TIMEOUT_MS`: milliseconds, `0` or `none` to wait indefinitely
    /// - `CACHE_NAMESPACE`: key prefix
    /// - `CACHE_STATUS_CAPACITY`: positive integer
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if a variable is set but unparsable, or if
    /// the resulting configuration fails [`validate`](Self::validate).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = StorageConfig::default();

        if let Some(raw) = lookup("CACHE_MAX_UPDATE_RETRIES") {
            config.max_update_retries = parse_number(&raw, "CACHE_MAX_UPDATE_RETRIES")?;
        }

        if let Some(raw) = lookup("CACHE_OPERATION_TIMEOUT_MS") {
            let raw = raw.trim();
            config.operation_timeout = if raw.eq_ignore_ascii_case("none") {
                None
            } else {
                match parse_number::<u64>(raw, "CACHE_OPERATION_TIMEOUT_MS")? {
                    0 => None,
                    millis => Some(Duration::from_millis(millis)),
                }
            };
        }

        if let Some(raw) = lookup("CACHE_NAMESPACE") {
            let raw = raw.trim();
            if !raw.is_empty() {
                config.namespace = Some(raw.to_string());
            }
        }

        if let Some(raw) = lookup("CACHE_STATUS_CAPACITY") {
            config.status_capacity = parse_number(&raw, "CACHE_STATUS_CAPACITY")?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the adapter cannot work with.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.max_update_retries == 0 {
            return Err(Error::ConfigError(
                "max_update_retries must be at least 1".to_string(),
            ));
        }
        if self.operation_timeout == Some(Duration::ZERO) {
            return Err(Error::ConfigError(
                "operation_timeout must be non-zero (use None to wait indefinitely)".to_string(),
            ));
        }
        if self.status_capacity == 0 {
            return Err(Error::ConfigError(
                "status_capacity must be at least 1".to_string(),
            ));
        }
        if let Some(ns) = &self.namespace {
            if ns.is_empty() || ns.contains(char::is_whitespace) {
                return Err(Error::ConfigError(format!("Invalid namespace: {:?}", ns)));
            }
        }
        Ok(())
    }
}

fn parse_number<N: std::str::FromStr>(raw: &str, name: &str) -> Result<N> {
    raw.trim()
        .parse()
        .map_err(|_| Error::ConfigError(format!("{} is not a valid number: {:?}", name, raw)))
}
