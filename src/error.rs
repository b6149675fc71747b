//! Error types for cache storage operations.

use std::fmt;

/// Boxed cause carried by backend failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers of the storage adapter.
///
/// Timeouts and cancellations are deliberately absent: they resolve to
/// "no result" at the wait boundary and never reach the caller as errors.
#[derive(Debug)]
pub enum Error {
    /// The backing store reported a failure for an operation.
    BackendError {
        operation: &'static str,
        key: String,
        source: BoxError,
    },

    /// `update_entry` ran out of attempts against concurrent writers.
    UpdateFailed { key: String, attempts: u32 },

    /// A caller-supplied update transform refused to produce a value.
    TransformError(String),

    /// Invalid configuration.
    ConfigError(String),

    /// Entry could not be encoded.
    SerializationError(String),

    /// Entry bytes could not be decoded.
    DeserializationError(String),

    /// Envelope header is not ours.
    InvalidCacheEntry(String),

    /// Envelope was written by an incompatible schema version.
    VersionMismatch { expected: u32, found: u32 },
}

impl Error {
    /// Wrap a store-level failure with the operation and key it belongs to.
    pub fn backend<E>(operation: &'static str, key: impl Into<String>, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        Error::BackendError {
            operation,
            key: key.into(),
            source: source.into(),
        }
    }

    /// `true` for contention exhaustion, the one error callers of
    /// `update_entry` usually handle separately.
    pub fn is_update_failed(&self) -> bool {
        matches!(self, Error::UpdateFailed { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError {
                operation,
                key,
                source,
            } => write!(f, "Backend {} failed for key {}: {}", operation, key, source),
            Error::UpdateFailed { key, attempts } => {
                write!(f, "Failed to update {} after {} tries", key, attempts)
            }
            Error::TransformError(msg) => write!(f, "Update transform error: {}", msg),
            Error::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            Error::InvalidCacheEntry(msg) => write!(f, "Invalid cache entry: {}", msg),
            Error::VersionMismatch { expected, found } => write!(
                f,
                "Cache schema version mismatch: expected {}, found {}",
                expected, found
            ),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::BackendError { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        let kind = match &err {
            Error::BackendError { .. } => std::io::ErrorKind::Other,
            Error::ConfigError(_) => std::io::ErrorKind::InvalidInput,
            Error::SerializationError(_)
            | Error::DeserializationError(_)
            | Error::InvalidCacheEntry(_)
            | Error::VersionMismatch { .. } => std::io::ErrorKind::InvalidData,
            Error::UpdateFailed { .. } | Error::TransformError(_) => std::io::ErrorKind::Other,
        };
        std::io::Error::new(kind, err)
    }
}
