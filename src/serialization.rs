//! Versioned postcard envelopes for cache entries.
//!
//! # Format
//!
//! ```text
//! [MAGIC: 4 bytes] [VERSION: 4 bytes, little endian] [POSTCARD PAYLOAD]
//! ```
//!
//! The magic guards against reading bytes some other writer put under the
//! same key; the version lets a deploy that changes entry layout treat old
//! entries as undecodable instead of misreading them.

use crate::error::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};

/// Envelope magic.
pub const CACHE_MAGIC: [u8; 4] = *b"CBRG";

/// Current envelope schema version. Bump when entry layouts change.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

const HEADER_LEN: usize = 8;

/// Encode a value into an envelope.
///
/// # Errors
/// Returns `Error::SerializationError` if postcard cannot encode the value.
pub fn serialize_for_cache<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let payload = postcard::to_allocvec(value)
        .map_err(|e| Error::SerializationError(e.to_string()))?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(&CACHE_MAGIC);
    bytes.extend_from_slice(&CURRENT_SCHEMA_VERSION.to_le_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Decode an envelope produced by [`serialize_for_cache`].
///
/// # Errors
/// - `Error::InvalidCacheEntry`: too short or wrong magic
/// - `Error::VersionMismatch`: written by another schema version
/// - `Error::DeserializationError`: corrupted payload
pub fn deserialize_from_cache<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    if bytes.len() < HEADER_LEN {
        return Err(Error::InvalidCacheEntry(format!(
            "Entry too short: {} bytes",
            bytes.len()
        )));
    }

    let (header, payload) = bytes.split_at(HEADER_LEN);
    if header[..4] != CACHE_MAGIC {
        return Err(Error::InvalidCacheEntry(format!(
            "Bad magic: {:?}",
            &header[..4]
        )));
    }

    let mut version = [0u8; 4];
    version.copy_from_slice(&header[4..]);
    let found = u32::from_le_bytes(version);
    if found != CURRENT_SCHEMA_VERSION {
        return Err(Error::VersionMismatch {
            expected: CURRENT_SCHEMA_VERSION,
            found,
        });
    }

    postcard::from_bytes(payload).map_err(|e| Error::DeserializationError(e.to_string()))
}
