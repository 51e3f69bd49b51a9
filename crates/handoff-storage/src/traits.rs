//! Storage trait definitions.

use crate::errors::{Result, StorageError};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Outcome of a compare-and-swap write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// The stored value matched and was replaced
    Swapped,
    /// A live value exists but differs from the expected one
    Conflict,
    /// No live value exists under the key (absent or expired)
    Missing,
}

/// Storage interface for key-value operations
///
/// This trait abstracts the underlying storage implementation (RocksDB)
/// to enable testing with mock implementations.
///
/// Values written with a TTL stop being visible once it elapses. Every write
/// replaces the previous expiry of the entry, so a TTL is effectively reset
/// on each successful write.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Get a live value by key from a column family
    ///
    /// # Returns
    ///
    /// `Ok(Some(value))` if a live entry exists, `Ok(None)` if absent or expired
    async fn get<K, V>(&self, cf: &str, key: &K) -> Result<Option<V>>
    where
        K: Serialize + Send + Sync,
        V: DeserializeOwned;

    /// Put a key-value pair that never expires
    async fn put<K, V>(&self, cf: &str, key: &K, value: &V) -> Result<()>
    where
        K: Serialize + Send + Sync,
        V: Serialize + Send + Sync;

    /// Put a key-value pair that expires after `ttl`
    async fn put_with_ttl<K, V>(&self, cf: &str, key: &K, value: &V, ttl: Duration) -> Result<()>
    where
        K: Serialize + Send + Sync,
        V: Serialize + Send + Sync;

    /// Insert a value only if no live entry exists under the key
    ///
    /// Returns `true` when the value was written.
    async fn insert_if_absent<K, V>(
        &self,
        cf: &str,
        key: &K,
        value: &V,
        ttl: Option<Duration>,
    ) -> Result<bool>
    where
        K: Serialize + Send + Sync,
        V: Serialize + Send + Sync;

    /// Replace the live value with `new` if it is byte-identical to `expected`
    ///
    /// The comparison and the write happen as one atomic step.
    async fn compare_and_swap<K, V>(
        &self,
        cf: &str,
        key: &K,
        expected: &V,
        new: &V,
        ttl: Option<Duration>,
    ) -> Result<CasOutcome>
    where
        K: Serialize + Send + Sync,
        V: Serialize + Send + Sync;

    /// Read and delete a live value in one atomic step
    ///
    /// Of several concurrent callers on the same key at most one receives the value.
    async fn take<K, V>(&self, cf: &str, key: &K) -> Result<Option<V>>
    where
        K: Serialize + Send + Sync,
        V: DeserializeOwned;

    /// Delete a key from a column family
    async fn delete<K>(&self, cf: &str, key: &K) -> Result<()>
    where
        K: Serialize + Send + Sync;

    /// Check if a live key exists in a column family
    async fn exists<K>(&self, cf: &str, key: &K) -> Result<bool>
    where
        K: Serialize + Send + Sync;

    /// Remove every expired entry from a column family
    ///
    /// Returns the number of entries removed.
    async fn purge_expired(&self, cf: &str) -> Result<usize>;
}

/// On-disk envelope holding a serialized value and its optional expiry
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct StoredEntry {
    /// Absolute expiry in unix milliseconds
    pub expires_at_ms: Option<u64>,
    pub payload: Vec<u8>,
}

impl StoredEntry {
    pub(crate) fn new(payload: Vec<u8>, ttl: Option<Duration>) -> Self {
        let expires_at_ms = ttl.map(|ttl| {
            let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
            now_millis().saturating_add(ttl_ms)
        });
        Self {
            expires_at_ms,
            payload,
        }
    }

    pub(crate) fn is_expired_at(&self, now_ms: u64) -> bool {
        matches!(self.expires_at_ms, Some(expires_at) if expires_at <= now_ms)
    }

    pub(crate) fn is_live(&self) -> bool {
        !self.is_expired_at(now_millis())
    }
}

/// Current unix time in milliseconds
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Helper function to serialize a key
pub(crate) fn serialize_key<K: Serialize>(key: &K) -> Result<Vec<u8>> {
    bincode::serialize(key).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Helper function to serialize a value
pub(crate) fn serialize_value<V: Serialize>(value: &V) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Helper function to deserialize a value
pub(crate) fn deserialize_value<V: DeserializeOwned>(bytes: &[u8]) -> Result<V> {
    bincode::deserialize(bytes).map_err(|e| StorageError::Deserialization(e.to_string()))
}

/// Encode a value together with its expiry
pub(crate) fn encode_entry<V: Serialize>(value: &V, ttl: Option<Duration>) -> Result<Vec<u8>> {
    let entry = StoredEntry::new(serialize_value(value)?, ttl);
    serialize_value(&entry)
}

/// Decode a stored envelope
pub(crate) fn decode_entry(bytes: &[u8]) -> Result<StoredEntry> {
    deserialize_value(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_without_ttl_never_expires() {
        let entry = StoredEntry::new(vec![1, 2, 3], None);
        assert!(entry.is_live());
        assert!(!entry.is_expired_at(u64::MAX));
    }

    #[test]
    fn test_entry_expiry_boundary() {
        let entry = StoredEntry {
            expires_at_ms: Some(1_000),
            payload: vec![],
        };
        assert!(!entry.is_expired_at(999));
        assert!(entry.is_expired_at(1_000));
    }

    #[test]
    fn test_huge_ttl_saturates_instead_of_wrapping() {
        let entry = StoredEntry::new(vec![], Some(Duration::MAX));
        assert_eq!(entry.expires_at_ms, Some(u64::MAX));
        assert!(entry.is_live());

        let entry = StoredEntry::new(vec![], Some(Duration::from_millis(u64::MAX) * 2));
        assert!(entry.is_live());
    }
}
