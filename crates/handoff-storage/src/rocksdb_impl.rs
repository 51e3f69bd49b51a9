//! RocksDB storage implementation.

use crate::{
    column_families::all_column_families,
    errors::{Result, StorageError},
    traits::{
        decode_entry, deserialize_value, encode_entry, now_millis, serialize_key,
        serialize_value, CasOutcome, Storage, StoredEntry,
    },
};
use async_trait::async_trait;
use rocksdb::{Options, WriteBatch, DB};
use serde::{de::DeserializeOwned, Serialize};
use std::{path::Path, sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tracing::debug;

/// RocksDB storage implementation
///
/// All writes are serialized through a single lock so that the read-compare-write
/// primitives are atomic within the process owning the database.
pub struct RocksDbStorage {
    db: Arc<DB>,
    write_lock: Mutex<()>,
    // Keeps a test database directory alive for as long as the handle.
    _temp_dir: Option<tempfile::TempDir>,
}

impl RocksDbStorage {
    /// Open RocksDB database at the specified path
    ///
    /// Creates all required column families if they don't exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let db = DB::open_cf(&opts, &path, all_column_families())
            .map_err(|e| StorageError::Database(e.to_string()))?;

        debug!("Opened RocksDB at {:?}", path.as_ref());

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
            _temp_dir: None,
        })
    }

    /// Open a RocksDB database in a fresh temporary directory
    ///
    /// This is public for use in other crates' test modules.
    pub fn open_test() -> Result<Self> {
        let temp_dir = tempfile::TempDir::new().map_err(StorageError::IoError)?;
        let mut storage = Self::open(temp_dir.path())?;
        storage._temp_dir = Some(temp_dir);
        Ok(storage)
    }

    /// Get column family handle
    fn cf_handle(&self, cf: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(cf)
            .ok_or_else(|| StorageError::InvalidColumnFamily(cf.to_string()))
    }

    /// Read the raw envelope stored under a key, expired or not
    fn read_entry(&self, cf: &str, key_bytes: &[u8]) -> Result<Option<StoredEntry>> {
        let cf_handle = self.cf_handle(cf)?;
        let result = self
            .db
            .get_cf(cf_handle, key_bytes)
            .map_err(|e| StorageError::Database(e.to_string()))?;

        result.map(|bytes| decode_entry(&bytes)).transpose()
    }

    /// Read the envelope under a key only if it is still live
    fn read_live_entry(&self, cf: &str, key_bytes: &[u8]) -> Result<Option<StoredEntry>> {
        Ok(self
            .read_entry(cf, key_bytes)?
            .filter(StoredEntry::is_live))
    }

    fn write_raw(&self, cf: &str, key_bytes: &[u8], entry_bytes: &[u8]) -> Result<()> {
        let cf_handle = self.cf_handle(cf)?;
        self.db
            .put_cf(cf_handle, key_bytes, entry_bytes)
            .map_err(|e| StorageError::Database(e.to_string()))
    }

    fn delete_raw(&self, cf: &str, key_bytes: &[u8]) -> Result<()> {
        let cf_handle = self.cf_handle(cf)?;
        self.db
            .delete_cf(cf_handle, key_bytes)
            .map_err(|e| StorageError::Database(e.to_string()))
    }

    async fn write_entry<K, V>(&self, cf: &str, key: &K, value: &V, ttl: Option<Duration>) -> Result<()>
    where
        K: Serialize + Send + Sync,
        V: Serialize + Send + Sync,
    {
        let key_bytes = serialize_key(key)?;
        let entry_bytes = encode_entry(value, ttl)?;

        let _guard = self.write_lock.lock().await;
        self.write_raw(cf, &key_bytes, &entry_bytes)
    }
}

#[async_trait]
impl Storage for RocksDbStorage {
    async fn get<K, V>(&self, cf: &str, key: &K) -> Result<Option<V>>
    where
        K: Serialize + Send + Sync,
        V: DeserializeOwned,
    {
        let key_bytes = serialize_key(key)?;

        match self.read_live_entry(cf, &key_bytes)? {
            Some(entry) => Ok(Some(deserialize_value(&entry.payload)?)),
            None => Ok(None),
        }
    }

    async fn put<K, V>(&self, cf: &str, key: &K, value: &V) -> Result<()>
    where
        K: Serialize + Send + Sync,
        V: Serialize + Send + Sync,
    {
        self.write_entry(cf, key, value, None).await
    }

    async fn put_with_ttl<K, V>(&self, cf: &str, key: &K, value: &V, ttl: Duration) -> Result<()>
    where
        K: Serialize + Send + Sync,
        V: Serialize + Send + Sync,
    {
        self.write_entry(cf, key, value, Some(ttl)).await
    }

    async fn insert_if_absent<K, V>(
        &self,
        cf: &str,
        key: &K,
        value: &V,
        ttl: Option<Duration>,
    ) -> Result<bool>
    where
        K: Serialize + Send + Sync,
        V: Serialize + Send + Sync,
    {
        let key_bytes = serialize_key(key)?;
        let entry_bytes = encode_entry(value, ttl)?;

        let _guard = self.write_lock.lock().await;
        if self.read_live_entry(cf, &key_bytes)?.is_some() {
            return Ok(false);
        }

        self.write_raw(cf, &key_bytes, &entry_bytes)?;
        Ok(true)
    }

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
        V: Serialize + Send + Sync,
    {
        let key_bytes = serialize_key(key)?;
        let expected_bytes = serialize_value(expected)?;
        let entry_bytes = encode_entry(new, ttl)?;

        let _guard = self.write_lock.lock().await;
        let Some(current) = self.read_live_entry(cf, &key_bytes)? else {
            return Ok(CasOutcome::Missing);
        };

        if current.payload != expected_bytes {
            return Ok(CasOutcome::Conflict);
        }

        self.write_raw(cf, &key_bytes, &entry_bytes)?;
        Ok(CasOutcome::Swapped)
    }

    async fn take<K, V>(&self, cf: &str, key: &K) -> Result<Option<V>>
    where
        K: Serialize + Send + Sync,
        V: DeserializeOwned,
    {
        let key_bytes = serialize_key(key)?;

        let _guard = self.write_lock.lock().await;
        let Some(entry) = self.read_entry(cf, &key_bytes)? else {
            return Ok(None);
        };

        self.delete_raw(cf, &key_bytes)?;

        if !entry.is_live() {
            return Ok(None);
        }

        Ok(Some(deserialize_value(&entry.payload)?))
    }

    async fn delete<K>(&self, cf: &str, key: &K) -> Result<()>
    where
        K: Serialize + Send + Sync,
    {
        let key_bytes = serialize_key(key)?;

        let _guard = self.write_lock.lock().await;
        self.delete_raw(cf, &key_bytes)
    }

    async fn exists<K>(&self, cf: &str, key: &K) -> Result<bool>
    where
        K: Serialize + Send + Sync,
    {
        let key_bytes = serialize_key(key)?;
        Ok(self.read_live_entry(cf, &key_bytes)?.is_some())
    }

    async fn purge_expired(&self, cf: &str) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let cf_handle = self.cf_handle(cf)?;
        let now_ms = now_millis();

        let mut batch = WriteBatch::default();
        let mut removed = 0;

        for item in self.db.iterator_cf(cf_handle, rocksdb::IteratorMode::Start) {
            let (key, value) = item.map_err(|e| StorageError::Database(e.to_string()))?;
            if decode_entry(&value)?.is_expired_at(now_ms) {
                batch.delete_cf(cf_handle, &key);
                removed += 1;
            }
        }

        if removed > 0 {
            self.db
                .write(batch)
                .map_err(|e| StorageError::Database(e.to_string()))?;
            debug!(cf = cf, removed = removed, "Purged expired entries");
        }

        Ok(removed)
    }
}
