//! Ephemeral token store.
//!
//! A key to payload store with per-entry TTL. Entries are addressed either by a
//! generated token ([`TokenStore::create`]) or by a caller-chosen key
//! ([`TokenStore::set`]). Every write resets the TTL of the entry it touches.

use crate::errors::{HandoffError, Result};
use crate::utils::{generate_token, hash_for_log};
use handoff_storage::{CasOutcome, Storage};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const MAX_CREATE_ATTEMPTS: usize = 4;

pub struct TokenStore<S: Storage> {
    storage: Arc<S>,
    cf: &'static str,
}

impl<S: Storage> Clone for TokenStore<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            cf: self.cf,
        }
    }
}

impl<S: Storage> TokenStore<S> {
    pub fn new(storage: Arc<S>, cf: &'static str) -> Self {
        Self { storage, cf }
    }

    /// Store `payload` under a fresh unguessable token
    pub async fn create<V>(&self, payload: &V, ttl: Duration) -> Result<String>
    where
        V: Serialize + Send + Sync,
    {
        for _ in 0..MAX_CREATE_ATTEMPTS {
            let token = generate_token();
            if self
                .storage
                .insert_if_absent(self.cf, &token, payload, Some(ttl))
                .await?
            {
                debug!(cf = self.cf, token_hash = %hash_for_log(&token), "Token created");
                return Ok(token);
            }
            warn!(cf = self.cf, "Token collision, regenerating");
        }

        Err(HandoffError::Conflict(
            "unable to allocate a unique token".to_string(),
        ))
    }

    /// Non-consuming read
    pub async fn get<V>(&self, token: &str) -> Result<V>
    where
        V: DeserializeOwned,
    {
        self.get_by_key(token).await
    }

    /// Read and invalidate in one step; concurrent callers see at most one success
    pub async fn consume<V>(&self, token: &str) -> Result<V>
    where
        V: DeserializeOwned,
    {
        let value: Option<V> = self.storage.take(self.cf, &token).await?;
        match value {
            Some(value) => {
                debug!(cf = self.cf, token_hash = %hash_for_log(token), "Token consumed");
                Ok(value)
            }
            None => Err(not_found(token)),
        }
    }

    /// Write `payload` under a caller-chosen key, replacing any previous entry
    pub async fn set<V>(&self, key: &str, payload: &V, ttl: Duration) -> Result<()>
    where
        V: Serialize + Send + Sync,
    {
        self.storage
            .put_with_ttl(self.cf, &key, payload, ttl)
            .await?;
        Ok(())
    }

    /// Write `payload` under a caller-chosen key only if no live entry exists
    pub async fn insert<V>(&self, key: &str, payload: &V, ttl: Duration) -> Result<bool>
    where
        V: Serialize + Send + Sync,
    {
        Ok(self
            .storage
            .insert_if_absent(self.cf, &key, payload, Some(ttl))
            .await?)
    }

    /// Replace the entry under `key` only if it still equals `expected`
    pub async fn replace<V>(
        &self,
        key: &str,
        expected: &V,
        new: &V,
        ttl: Duration,
    ) -> Result<CasOutcome>
    where
        V: Serialize + Send + Sync,
    {
        Ok(self
            .storage
            .compare_and_swap(self.cf, &key, expected, new, Some(ttl))
            .await?)
    }

    pub async fn get_by_key<V>(&self, key: &str) -> Result<V>
    where
        V: DeserializeOwned,
    {
        self.find(key).await?.ok_or_else(|| not_found(key))
    }

    /// Like [`get_by_key`](Self::get_by_key) but absence is `Ok(None)`
    pub async fn find<V>(&self, key: &str) -> Result<Option<V>>
    where
        V: DeserializeOwned,
    {
        Ok(self.storage.get(self.cf, &key).await?)
    }

    /// Whether a live entry exists under `token`
    pub async fn check(&self, token: &str) -> Result<bool> {
        Ok(self.storage.exists(self.cf, &token).await?)
    }
}

fn not_found(token: &str) -> HandoffError {
    HandoffError::NotFound(format!("token {}", hash_for_log(token)))
}
