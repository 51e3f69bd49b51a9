use crate::errors::Result;
use crate::traits::AuthLog;
use crate::types::AuthLogEntry;
use async_trait::async_trait;
use handoff_storage::{Storage, CF_AUTH_LOG};
use std::sync::Arc;

/// Append-only auth log keyed by entry id
pub struct StorageAuthLog<S: Storage> {
    storage: Arc<S>,
}

impl<S: Storage> StorageAuthLog<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    pub async fn get(&self, id: uuid::Uuid) -> Result<Option<AuthLogEntry>> {
        Ok(self.storage.get(CF_AUTH_LOG, &id).await?)
    }
}

#[async_trait]
impl<S: Storage> AuthLog for StorageAuthLog<S> {
    async fn add(&self, entry: &AuthLogEntry) -> Result<()> {
        self.storage.put(CF_AUTH_LOG, &entry.id, entry).await?;
        Ok(())
    }
}
