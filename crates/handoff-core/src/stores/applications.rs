//! Application directory backed by storage, with a read-through cache.

use crate::errors::Result;
use crate::traits::ApplicationDirectory;
use crate::types::Application;
use async_trait::async_trait;
use handoff_storage::{Storage, CF_APPLICATIONS};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const INVALIDATION_CAPACITY: usize = 64;

/// Applications keyed by id; every save announces the id on an invalidation channel
pub struct StorageApplicationDirectory<S: Storage> {
    storage: Arc<S>,
    invalidations: broadcast::Sender<String>,
}

impl<S: Storage> StorageApplicationDirectory<S> {
    pub fn new(storage: Arc<S>) -> Self {
        let (invalidations, _) = broadcast::channel(INVALIDATION_CAPACITY);
        Self {
            storage,
            invalidations,
        }
    }

    /// Insert or replace an application
    pub async fn save(&self, application: &Application) -> Result<()> {
        self.storage
            .put(CF_APPLICATIONS, &application.id, application)
            .await?;

        // No subscribers is fine.
        let _ = self.invalidations.send(application.id.clone());
        info!(application_id = %application.id, "Application saved");
        Ok(())
    }

    /// Ids of applications changed after this call
    pub fn subscribe_invalidations(&self) -> broadcast::Receiver<String> {
        self.invalidations.subscribe()
    }
}

#[async_trait]
impl<S: Storage> ApplicationDirectory for StorageApplicationDirectory<S> {
    async fn get_application(&self, id: &str) -> Result<Option<Arc<Application>>> {
        let application: Option<Application> = self.storage.get(CF_APPLICATIONS, &id).await?;
        Ok(application.map(Arc::new))
    }
}

type ApplicationCache = Arc<RwLock<HashMap<String, Arc<Application>>>>;

/// Read-through cache in front of another directory
///
/// Entries are replaced per key and dropped when their id arrives on the
/// invalidation channel passed to [`watch`](Self::watch).
pub struct CachedApplicationDirectory<D: ApplicationDirectory> {
    inner: Arc<D>,
    entries: ApplicationCache,
}

impl<D: ApplicationDirectory> CachedApplicationDirectory<D> {
    pub fn new(inner: Arc<D>) -> Self {
        Self {
            inner,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn invalidate(&self, id: &str) {
        self.entries.write().await.remove(id);
    }

    /// Drop cached entries as their ids are announced
    pub fn watch(&self, mut invalidations: broadcast::Receiver<String>) -> JoinHandle<()> {
        let entries = Arc::clone(&self.entries);

        tokio::spawn(async move {
            loop {
                match invalidations.recv().await {
                    Ok(id) => {
                        debug!(application_id = %id, "Application cache entry invalidated");
                        entries.write().await.remove(&id);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped = skipped, "Invalidation channel lagged, clearing cache");
                        entries.write().await.clear();
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl<D: ApplicationDirectory + 'static> ApplicationDirectory for CachedApplicationDirectory<D> {
    async fn get_application(&self, id: &str) -> Result<Option<Arc<Application>>> {
        if let Some(application) = self.entries.read().await.get(id) {
            return Ok(Some(Arc::clone(application)));
        }

        let application = self.inner.get_application(id).await?;
        if let Some(application) = &application {
            self.entries
                .write()
                .await
                .insert(id.to_string(), Arc::clone(application));
        }

        Ok(application)
    }
}
