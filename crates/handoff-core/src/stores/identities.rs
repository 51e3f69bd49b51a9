//! Storage-backed local identity store.

use crate::errors::{HandoffError, Result};
use crate::traits::IdentityStore;
use crate::types::LocalIdentity;
use async_trait::async_trait;
use handoff_storage::{Storage, CF_LOCAL_IDENTITIES, CF_LOCAL_IDENTITIES_BY_USER};
use std::sync::Arc;
use tracing::{debug, warn};

/// Identities keyed by (provider id, external id) with a unique (provider id, user id) index
pub struct StorageIdentityStore<S: Storage> {
    storage: Arc<S>,
}

impl<S: Storage> StorageIdentityStore<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl<S: Storage> IdentityStore for StorageIdentityStore<S> {
    async fn find_by_provider_and_external_id(
        &self,
        provider_id: &str,
        external_id: &str,
    ) -> Result<Option<LocalIdentity>> {
        let key = (provider_id, external_id);
        Ok(self.storage.get(CF_LOCAL_IDENTITIES, &key).await?)
    }

    async fn find_by_provider_and_user(
        &self,
        provider_id: &str,
        user_id: &str,
    ) -> Result<Option<LocalIdentity>> {
        let index_key = (provider_id, user_id);
        let external_id: Option<String> = self
            .storage
            .get(CF_LOCAL_IDENTITIES_BY_USER, &index_key)
            .await?;

        match external_id {
            Some(external_id) => {
                self.find_by_provider_and_external_id(provider_id, &external_id)
                    .await
            }
            None => Ok(None),
        }
    }

    async fn create(&self, identity: &LocalIdentity) -> Result<()> {
        let provider_id = identity.identity_provider_id.as_str();
        let index_key = (provider_id, identity.user_id.as_str());
        let key = (provider_id, identity.external_id.as_str());

        // The user index is claimed first; it is the 1:1 provider/account invariant.
        if !self
            .storage
            .insert_if_absent(CF_LOCAL_IDENTITIES_BY_USER, &index_key, &identity.external_id, None)
            .await?
        {
            return Err(HandoffError::AlreadyLinked);
        }

        let inserted = self
            .storage
            .insert_if_absent(CF_LOCAL_IDENTITIES, &key, identity, None)
            .await;

        if !matches!(inserted, Ok(true)) {
            // A failed create must not leave the user index bound.
            if let Err(e) = self
                .storage
                .delete(CF_LOCAL_IDENTITIES_BY_USER, &index_key)
                .await
            {
                warn!(error = %e, provider_id = provider_id, "Failed to release user index");
            }
            inserted?;
            return Err(HandoffError::AlreadyLinked);
        }

        debug!(
            identity_id = %identity.id,
            provider_id = provider_id,
            "Local identity created"
        );

        Ok(())
    }
}
