//! Collaborator interfaces consumed by the handoff services.

use crate::errors::Result;
use crate::types::*;
use async_trait::async_trait;
use std::sync::Arc;

/// Administrative API of the external OAuth2 authorization server
#[async_trait]
pub trait AuthorizationServer: Send + Sync {
    /// Fetch the pending login request identified by `challenge`
    ///
    /// # Errors
    /// * `AuthorizationServer` - Request unknown or upstream unavailable
    async fn get_login_request(&self, challenge: &str) -> Result<LoginRequest>;

    /// Accept a pending login request
    ///
    /// # Returns
    /// * Redirect URL supplied by the authorization server
    async fn accept_login_request(
        &self,
        challenge: &str,
        acceptance: &LoginAcceptance,
    ) -> Result<String>;
}

/// Lookup of application configuration by client id
#[async_trait]
pub trait ApplicationDirectory: Send + Sync {
    /// `Ok(None)` when no application is registered under `id`
    async fn get_application(&self, id: &str) -> Result<Option<Arc<Application>>>;
}

/// Storage of local identities bound to external providers
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_provider_and_external_id(
        &self,
        provider_id: &str,
        external_id: &str,
    ) -> Result<Option<LocalIdentity>>;

    async fn find_by_provider_and_user(
        &self,
        provider_id: &str,
        user_id: &str,
    ) -> Result<Option<LocalIdentity>>;

    /// Persist a new identity
    ///
    /// # Errors
    /// * `AlreadyLinked` - (provider, user) or (provider, external id) is already bound
    async fn create(&self, identity: &LocalIdentity) -> Result<()>;
}

/// Audit trail sink
#[async_trait]
pub trait AuthLog: Send + Sync {
    async fn add(&self, entry: &AuthLogEntry) -> Result<()>;
}

/// OAuth client for a configured social provider
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Authorization URL the browser is forwarded to
    fn authorization_url(
        &self,
        provider: &IdentityProvider,
        domain: &str,
        state: &str,
    ) -> Result<String>;

    /// Exchange an authorization code for a normalized profile
    ///
    /// # Errors
    /// * `ProfileFetchFailed` - Token or profile endpoint failed
    async fn exchange(
        &self,
        provider: &IdentityProvider,
        domain: &str,
        code: &str,
    ) -> Result<NormalizedProfile>;
}

/// Push channel for launcher status changes, keyed by login challenge
///
/// Failures are returned to the caller and never retried here.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, challenge: &str, notification: &StatusNotification) -> Result<()>;
}
