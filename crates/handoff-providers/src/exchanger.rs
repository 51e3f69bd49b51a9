//! [`ProviderClient`] implementation backed by [`OAuthClient`].

use crate::oauth::{OAuthClient, OAuthConfig};
use async_trait::async_trait;
use handoff_core::{IdentityProvider, NormalizedProfile, ProviderClient};
use std::time::Duration;
use tracing::debug;

/// Exchanges authorization codes with any provider configured on an application
pub struct OAuthProfileExchanger {
    client: OAuthClient,
}

impl OAuthProfileExchanger {
    /// Create an exchanger whose provider requests fail after `timeout`
    pub fn new(timeout: Duration) -> crate::Result<Self> {
        Ok(Self {
            client: OAuthClient::with_timeout(timeout)?,
        })
    }
}

#[async_trait]
impl ProviderClient for OAuthProfileExchanger {
    fn authorization_url(
        &self,
        provider: &IdentityProvider,
        domain: &str,
        state: &str,
    ) -> handoff_core::Result<String> {
        let config = OAuthConfig::from_provider(provider, domain)?;
        Ok(self.client.build_auth_url(&config, state)?)
    }

    async fn exchange(
        &self,
        provider: &IdentityProvider,
        domain: &str,
        code: &str,
    ) -> handoff_core::Result<NormalizedProfile> {
        let config = OAuthConfig::from_provider(provider, domain)?;
        let token = self.client.exchange_code(&config, code).await?;
        let user = self.client.get_user_info(&config, &token.access_token).await?;

        debug!(provider = %provider.name, has_email = user.email.is_some(), "Provider profile fetched");

        Ok(NormalizedProfile {
            id: user.id,
            email: user.email,
            name: user.name,
            picture: user.picture,
            token: token.access_token,
        })
    }
}
