//! Social identity resolver.
//!
//! Drives the provider exchange for a login challenge and decides how the fetched
//! profile maps onto local identities: accepted directly, handed to a link step
//! for an existing password account, or handed to signup.

use crate::errors::{HandoffError, Result};
use crate::tokens::TokenStore;
use crate::traits::*;
use crate::types::*;
use crate::utils::hash_for_log;
use handoff_storage::{Storage, CF_ONE_TIME_TOKENS};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use url::form_urlencoded;

/// Tunables of the resolver
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// Upper bound on a provider code exchange
    pub exchange_timeout: Duration,
    /// Seconds the authorization server remembers an accepted login
    pub remember_for: u64,
    /// Abort `accept` when the auth log cannot be written
    pub audit_failure_is_fatal: bool,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            exchange_timeout: Duration::from_secs(5),
            remember_for: 259_200,
            audit_failure_is_fatal: true,
        }
    }
}

/// External collaborators of the resolver
#[derive(Clone)]
pub struct Collaborators {
    pub authorization_server: Arc<dyn AuthorizationServer>,
    pub applications: Arc<dyn ApplicationDirectory>,
    pub identities: Arc<dyn IdentityStore>,
    pub auth_log: Arc<dyn AuthLog>,
    pub provider_client: Arc<dyn ProviderClient>,
}

pub struct SocialIdentityResolver<S: Storage> {
    tokens: TokenStore<S>,
    collaborators: Collaborators,
    settings: ResolverSettings,
}

impl<S: Storage> SocialIdentityResolver<S> {
    pub fn new(storage: Arc<S>, collaborators: Collaborators, settings: ResolverSettings) -> Self {
        Self {
            tokens: TokenStore::new(storage, CF_ONE_TIME_TOKENS),
            collaborators,
            settings,
        }
    }

    /// Authorization URL at the provider for `challenge`
    pub async fn forward_url(
        &self,
        challenge: &str,
        provider_name: &str,
        domain: &str,
        launcher: bool,
    ) -> Result<String> {
        let application = self.application_for_challenge(challenge).await?;
        let provider = social_provider(&application, provider_name)?;

        let state = ForwardState {
            challenge: challenge.to_string(),
            launcher,
        }
        .encode()?;

        self.collaborators
            .provider_client
            .authorization_url(provider, domain, &state)
    }

    /// Exchange `code` and look up the matching local identity
    ///
    /// A missing local identity is a valid outcome, not an error.
    pub async fn resolve(
        &self,
        challenge: &str,
        provider_name: &str,
        domain: &str,
        code: &str,
    ) -> Result<Resolution> {
        let application = self.application_for_challenge(challenge).await?;
        let provider = social_provider(&application, provider_name)?;

        let exchange = self
            .collaborators
            .provider_client
            .exchange(provider, domain, code);
        let profile = match tokio::time::timeout(self.settings.exchange_timeout, exchange).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(provider = provider_name, "Provider exchange timed out");
                return Err(HandoffError::ProfileFetchFailed(format!(
                    "exchange with {} timed out",
                    provider_name
                )));
            }
        };

        if profile.id.is_empty() {
            return Err(HandoffError::ProfileFetchFailed(
                "provider returned an empty external id".to_string(),
            ));
        }

        let identity = self
            .collaborators
            .identities
            .find_by_provider_and_external_id(&provider.id, &profile.id)
            .await?;

        info!(
            challenge_hash = %hash_for_log(challenge),
            provider = provider_name,
            identity_found = identity.is_some(),
            "Social profile resolved"
        );

        Ok(Resolution { identity, profile })
    }

    /// Record the login and accept it at the authorization server
    ///
    /// # Returns
    /// * Redirect URL supplied by the authorization server
    pub async fn accept(
        &self,
        identity: &LocalIdentity,
        provider_name: &str,
        challenge: &str,
        context: &ClientContext,
    ) -> Result<String> {
        let application = self.application(&identity.application_id).await?;
        let provider = social_provider(&application, provider_name)?;

        let entry = AuthLogEntry::new(AuthAction::Auth, identity, &application, provider, context);
        if let Err(e) = self.collaborators.auth_log.add(&entry).await {
            if self.settings.audit_failure_is_fatal {
                return Err(HandoffError::AuditLog(e.to_string()));
            }
            error!(
                user_id = %identity.user_id,
                error = %e,
                "Unable to add auth log, continuing"
            );
        }

        let acceptance = LoginAcceptance {
            subject: identity.user_id.clone(),
            remember: true,
            remember_for: self.settings.remember_for,
        };
        let redirect_to = self
            .collaborators
            .authorization_server
            .accept_login_request(challenge, &acceptance)
            .await?;

        info!(
            challenge_hash = %hash_for_log(challenge),
            user_id = %identity.user_id,
            provider = provider_name,
            "Login accepted"
        );

        Ok(redirect_to)
    }

    /// Hand a profile without a local identity to the link or signup step
    ///
    /// # Returns
    /// * `social-existing` URL when a password account shares the profile's email,
    ///   `social-new` URL otherwise; both embed a fresh one-time link token
    pub async fn social_login_handoff(
        &self,
        profile: &NormalizedProfile,
        domain: &str,
        provider_name: &str,
        challenge: &str,
    ) -> Result<String> {
        let application = self.application_for_challenge(challenge).await?;
        social_provider(&application, provider_name)?;
        let ttl = Duration::from_secs(application.one_time_token_settings.ttl_seconds);

        if let Some(email) = profile.email() {
            let password_provider = application.default_password_provider().ok_or_else(|| {
                HandoffError::ProviderNotFound(DEFAULT_PASSWORD_PROVIDER.to_string())
            })?;

            let existing = self
                .collaborators
                .identities
                .find_by_provider_and_external_id(&password_provider.id, email)
                .await?;

            if let Some(existing) = existing {
                let payload = TokenPayload::SocialLink(SocialLinkPayload {
                    local_identity_ref: Some(existing.id.to_string()),
                    profile: profile.clone(),
                    provider: provider_name.to_string(),
                });
                let token = self.tokens.create(&payload, ttl).await?;

                info!(
                    challenge_hash = %hash_for_log(challenge),
                    provider = provider_name,
                    "Profile matches an existing account, offering link"
                );
                return Ok(handoff_url(domain, "social-existing", provider_name, challenge, &token));
            }
        }

        let payload = TokenPayload::SocialLink(SocialLinkPayload {
            local_identity_ref: None,
            profile: profile.clone(),
            provider: provider_name.to_string(),
        });
        let token = self.tokens.create(&payload, ttl).await?;

        info!(
            challenge_hash = %hash_for_log(challenge),
            provider = provider_name,
            "No matching account, offering signup"
        );
        Ok(handoff_url(domain, "social-new", provider_name, challenge, &token))
    }

    /// Consume a link token and bind its profile to `user_id`
    ///
    /// # Errors
    /// * `NotFound` - Token absent, expired or already used
    /// * `AlreadyLinked` - The user already has an identity at this provider
    pub async fn link(
        &self,
        token: &str,
        user_id: &str,
        application: &Application,
    ) -> Result<LocalIdentity> {
        let payload = self.social_link_payload(self.tokens.consume(token).await?)?;
        let provider = social_provider(application, &payload.provider)?;

        if self
            .collaborators
            .identities
            .find_by_provider_and_user(&provider.id, user_id)
            .await?
            .is_some()
        {
            warn!(
                user_id = user_id,
                provider = %payload.provider,
                "Account already linked to provider"
            );
            return Err(HandoffError::AlreadyLinked);
        }

        let identity =
            LocalIdentity::from_profile(user_id, &application.id, provider, &payload.profile);
        self.collaborators.identities.create(&identity).await?;

        info!(
            user_id = user_id,
            provider = %payload.provider,
            identity_id = %identity.id,
            "Social identity linked"
        );

        Ok(identity)
    }

    /// Social providers configured on the challenge's application
    pub async fn providers(&self, challenge: &str) -> Result<Vec<ProviderInfo>> {
        let application = self.application_for_challenge(challenge).await?;

        Ok(application
            .social_providers()
            .map(|provider| ProviderInfo {
                name: provider.name.clone(),
                display_name: provider.display_name.clone(),
            })
            .collect())
    }

    /// Profile carried by a link token, credential removed; does not consume the token
    pub async fn profile(&self, token: &str) -> Result<NormalizedProfile> {
        let payload = self.link_payload(token).await?;
        Ok(payload.profile.hide_sensitive())
    }

    /// Non-consuming read of a link token
    pub async fn link_payload(&self, token: &str) -> Result<SocialLinkPayload> {
        let payload: TokenPayload = self.tokens.get(token).await?;
        self.social_link_payload(payload)
    }

    /// Whether `token` is a live link token
    pub async fn check_token(&self, token: &str) -> bool {
        match self.tokens.check(token).await {
            Ok(live) => live,
            Err(e) => {
                warn!(token_hash = %hash_for_log(token), error = %e, "Token check failed");
                false
            }
        }
    }

    fn social_link_payload(&self, payload: TokenPayload) -> Result<SocialLinkPayload> {
        payload
            .into_social_link()
            .ok_or_else(|| HandoffError::NotFound("social link token".to_string()))
    }

    async fn application_for_challenge(&self, challenge: &str) -> Result<Arc<Application>> {
        let request = self
            .collaborators
            .authorization_server
            .get_login_request(challenge)
            .await?;
        self.application(&request.client_id).await
    }

    async fn application(&self, id: &str) -> Result<Arc<Application>> {
        self.collaborators
            .applications
            .get_application(id)
            .await?
            .ok_or_else(|| HandoffError::ApplicationNotFound(id.to_string()))
    }
}

fn social_provider<'a>(application: &'a Application, name: &str) -> Result<&'a IdentityProvider> {
    application
        .social_provider(name)
        .ok_or_else(|| HandoffError::ProviderNotFound(name.to_string()))
}

fn handoff_url(domain: &str, page: &str, provider: &str, challenge: &str, token: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("login_challenge", challenge)
        .append_pair("token", token)
        .finish();
    format!("{}/{}/{}?{}", domain, page, provider, query)
}

/// URL a launcher follows to finish a confirmed login
pub fn complete_auth_url(domain: &str, provider: &str, challenge: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("login_challenge", challenge)
        .finish();
    format!("{}/api/providers/{}/complete-auth?{}", domain, provider, query)
}
