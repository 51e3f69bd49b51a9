//! Handoff controller.
//!
//! Orchestrates launcher sessions, the resolver and the notifier for the
//! request types of the social login handoff. Redirect-style operations return
//! the target URL; status-style operations return a [`StatusReport`].

use crate::errors::{HandoffError, Result};
use crate::launcher::LauncherSessionStore;
use crate::resolver::{complete_auth_url, SocialIdentityResolver};
use crate::traits::Notifier;
use crate::types::*;
use crate::utils::hash_for_log;
use handoff_storage::Storage;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::form_urlencoded;

/// Confirm re-reads the session when a callback lands between its read and its write
const MAX_CONFIRM_ATTEMPTS: usize = 3;

pub struct HandoffController<S: Storage> {
    sessions: LauncherSessionStore<S>,
    resolver: SocialIdentityResolver<S>,
    notifier: Arc<dyn Notifier>,
}

impl<S: Storage> HandoffController<S> {
    pub fn new(
        sessions: LauncherSessionStore<S>,
        resolver: SocialIdentityResolver<S>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            sessions,
            resolver,
            notifier,
        }
    }

    pub fn resolver(&self) -> &SocialIdentityResolver<S> {
        &self.resolver
    }

    /// Start a provider login; opens a launcher session when `launcher` is set
    ///
    /// # Returns
    /// * Provider authorization URL
    pub async fn forward(
        &self,
        challenge: &str,
        provider: &str,
        domain: &str,
        launcher: bool,
    ) -> Result<String> {
        require_challenge(challenge)?;
        let url = self
            .resolver
            .forward_url(challenge, provider, domain, launcher)
            .await?;

        if launcher {
            self.sessions.open(challenge, provider, domain).await?;
            self.notify(challenge, StatusReport::new(HandoffStatus::InProgress))
                .await;
        }

        Ok(url)
    }

    /// Handle the provider redirect back to us
    ///
    /// # Returns
    /// * Redirect target: sign-in page on provider error, the launcher confirm
    ///   page for launcher flows, otherwise the accept or link/signup URL
    pub async fn callback(
        &self,
        state: &str,
        provider: &str,
        code: Option<&str>,
        error: Option<&str>,
        domain: &str,
        context: &ClientContext,
    ) -> Result<String> {
        let state = ForwardState::decode(state)?;
        let challenge = state.challenge.as_str();

        if let Some(error) = error.filter(|e| !e.is_empty()) {
            warn!(
                challenge_hash = %hash_for_log(challenge),
                provider = provider,
                error = error,
                "Provider returned an error"
            );
            return Ok(format!("/sign-in?{}", query(&[("login_challenge", challenge)])));
        }

        let code = code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| HandoffError::InvalidRequest("missing authorization code".to_string()))?;

        let resolution = self
            .resolver
            .resolve(challenge, provider, domain, code)
            .await?;

        if state.launcher {
            let Resolution { identity, profile } = resolution;
            self.sessions
                .transition(challenge, |session| {
                    if session.provider != provider {
                        return Err(HandoffError::NotFound(format!(
                            "launcher session for provider {}",
                            provider
                        )));
                    }
                    session.attach_resolution(domain, identity.clone(), profile.clone())
                })
                .await?;

            return Ok(format!(
                "/social-sign-in-confirm?{}",
                query(&[("login_challenge", challenge), ("name", provider)])
            ));
        }

        self.complete(
            resolution.identity.as_ref(),
            &resolution.profile,
            provider,
            domain,
            challenge,
            context,
        )
        .await
    }

    /// Finalize a launcher session after the user confirmed in the browser
    pub async fn confirm(&self, challenge: &str, context: &ClientContext) -> Result<StatusReport> {
        for attempt in 0..MAX_CONFIRM_ATTEMPTS {
            let Some(snapshot) = self.sessions.get(challenge).await? else {
                return Ok(StatusReport::new(HandoffStatus::Canceled));
            };

            match snapshot.status {
                LauncherStatus::Canceled => return Ok(StatusReport::new(HandoffStatus::Canceled)),
                LauncherStatus::Success => return Ok(StatusReport::new(HandoffStatus::Success)),
                LauncherStatus::InProgress => {}
            }

            let url = match &snapshot.resolved_identity {
                Some(_) => complete_auth_url(&snapshot.domain, &snapshot.provider, challenge),
                None => {
                    let profile = snapshot.resolved_profile.as_ref().ok_or_else(|| {
                        HandoffError::InvalidState(
                            "provider callback has not completed".to_string(),
                        )
                    })?;
                    self.complete(
                        None,
                        profile,
                        &snapshot.provider,
                        &snapshot.domain,
                        challenge,
                        context,
                    )
                    .await?
                }
            };

            // The URL is only valid for the resolution it was derived from.
            let outcome = match self
                .sessions
                .transition(challenge, |current| {
                    if current.status == LauncherStatus::InProgress
                        && !current.same_resolution(&snapshot)
                    {
                        return Ok(None);
                    }
                    Ok(Some(current.confirm(&url)))
                })
                .await
            {
                Ok((_, Some(outcome))) => outcome,
                Ok((_, None)) => {
                    debug!(
                        challenge_hash = %hash_for_log(challenge),
                        attempt = attempt,
                        "Resolution changed during confirm, retrying"
                    );
                    continue;
                }
                Err(HandoffError::NotFound(_)) => ConfirmOutcome::Canceled,
                Err(e) => return Err(e),
            };

            return match outcome {
                ConfirmOutcome::Confirmed => {
                    info!(challenge_hash = %hash_for_log(challenge), "Launcher login confirmed");
                    self.notify(challenge, StatusReport::with_url(HandoffStatus::Success, url))
                        .await;
                    Ok(StatusReport::new(HandoffStatus::Success))
                }
                ConfirmOutcome::AlreadyConfirmed => Ok(StatusReport::new(HandoffStatus::Success)),
                ConfirmOutcome::Canceled => Ok(StatusReport::new(HandoffStatus::Canceled)),
            };
        }

        Err(HandoffError::Conflict(format!(
            "resolution kept changing after {} confirm attempts",
            MAX_CONFIRM_ATTEMPTS
        )))
    }

    /// Launcher poll; never mutates state
    pub async fn check(&self, challenge: &str, provider: &str) -> Result<StatusReport> {
        let session = match self.sessions.get(challenge).await {
            Ok(session) => session,
            Err(e) => {
                warn!(challenge_hash = %hash_for_log(challenge), error = %e, "Session read failed");
                None
            }
        };

        Ok(match session {
            Some(session) if session.provider == provider => session.report(),
            _ => StatusReport::new(HandoffStatus::Expired),
        })
    }

    /// Cancel a launcher session from any state
    pub async fn cancel(&self, challenge: &str) -> Result<StatusReport> {
        match self
            .sessions
            .transition(challenge, |session| {
                session.cancel();
                Ok(())
            })
            .await
        {
            Ok(_) => {
                info!(challenge_hash = %hash_for_log(challenge), "Launcher login canceled");
                self.notify(challenge, StatusReport::new(HandoffStatus::Canceled))
                    .await;
                Ok(StatusReport::new(HandoffStatus::Canceled))
            }
            Err(HandoffError::NotFound(_)) => Ok(StatusReport::new(HandoffStatus::Expired)),
            Err(e) => Err(e),
        }
    }

    /// Exchange a confirmed identity for the authorization server's redirect
    pub async fn complete_auth(&self, challenge: &str, context: &ClientContext) -> Result<String> {
        let session = self.sessions.get(challenge).await?.ok_or_else(|| {
            HandoffError::NotFound(format!("launcher session {}", hash_for_log(challenge)))
        })?;

        if session.status != LauncherStatus::Success {
            return Err(HandoffError::InvalidState(
                "session is not successful".to_string(),
            ));
        }

        let identity = session.resolved_identity.as_ref().ok_or_else(|| {
            HandoffError::InvalidState("session has no user identity".to_string())
        })?;

        self.resolver
            .accept(identity, &session.provider, challenge, context)
            .await
    }

    pub async fn providers(&self, challenge: &str) -> Result<Vec<ProviderInfo>> {
        require_challenge(challenge)?;
        self.resolver.providers(challenge).await
    }

    pub async fn profile(&self, token: &str) -> Result<NormalizedProfile> {
        self.resolver.profile(token).await
    }

    /// Accept when an identity is known, otherwise hand off to link/signup
    async fn complete(
        &self,
        identity: Option<&LocalIdentity>,
        profile: &NormalizedProfile,
        provider: &str,
        domain: &str,
        challenge: &str,
        context: &ClientContext,
    ) -> Result<String> {
        match identity {
            Some(identity) => {
                self.resolver
                    .accept(identity, provider, challenge, context)
                    .await
            }
            None => {
                self.resolver
                    .social_login_handoff(profile, domain, provider, challenge)
                    .await
            }
        }
    }

    async fn notify(&self, challenge: &str, notification: StatusNotification) {
        if let Err(e) = self.notifier.publish(challenge, &notification).await {
            warn!(
                challenge_hash = %hash_for_log(challenge),
                status = notification.status.as_str(),
                error = %e,
                "Status notification failed, launcher will fall back to polling"
            );
        }
    }
}

fn require_challenge(challenge: &str) -> Result<()> {
    if challenge.is_empty() {
        return Err(HandoffError::InvalidRequest(
            "missing login_challenge".to_string(),
        ));
    }
    Ok(())
}

fn query(pairs: &[(&str, &str)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}
